// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use flotilla_core::PlanId;
use flotilla_storage::MemoryPersistence;

fn table() -> LockTable {
    LockTable::new(Arc::new(MemoryPersistence::new()))
}

fn wid(s: &str) -> WorldId {
    WorldId::from_string(s)
}

fn pid(s: &str) -> PlanId {
    PlanId::from_string(s)
}

#[tokio::test]
async fn acquire_then_release_logs_in_order() {
    let locks = table();
    let lock = Lock::execution(pid("pln-p"), wid("wld-a"));

    assert_eq!(locks.acquire(lock.clone()).await.unwrap(), AcquireOutcome::Acquired);
    assert_eq!(locks.release_lock(&lock).await.unwrap(), ReleaseOutcome::Released);

    assert_eq!(
        locks.log().entries(),
        vec!["lock execution-plan:pln-p", "unlock execution-plan:pln-p"]
    );
}

#[tokio::test]
async fn second_acquire_reports_the_holder_and_logs_nothing() {
    let locks = table();
    locks.acquire(Lock::auto_execute(wid("wld-a"))).await.unwrap();

    let outcome = locks.acquire(Lock::auto_execute(wid("wld-b"))).await.unwrap();
    assert_eq!(outcome, AcquireOutcome::HeldBy(wid("wld-a")));
    assert_eq!(locks.log().entries(), vec!["lock auto-execute"]);
}

#[tokio::test]
async fn acquire_is_not_reentrant_for_the_same_owner() {
    let locks = table();
    locks.acquire(Lock::auto_execute(wid("wld-a"))).await.unwrap();

    let outcome = locks.acquire(Lock::auto_execute(wid("wld-a"))).await.unwrap();
    assert_eq!(outcome, AcquireOutcome::HeldBy(wid("wld-a")));
}

#[tokio::test]
async fn release_outcomes_distinguish_missing_and_mismatched() {
    let locks = table();
    let kind = LockKind::AutoExecute;

    assert_eq!(locks.release(&kind, &wid("wld-a")).await.unwrap(), ReleaseOutcome::NotHeld);

    locks.acquire(Lock::auto_execute(wid("wld-a"))).await.unwrap();
    assert_eq!(
        locks.release(&kind, &wid("wld-b")).await.unwrap(),
        ReleaseOutcome::WrongOwner(wid("wld-a"))
    );
    // Neither failed release reached the log.
    assert_eq!(locks.log().entries(), vec!["lock auto-execute"]);
}

#[tokio::test]
async fn transfer_logs_an_unlock_lock_pair() {
    let locks = table();
    let lock = Lock::execution(pid("pln-p"), wid("wld-a"));
    let kind = lock.kind.clone();
    locks.acquire(lock).await.unwrap();

    assert_eq!(
        locks.transfer(&kind, &wid("wld-a"), &wid("wld-b")).await.unwrap(),
        ReleaseOutcome::Released
    );
    assert_eq!(
        locks.log().entries(),
        vec![
            "lock execution-plan:pln-p",
            "unlock execution-plan:pln-p",
            "lock execution-plan:pln-p",
        ]
    );

    let found = locks.find(&LockFilter::by_id("execution-plan:pln-p")).await.unwrap();
    assert_eq!(found[0].owner, wid("wld-b"));
}

#[tokio::test]
async fn transfer_of_a_missing_lock_is_not_held() {
    let locks = table();
    let kind = Lock::execution(pid("pln-p"), wid("wld-a")).kind;
    assert_eq!(
        locks.transfer(&kind, &wid("wld-a"), &wid("wld-b")).await.unwrap(),
        ReleaseOutcome::NotHeld
    );
}

#[tokio::test]
async fn locks_survive_through_a_second_table_on_the_same_store() {
    // Durability from the table's point of view: a fresh table over the
    // same backend sees locks the old one acquired.
    let store = MemoryPersistence::new();
    let first = LockTable::new(Arc::new(store.clone()));
    first.acquire(Lock::auto_execute(wid("wld-a"))).await.unwrap();

    let second = LockTable::new(Arc::new(store));
    let outcome = second.acquire(Lock::auto_execute(wid("wld-b"))).await.unwrap();
    assert_eq!(outcome, AcquireOutcome::HeldBy(wid("wld-a")));
}

#[tokio::test]
async fn log_clear_resets_observation() {
    let locks = table();
    locks.acquire(Lock::auto_execute(wid("wld-a"))).await.unwrap();
    locks.log().clear();
    assert!(locks.log().entries().is_empty());
}
