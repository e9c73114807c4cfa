// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup and on-demand consistency sweeps across a fleet.

use crate::prelude::*;

/// A fresh executor with the startup check enabled clears out a peer that
/// died without deregistering.
#[tokio::test]
async fn startup_check_drops_a_stale_peer() {
    let cluster = Cluster::new();
    let corpse = cluster.register_corpse("wld-x", WorldKind::Executor).await;
    cluster
        .store
        .insert_lock(Lock::auto_execute(corpse.id.clone()))
        .await
        .unwrap();
    cluster.age_past_timeout();

    // `None` keeps the kind default: enabled for executors.
    let config = cluster.config();
    let config = CoordinationConfig {
        auto_validity_check: None,
        ..config
    };
    let coordinator = cluster.executor_with_config("wld-e", config);
    let handle = WorldHandle::start(coordinator).await.unwrap();

    assert!(cluster
        .store
        .find_worlds(&WorldFilter::by_id(corpse.id.clone()), None)
        .await
        .unwrap()
        .is_empty());
    assert!(cluster.store.find_locks(&LockFilter::default()).await.unwrap().is_empty());

    handle.stop().await.unwrap();
}

/// An on-demand worlds check without the invalidate flag reports verdicts
/// but reclaims nothing.
#[tokio::test]
async fn a_report_only_check_reclaims_nothing() {
    let cluster = Cluster::new();
    let corpse = cluster.register_corpse("wld-x", WorldKind::Client).await;
    cluster.age_past_timeout();
    let e1 = cluster.start_executor("wld-e1").await;

    let verdicts = e1
        .coordinator()
        .worlds_validity_check(false, &WorldFilter::default())
        .await
        .unwrap();
    assert_eq!(verdicts[&corpse.id], WorldValidity::Invalid);
    assert_eq!(verdicts[e1.coordinator().world_id()], WorldValidity::Valid);
    assert_eq!(
        cluster.store.find_worlds(&WorldFilter::default(), None).await.unwrap().len(),
        2
    );

    e1.stop().await.unwrap();
}

/// Three singleton locks: one for a running plan, one for a missing plan,
/// one for a stopped plan. Exactly the latter two are orphans.
#[tokio::test]
async fn orphaned_singleton_locks_are_swept() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;
    let me = e1.coordinator().world_id().clone();

    let mut running = ExecutionPlan::builder()
        .state(PlanState::Running)
        .step(StepBuilder::default().state(StepState::Running).singleton(true).build())
        .build();
    cluster.store.save_plan(&mut running).await.unwrap();
    let mut stopped = ExecutionPlan::builder().state(PlanState::Stopped).build();
    cluster.store.save_plan(&mut stopped).await.unwrap();

    cluster
        .store
        .insert_lock(Lock::singleton_action("Running", running.id.clone(), me.clone()))
        .await
        .unwrap();
    cluster
        .store
        .insert_lock(Lock::singleton_action("Missing", PlanId::from_string("pln-gone"), me.clone()))
        .await
        .unwrap();
    cluster
        .store
        .insert_lock(Lock::singleton_action("Stopped", stopped.id.clone(), me))
        .await
        .unwrap();

    let removed = e1.coordinator().clean_orphaned_locks().await.unwrap();
    let mut ids: Vec<String> = removed.iter().map(|l| l.id()).collect();
    ids.sort();
    assert_eq!(ids, vec!["singleton-action:Missing", "singleton-action:Stopped"]);

    let remaining = cluster
        .store
        .find_locks(&LockFilter::by_prefix(LockKind::SINGLETON_ACTION_PREFIX))
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), "singleton-action:Running");

    e1.stop().await.unwrap();
}

/// The full lock sweep also removes locks whose owner fell out of the
/// registry entirely.
#[tokio::test]
async fn the_lock_sweep_covers_unregistered_owners() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;

    cluster
        .store
        .insert_lock(Lock::execution(
            PlanId::from_string("pln-left-behind"),
            WorldId::from_string("wld-never-registered"),
        ))
        .await
        .unwrap();

    let removed = e1.coordinator().locks_validity_check().await.unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), "execution-plan:pln-left-behind");

    e1.stop().await.unwrap();
}

/// A validity check against a fleet where everything is healthy returns a
/// clean bill and touches nothing.
#[tokio::test]
async fn a_healthy_fleet_passes_both_checks() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;
    let client = cluster.start_client("wld-c").await;

    let plan = cluster.seed_running_plan("wld-e1", RescueStrategy::Pause).await;

    let verdicts = e1
        .coordinator()
        .worlds_validity_check(true, &WorldFilter::default())
        .await
        .unwrap();
    assert!(verdicts.values().all(|v| *v == WorldValidity::Valid));

    let removed = e1.coordinator().locks_validity_check().await.unwrap();
    assert!(removed.is_empty());
    assert_eq!(cluster.store.load_plan(&plan.id).await.unwrap().state, PlanState::Running);

    e1.stop().await.unwrap();
    client.stop().await.unwrap();
}
