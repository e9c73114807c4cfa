// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-world reclamation across a whole fleet.

use crate::prelude::*;

/// Two executors live; the survivor reclaims the dead one's running plan
/// and finishes it itself.
#[tokio::test]
async fn a_surviving_executor_takes_over_a_running_plan() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;
    let e2 = cluster.start_executor("wld-e2").await;

    let plan = cluster.seed_running_plan("wld-e1", RescueStrategy::Pause).await;

    let outcome = e2.coordinator().invalidate(e1.coordinator().world()).await.unwrap();
    assert_eq!(outcome, InvalidationOutcome::Completed);

    let done = cluster.wait_for_plan_state(&plan.id, PlanState::Stopped).await;
    assert_eq!(
        history_of(&done)[..3],
        [
            he(HistoryEventName::StartExecution, "wld-e1"),
            he(HistoryEventName::TerminateExecution, "wld-e1"),
            he(HistoryEventName::StartExecution, "wld-e2"),
        ]
    );
    assert_eq!(done.result, PlanResult::Success);

    e2.stop().await.unwrap();
}

/// Reclamation driven by a client world: the plan travels over the
/// connector to the remote executor.
#[tokio::test]
async fn a_client_reclaims_onto_a_remote_executor() {
    let cluster = Cluster::new();
    let _e1 = cluster.start_executor("wld-e1").await;
    let e2 = cluster.start_executor("wld-e2").await;
    let client = cluster.start_client("wld-c").await;

    let plan = cluster.seed_running_plan("wld-e1", RescueStrategy::Pause).await;

    // The client cannot run plans itself; it hands execution to e2 and
    // notifies it over the connector.
    let e1_world = WorldBuilder::default().id("wld-e1").kind(WorldKind::Executor).build();
    client.coordinator().invalidate(&e1_world).await.unwrap();

    let done = cluster.wait_for_plan_state(&plan.id, PlanState::Stopped).await;
    assert_eq!(done.executor_world_id, Some(WorldId::from_string("wld-e2")));
    assert_eq!(
        history_of(&done)[..3],
        [
            he(HistoryEventName::StartExecution, "wld-e1"),
            he(HistoryEventName::TerminateExecution, "wld-e1"),
            he(HistoryEventName::StartExecution, "wld-e2"),
        ]
    );

    e2.stop().await.unwrap();
    client.stop().await.unwrap();
}

/// Only the dying executor exists: its plan parks in `paused` with a
/// pending result and no execution lock, ready for a later sweep.
#[tokio::test]
async fn with_no_survivor_the_plan_parks_paused() {
    let cluster = Cluster::new();
    let client = cluster.start_client("wld-c").await;
    let e1 = cluster.start_executor("wld-e1").await;

    let plan = cluster.seed_running_plan("wld-e1", RescueStrategy::Pause).await;

    client.coordinator().invalidate(e1.coordinator().world()).await.unwrap();

    let parked = cluster.store.load_plan(&plan.id).await.unwrap();
    assert_eq!(parked.state, PlanState::Paused);
    assert_eq!(parked.result, PlanResult::Pending);
    assert_eq!(
        history_of(&parked),
        vec![
            he(HistoryEventName::StartExecution, "wld-e1"),
            he(HistoryEventName::TerminateExecution, "wld-e1"),
        ]
    );
    assert!(cluster
        .store
        .find_locks(&LockFilter::by_prefix(LockKind::EXECUTION_PLAN_PREFIX))
        .await
        .unwrap()
        .is_empty());

    // A new executor joining later picks the parked plan up again.
    let e2 = cluster.start_executor("wld-e2").await;
    let handles = e2.coordinator().auto_execute().await.unwrap();
    assert_eq!(handles.len(), 1);
    cluster.wait_for_plan_state(&plan.id, PlanState::Stopped).await;

    client.stop().await.unwrap();
    e2.stop().await.unwrap();
}

/// Skip-rescue plans are closed out instead of reassigned: unfinished and
/// errored steps go to `skipped` and the plan stops with a warning.
#[tokio::test]
async fn skip_rescue_plans_are_closed_out_not_reassigned() {
    let cluster = Cluster::new();
    let e2 = cluster.start_executor("wld-e2").await;

    let dead = WorldBuilder::default().id("wld-dead").kind(WorldKind::Executor).build();
    let mut plan = ExecutionPlan::builder()
        .state(PlanState::Running)
        .step(
            StepBuilder::default()
                .action_class("SkippableDummy")
                .state(StepState::Error)
                .rescue(RescueStrategy::Skip)
                .build(),
        )
        .build();
    cluster.store.save_plan(&mut plan).await.unwrap();
    cluster.store.insert_lock(Lock::execution(plan.id.clone(), dead.id.clone())).await.unwrap();

    e2.coordinator().invalidate(&dead).await.unwrap();

    let stopped = cluster.store.load_plan(&plan.id).await.unwrap();
    assert_eq!(stopped.state, PlanState::Stopped);
    assert!(stopped.steps.values().all(|s| s.state == StepState::Skipped));
    assert!(e2
        .coordinator()
        .lock_log()
        .entries()
        .contains(&format!("unlock execution-plan:{}", plan.id)));

    e2.stop().await.unwrap();
}

/// Concurrent invalidations of one world collapse into a single run: the
/// fleet-wide lock trail shows exactly one lock/unlock pair for the guard.
#[tokio::test]
async fn concurrent_invalidations_collapse_into_one_run() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;
    let e2 = cluster.start_executor("wld-e2").await;
    let target = cluster.register_corpse("wld-t", WorldKind::Client).await;

    let (a, b) = tokio::join!(
        e1.coordinator().invalidate(&target),
        e2.coordinator().invalidate(&target),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(
        matches!(
            (&a, &b),
            (InvalidationOutcome::Completed, _) | (_, InvalidationOutcome::Completed)
        ),
        "one of the calls must perform the run (got {a:?} / {b:?})"
    );

    let mut trail = e1.coordinator().lock_log().entries();
    trail.extend(e2.coordinator().lock_log().entries());
    assert_eq!(
        trail,
        vec![
            format!("lock world-invalidation:{}", target.id),
            format!("unlock world-invalidation:{}", target.id),
        ]
    );

    e1.stop().await.unwrap();
    e2.stop().await.unwrap();
}

/// An execution lock pointing at a plan that no longer exists is simply
/// released; reclamation carries on.
#[tokio::test]
async fn a_lock_onto_a_missing_plan_does_not_derail_reclamation() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;

    let ghost = WorldBuilder::default().id("wld-ghost").kind(WorldKind::Executor).build();
    cluster
        .store
        .insert_lock(Lock::execution(PlanId::from_string("pln-missing"), ghost.id.clone()))
        .await
        .unwrap();

    e1.coordinator().invalidate(&ghost).await.unwrap();

    assert_eq!(
        e1.coordinator().lock_log().entries(),
        vec![
            format!("lock world-invalidation:{}", ghost.id),
            "unlock execution-plan:pln-missing".to_string(),
            format!("unlock world-invalidation:{}", ghost.id),
        ]
    );

    e1.stop().await.unwrap();
}

/// A dead client's planning lock: the plan finished planning, so a live
/// executor takes a fresh execution lock and runs it to completion.
#[tokio::test]
async fn a_dead_planners_finished_plan_is_executed_by_a_survivor() {
    let cluster = Cluster::new();
    let e1 = cluster.start_executor("wld-e1").await;

    let dead_client = WorldBuilder::default().id("wld-c").kind(WorldKind::Client).build();
    let mut plan = ExecutionPlan::builder()
        .state(PlanState::Planning)
        .planner("wld-c")
        .step(StepBuilder::default().build())
        .build();
    cluster.store.save_plan(&mut plan).await.unwrap();
    cluster
        .store
        .insert_lock(Lock::planning(plan.id.clone(), dead_client.id.clone()))
        .await
        .unwrap();

    e1.coordinator().invalidate(&dead_client).await.unwrap();

    let log = e1.coordinator().lock_log().entries();
    assert_eq!(
        log[..4],
        [
            format!("lock world-invalidation:{}", dead_client.id),
            format!("unlock execution-plan:{}", plan.id),
            format!("lock execution-plan:{}", plan.id),
            format!("unlock world-invalidation:{}", dead_client.id),
        ]
    );
    cluster.wait_for_plan_state(&plan.id, PlanState::Stopped).await;

    e1.stop().await.unwrap();
}

/// Partition: the chosen executor is unreachable at reassignment time.
/// Durable state is still handed over, so a later sweep can finish the job.
#[tokio::test]
async fn an_unreachable_executor_still_receives_ownership_durably() {
    let cluster = Cluster::new();
    let client = cluster.start_client("wld-c").await;
    let e2 = cluster.start_executor("wld-e2").await;
    let plan = cluster.seed_running_plan("wld-e1", RescueStrategy::Pause).await;
    cluster.register_corpse("wld-e1", WorldKind::Executor).await;

    // e2 drops off the network but keeps heartbeating the store.
    cluster.connector.stop_listening(e2.coordinator().world_id());

    let e1_world = WorldBuilder::default().id("wld-e1").kind(WorldKind::Executor).build();
    client.coordinator().invalidate(&e1_world).await.unwrap();

    // Ownership moved durably even though the notification was lost.
    let locks = cluster
        .store
        .find_locks(&LockFilter::by_prefix(LockKind::EXECUTION_PLAN_PREFIX))
        .await
        .unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].owner, WorldId::from_string("wld-e2"));
    let plan_now = cluster.store.load_plan(&plan.id).await.unwrap();
    assert_eq!(plan_now.state, PlanState::Running);
    assert_eq!(plan_now.executor_world_id, Some(WorldId::from_string("wld-e2")));

    client.stop().await.unwrap();
    e2.stop().await.unwrap();
}
