// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-world reclamation.
//!
//! `invalidate(target)` walks everything the target held and puts it back
//! into circulation: planning locks are surrendered and finished plans
//! handed to a live executor, execution locks are reassigned or their
//! plans paused, singleton and miscellaneous locks are released. The whole
//! walk runs under the durable `world-invalidation:<id>` lock, so at most
//! one reclamation per target is in flight fleet-wide, and re-running a
//! half-finished reclamation converges on the same final state.

use crate::coordinator::Coordinator;
use crate::error::CoordinationError;
use crate::locks::{AcquireOutcome, ReleaseOutcome};
use flotilla_adapters::WorldMessage;
use flotilla_core::{
    Clock, ExecutionPlan, HistoryEventName, Lock, PlanResult, PlanState, World, WorldId,
};
use flotilla_storage::{LockFilter, WorldFilter};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How an invalidation call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// This call performed the reclamation.
    Completed,
    /// Another world holds the invalidation lock; nothing was touched.
    AlreadyRunning,
    /// The target is gone and holds nothing; there was nothing to reclaim.
    AlreadyDone,
}

/// Declare `target` dead and reclaim its locks and plans.
pub(crate) async fn invalidate<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
    target: &World,
) -> Result<InvalidationOutcome, CoordinationError> {
    let _section = coordinator.section().lock().await;

    let registered = !coordinator
        .registry()
        .find_all(&WorldFilter::by_id(target.id.clone()))
        .await?
        .is_empty();
    let holds_anything = !coordinator
        .locks()
        .find(&LockFilter::by_owner(target.id.clone()))
        .await?
        .is_empty();
    if !registered && !holds_anything {
        debug!(target = %target.id, "world already reclaimed");
        return Ok(InvalidationOutcome::AlreadyDone);
    }

    let guard = Lock::world_invalidation(&target.id, coordinator.world_id().clone());
    match coordinator.locks().acquire(guard.clone()).await? {
        AcquireOutcome::HeldBy(holder) => {
            debug!(target = %target.id, holder = %holder, "invalidation already in progress");
            return Ok(InvalidationOutcome::AlreadyRunning);
        }
        AcquireOutcome::Acquired => {}
    }

    info!(target = %target.id, by = %coordinator.world_id(), "invalidating world");
    let run = reclaim(coordinator, target).await;
    if let Err(e) = &run {
        warn!(target = %target.id, error = %e, "invalidation abandoned, target stays eligible");
    }
    // The outer lock is released even when the run failed; a crashed
    // invalidator instead leaves it held and is itself reclaimed later.
    coordinator.locks().release(&guard.kind, coordinator.world_id()).await?;
    run.map(|()| InvalidationOutcome::Completed)
}

async fn reclaim<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
    target: &World,
) -> Result<(), CoordinationError> {
    coordinator.registry().deregister(&target.id).await?;

    let mut owned = coordinator
        .locks()
        .find(&LockFilter::by_owner(target.id.clone()))
        .await?;
    owned.sort_by_key(|l| l.id());

    let mut planning = Vec::new();
    let mut execution = Vec::new();
    let mut singleton = Vec::new();
    let mut misc = Vec::new();
    for lock in owned {
        if lock.kind.is_planning() {
            planning.push(lock);
        } else if lock.kind.is_execution() {
            execution.push(lock);
        } else if lock.kind.is_singleton_action() {
            singleton.push(lock);
        } else {
            misc.push(lock);
        }
    }

    for lock in planning {
        reclaim_planning_lock(coordinator, target, lock).await?;
    }
    for lock in execution {
        reclaim_execution_lock(coordinator, target, lock).await?;
    }
    // Singleton locks go unconditionally; a still-live plan rebuilds its
    // lock on the next transition.
    for lock in singleton.into_iter().chain(misc) {
        if let ReleaseOutcome::WrongOwner(holder) =
            coordinator.locks().release_lock(&lock).await?
        {
            warn!(lock = %lock.id(), holder = %holder, "lock changed hands during reclamation");
        }
    }
    Ok(())
}

/// Append `terminate execution @ target` unless it is already the latest
/// entry (keeps a re-run of a crashed reclamation from double-writing).
fn terminate_once(plan: &mut ExecutionPlan, target: &WorldId, now_ms: u64) {
    let already = plan
        .last_history()
        .map(|e| e.name == HistoryEventName::TerminateExecution && &e.world_id == target)
        .unwrap_or(false);
    if !already {
        plan.record_history(HistoryEventName::TerminateExecution, target.clone(), now_ms);
    }
}

/// A planning lock held by a dead client. Release it, then either stop a
/// mid-plan plan or hand a finished one to a live executor.
async fn reclaim_planning_lock<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
    target: &World,
    lock: Lock,
) -> Result<(), CoordinationError> {
    coordinator.locks().release_lock(&lock).await?;
    let plan_id = match lock.plan_id() {
        Some(id) => id.clone(),
        None => return Ok(()),
    };

    let plan = match coordinator.persistence().load_plan(&plan_id).await {
        Ok(plan) => plan,
        Err(e) if e.is_not_found() => {
            debug!(plan = %plan_id, "plan already gone, planning lock dropped");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if plan.is_terminal() {
        return Ok(());
    }

    if plan.state == PlanState::Planning && plan.any_step_started() {
        // Died mid-plan: partial steps make the plan unrunnable.
        let tid = target.id.clone();
        let now = coordinator.clock().epoch_ms();
        coordinator
            .save_plan_with_retry(&plan_id, move |p| {
                if p.is_terminal() {
                    return Ok(());
                }
                terminate_once(p, &tid, now);
                p.stop()?;
                Ok(())
            })
            .await?;
        info!(plan = %plan_id, "mid-plan plan stopped");
        return Ok(());
    }

    // Planning finished before the client died: acquire a fresh execution
    // lock on behalf of a live executor and push the plan into the
    // auto-execute dispatch path.
    match coordinator.pick_executor(&target.id).await? {
        Some(new_owner) => {
            let fresh = Lock::execution(plan_id.clone(), new_owner.clone());
            if let AcquireOutcome::HeldBy(holder) = coordinator.locks().acquire(fresh).await? {
                debug!(plan = %plan_id, holder = %holder, "execution already owned elsewhere");
                return Ok(());
            }
            if &new_owner == coordinator.world_id() {
                let _ = coordinator.dispatch_plan(&plan_id).await?;
            } else if let Err(e) = coordinator
                .connector()
                .send(&new_owner, WorldMessage::PlanDispatch { plan: plan_id.clone() })
                .await
            {
                warn!(plan = %plan_id, error = %e, "executor unreachable, auto-execute will pick the plan up");
            }
        }
        None => {
            debug!(plan = %plan_id, "no live executor, leaving plan for a later sweep");
        }
    }
    Ok(())
}

/// An execution lock held by a dead executor. Close the plan out under its
/// rescue strategy, reassign it to a survivor, or pause it.
async fn reclaim_execution_lock<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
    target: &World,
    lock: Lock,
) -> Result<(), CoordinationError> {
    let plan_id = match lock.plan_id() {
        Some(id) => id.clone(),
        None => return Ok(()),
    };

    let plan = match coordinator.persistence().load_plan(&plan_id).await {
        Ok(plan) => plan,
        Err(e) if e.is_not_found() => {
            debug!(plan = %plan_id, "plan already gone, execution lock dropped");
            coordinator.locks().release_lock(&lock).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if plan.is_terminal() {
        coordinator.locks().release_lock(&lock).await?;
        return Ok(());
    }

    let tid = target.id.clone();
    let now = coordinator.clock().epoch_ms();

    if !plan.is_valid() {
        // Steps are missing from storage. The plan keeps the recorded
        // exception for inspection; coordination state is still reconciled.
        warn!(plan = %plan_id, "plan failed consistency check during reclamation");
        coordinator
            .save_plan_with_retry(&plan_id, move |p| {
                if p.is_terminal() {
                    return Ok(());
                }
                terminate_once(p, &tid, now);
                p.result = PlanResult::Error;
                p.stop()?;
                Ok(())
            })
            .await?;
        coordinator.locks().release_lock(&lock).await?;
        return Ok(());
    }

    if plan.rescue_strategy() == flotilla_core::RescueStrategy::Skip {
        coordinator
            .save_plan_with_retry(&plan_id, move |p| {
                if p.is_terminal() {
                    return Ok(());
                }
                terminate_once(p, &tid, now);
                p.skip_unfinished_steps();
                p.finalize()?;
                Ok(())
            })
            .await?;
        coordinator.locks().release_lock(&lock).await?;
        info!(plan = %plan_id, "plan closed out under skip rescue");
        return Ok(());
    }

    match coordinator.pick_executor(&target.id).await? {
        Some(new_owner) => {
            let stamp = new_owner.clone();
            coordinator
                .save_plan_with_retry(&plan_id, move |p| {
                    if p.is_terminal() {
                        return Ok(());
                    }
                    terminate_once(p, &tid, now);
                    p.record_history(HistoryEventName::StartExecution, stamp.clone(), now);
                    p.executor_world_id = Some(stamp.clone());
                    Ok(())
                })
                .await?;
            coordinator.locks().transfer(&lock.kind, &target.id, &new_owner).await?;
            info!(plan = %plan_id, from = %target.id, to = %new_owner, "execution reassigned");
            if &new_owner == coordinator.world_id() {
                let _ = coordinator.spawn_execution(&plan_id);
            } else if let Err(e) = coordinator
                .connector()
                .send(&new_owner, WorldMessage::ExecutionResumed { plan: plan_id.clone() })
                .await
            {
                warn!(plan = %plan_id, error = %e, "executor unreachable, auto-execute will pick the plan up");
            }
        }
        None => {
            coordinator
                .save_plan_with_retry(&plan_id, move |p| {
                    if p.is_terminal() {
                        return Ok(());
                    }
                    terminate_once(p, &tid, now);
                    if p.state == PlanState::Running {
                        p.transition_to(PlanState::Paused)?;
                    }
                    Ok(())
                })
                .await?;
            coordinator.locks().release_lock(&lock).await?;
            info!(plan = %plan_id, "no executor alive, plan paused");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "invalidator_tests.rs"]
mod tests;
