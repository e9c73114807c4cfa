// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-execute sweep: resume plans left behind by crashes.
//!
//! The sweep runs under the cluster-wide `auto-execute` lock, so at most
//! one world sweeps at a time. It picks up plans that are runnable but own
//! no execution lock and dispatches them on the local executor. The lock
//! is released once dispatch is done — the sweep does not wait for the
//! plans themselves.

use crate::coordinator::{Coordinator, ExecutionHandle};
use crate::error::CoordinationError;
use crate::locks::AcquireOutcome;
use flotilla_core::{Clock, Lock, LockKind, PlanResult, PlanState};
use flotilla_storage::{LockFilter, PlanFilter};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// States a sweep considers resumable. Paused plans are only picked up
/// when their result is still pending; a paused plan with an error needs a
/// human. Scheduled plans belong to the delayed-executor role.
const SWEEPABLE: [PlanState; 3] = [PlanState::Planned, PlanState::Running, PlanState::Paused];

pub(crate) async fn auto_execute<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
) -> Result<Vec<ExecutionHandle>, CoordinationError> {
    if !coordinator.is_executor() {
        return Err(CoordinationError::NoExecutor(coordinator.world_id().clone()));
    }

    let me = coordinator.world_id().clone();
    match coordinator.locks().acquire(Lock::auto_execute(me.clone())).await? {
        AcquireOutcome::HeldBy(holder) => {
            debug!(holder = %holder, "auto-execute sweep already running");
            return Ok(Vec::new());
        }
        AcquireOutcome::Acquired => {}
    }

    let swept = sweep(coordinator).await;
    // Dispatch done; the plans keep running on their own tasks.
    coordinator.locks().release(&LockKind::AutoExecute, &me).await?;
    swept
}

async fn sweep<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
) -> Result<Vec<ExecutionHandle>, CoordinationError> {
    let me = coordinator.world_id().clone();
    let mut handles = Vec::new();

    for state in SWEEPABLE {
        let plans = coordinator.persistence().find_plans(&PlanFilter::by_state(state)).await?;
        for plan in plans {
            if state == PlanState::Paused && plan.result != PlanResult::Pending {
                debug!(plan = %plan.id, result = %plan.result, "paused plan needs intervention, skipping");
                continue;
            }

            let lock_id = format!("{}{}", LockKind::EXECUTION_PLAN_PREFIX, plan.id);
            if !coordinator.locks().find(&LockFilter::by_id(lock_id)).await?.is_empty() {
                continue;
            }

            match coordinator.locks().acquire(Lock::execution(plan.id.clone(), me.clone())).await? {
                // Lost the race — typically to an invalidator reassigning
                // the same plan. Ownership is atomic; the other side wins.
                AcquireOutcome::HeldBy(_) => continue,
                AcquireOutcome::Acquired => {}
            }

            match coordinator.dispatch_plan(&plan.id).await {
                Ok(handle) => {
                    info!(plan = %plan.id, from = %state, "resuming orphaned plan");
                    handles.push(handle);
                }
                Err(e) => {
                    warn!(plan = %plan.id, error = %e, "could not dispatch orphaned plan");
                    let kind = Lock::execution(plan.id.clone(), me.clone()).kind;
                    let _ = coordinator.locks().release(&kind, &me).await;
                }
            }
        }
    }
    Ok(handles)
}

#[cfg(test)]
#[path = "auto_execute_tests.rs"]
mod tests;
