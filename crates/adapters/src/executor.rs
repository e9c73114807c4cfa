// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan execution seam.
//!
//! The coordination core hands a plan id to a [`PlanExecutor`] and expects
//! the finished plan back. [`LocalExecutor`] is the bundled implementation:
//! it drives every unfinished step to success in-process, which is all the
//! core needs to exercise ownership handoff end to end. Real deployments
//! substitute an executor that actually runs user actions.

use async_trait::async_trait;
use flotilla_core::{
    Clock, ExecutionPlan, HistoryEventName, PlanId, PlanState, StepState, TransitionError, WorldId,
};
use flotilla_storage::{Persistence, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("plan transition rejected: {0}")]
    Transition(#[from] TransitionError),
    #[error("execution of {plan} failed: {detail}")]
    Failed { plan: PlanId, detail: String },
}

/// Runs plans on behalf of one executor world.
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    /// Execute the plan to its next resting state (stopped or paused) and
    /// return the persisted result.
    async fn execute(&self, plan_id: &PlanId) -> Result<ExecutionPlan, ExecutorError>;

    /// Stop accepting work and wind down in-flight executions.
    async fn terminate(&self) -> Result<(), ExecutorError>;
}

/// In-process executor: completes every runnable step.
///
/// Suspended steps are honored — a plan containing one parks in `paused`
/// instead of finishing.
pub struct LocalExecutor<C: Clock> {
    world_id: WorldId,
    persistence: Arc<dyn Persistence>,
    clock: C,
}

impl<C: Clock> LocalExecutor<C> {
    pub fn new(world_id: WorldId, persistence: Arc<dyn Persistence>, clock: C) -> Self {
        Self { world_id, persistence, clock }
    }

    /// Drive the plan forward once. Separated out so the optimistic-retry
    /// wrapper can re-run it against a freshly loaded plan.
    fn run_steps(&self, plan: &mut ExecutionPlan) -> Result<(), ExecutorError> {
        // A reassigned or freshly dispatched plan may arrive in any
        // pre-running state; walk it to `running` first.
        match plan.state {
            PlanState::Planning => {
                plan.transition_to(PlanState::Planned)?;
                plan.transition_to(PlanState::Running)?;
            }
            PlanState::Planned | PlanState::Scheduled | PlanState::Paused => {
                plan.transition_to(PlanState::Running)?;
            }
            PlanState::Running => {}
            PlanState::Stopped => {
                return Err(ExecutorError::Failed {
                    plan: plan.id.clone(),
                    detail: "plan is already stopped".to_string(),
                })
            }
        }
        plan.executor_world_id = Some(self.world_id.clone());

        let mut suspended = false;
        for step in plan.steps.values_mut() {
            match step.state {
                StepState::Pending | StepState::Running => step.state = StepState::Success,
                StepState::Suspended => suspended = true,
                _ => {}
            }
        }

        if suspended {
            debug!(plan = %plan.id, "plan contains suspended steps, parking");
            plan.record_history(
                HistoryEventName::PauseExecution,
                self.world_id.clone(),
                self.clock.epoch_ms(),
            );
            plan.transition_to(PlanState::Paused)?;
        } else {
            plan.record_history(
                HistoryEventName::FinishExecution,
                self.world_id.clone(),
                self.clock.epoch_ms(),
            );
            plan.finalize()?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> PlanExecutor for LocalExecutor<C> {
    async fn execute(&self, plan_id: &PlanId) -> Result<ExecutionPlan, ExecutorError> {
        let mut plan = self.persistence.load_plan(plan_id).await?;
        self.run_steps(&mut plan)?;
        match self.persistence.save_plan(&mut plan).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                // One retry against the latest version; a second conflict
                // is surfaced.
                let mut plan2 = self.persistence.load_plan(plan_id).await?;
                self.run_steps(&mut plan2)?;
                self.persistence.save_plan(&mut plan2).await?;
                info!(plan = %plan2.id, state = %plan2.state, "execution finished after retry");
                return Ok(plan2);
            }
            Err(e) => return Err(e.into()),
        }
        info!(plan = %plan.id, state = %plan.state, result = %plan.result, "execution finished");
        Ok(plan)
    }

    async fn terminate(&self) -> Result<(), ExecutorError> {
        debug!(world = %self.world_id, "executor terminating");
        Ok(())
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
