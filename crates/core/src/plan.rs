// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution plan: the durable record of one workflow instance.
//!
//! A plan is owned sequentially, first by the client world that plans it,
//! then by whichever executor world runs it, and it outlives either owner.
//! State transitions are guarded here: ordinary movement goes through
//! [`ExecutionPlan::transition_to`], close-out through
//! [`ExecutionPlan::stop`]/[`ExecutionPlan::finalize`], and none of them
//! ever leave the terminal `stopped` state.

use crate::history::{HistoryEvent, HistoryEventName};
use crate::step::{RescueStrategy, Step, StepId, StepState};
use crate::world::WorldId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for an execution plan.
    pub struct PlanId("pln-");
}

/// Lifecycle state of an execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Planning,
    Planned,
    /// Planned with a delayed start, waiting on the delayed-executor.
    Scheduled,
    Running,
    Paused,
    Stopped,
}

impl PlanState {
    /// `stopped` is the only terminal state; nothing leaves it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanState::Stopped)
    }
}

crate::simple_display! {
    PlanState {
        Planning => "planning",
        Planned => "planned",
        Scheduled => "scheduled",
        Running => "running",
        Paused => "paused",
        Stopped => "stopped",
    }
}

/// Overall outcome of a plan, refined as steps finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanResult {
    #[default]
    Pending,
    Success,
    Warning,
    Error,
}

crate::simple_display! {
    PlanResult {
        Pending => "pending",
        Success => "success",
        Warning => "warning",
        Error => "error",
    }
}

/// Rejected plan state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal plan transition {from} -> {to}")]
pub struct TransitionError {
    pub from: PlanState,
    pub to: PlanState,
}

fn transition_allowed(from: PlanState, to: PlanState) -> bool {
    use PlanState::*;
    matches!(
        (from, to),
        (Planning, Planned)
            | (Planning, Stopped)
            | (Planned, Scheduled)
            | (Planned, Running)
            | (Scheduled, Running)
            // Reassignment keeps a plan running under a new executor.
            | (Running, Running)
            | (Running, Paused)
            | (Running, Stopped)
            | (Paused, Running)
    )
}

/// The durable record of one workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: PlanId,
    pub state: PlanState,
    #[serde(default)]
    pub result: PlanResult,
    /// Steps in planning order.
    pub steps: IndexMap<StepId, Step>,
    /// Append-only trail of execution ownership changes.
    #[serde(default)]
    pub execution_history: Vec<HistoryEvent>,
    pub planner_world_id: WorldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_world_id: Option<WorldId>,
    /// Optimistic concurrency token, bumped by every persisted save.
    #[serde(default)]
    pub version: u64,
    /// Populated when persistence-level damage was detected on load
    /// (referenced steps missing). Such a plan still participates in
    /// coordination but reports `is_valid() == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl ExecutionPlan {
    pub fn new(planner_world_id: WorldId) -> Self {
        Self {
            id: PlanId::generate(),
            state: PlanState::Planning,
            result: PlanResult::Pending,
            steps: IndexMap::new(),
            execution_history: Vec::new(),
            planner_world_id,
            executor_world_id: None,
            version: 0,
            exception: None,
        }
    }

    /// Move to `next`, rejecting transitions outside the legal DAG.
    pub fn transition_to(&mut self, next: PlanState) -> Result<(), TransitionError> {
        if !transition_allowed(self.state, next) {
            return Err(TransitionError { from: self.state, to: next });
        }
        self.state = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// False once persistence-level damage has been recorded on the plan.
    pub fn is_valid(&self) -> bool {
        self.exception.is_none()
    }

    /// Record persistence-level damage for later inspection.
    pub fn mark_invalid(&mut self, detail: impl Into<String>) {
        self.exception = Some(detail.into());
    }

    /// Append a history event, clamping the timestamp so per-plan history
    /// stays non-decreasing even when the reporting clock skews backwards.
    pub fn record_history(&mut self, name: HistoryEventName, world_id: WorldId, at_ms: u64) {
        let at_ms = match self.execution_history.last() {
            Some(last) => at_ms.max(last.at_ms),
            None => at_ms,
        };
        self.execution_history.push(HistoryEvent::new(name, world_id, at_ms));
    }

    pub fn last_history(&self) -> Option<&HistoryEvent> {
        self.execution_history.last()
    }

    /// True once any step has left `pending` — the plan was mid-flight.
    pub fn any_step_started(&self) -> bool {
        self.steps.values().any(|s| s.state != StepState::Pending)
    }

    fn rescuable(step: &Step) -> bool {
        matches!(step.state, StepState::Pending | StepState::Running | StepState::Error)
    }

    /// Plan-wide rescue policy: `skip` only when every step a rescue would
    /// touch (pending, running, or in error) opts in; a plan with nothing
    /// to rescue defaults to `pause`.
    pub fn rescue_strategy(&self) -> RescueStrategy {
        let mut candidates = self.steps.values().filter(|s| Self::rescuable(s)).peekable();
        if candidates.peek().is_none() {
            return RescueStrategy::Pause;
        }
        if candidates.all(|s| s.rescue == RescueStrategy::Skip) {
            RescueStrategy::Skip
        } else {
            RescueStrategy::Pause
        }
    }

    /// Mark every pending, running, or errored step skipped
    /// (skip-rescue cleanup).
    pub fn skip_unfinished_steps(&mut self) {
        for step in self.steps.values_mut() {
            if Self::rescuable(step) {
                step.state = StepState::Skipped;
            }
        }
    }

    /// Close the plan out without recomputing the result.
    ///
    /// Bypasses the transition DAG — reclamation must be able to stop a
    /// plan from any state — but never resurrects a terminal plan.
    pub fn stop(&mut self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError { from: self.state, to: PlanState::Stopped });
        }
        self.state = PlanState::Stopped;
        Ok(())
    }

    /// Compute the final result from step states and close the plan out.
    ///
    /// Any `error` step makes the result `error`; otherwise any `skipped`
    /// step downgrades it to `warning`; otherwise `success`.
    pub fn finalize(&mut self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError { from: self.state, to: PlanState::Stopped });
        }
        self.result = if self.steps.values().any(|s| s.state == StepState::Error) {
            PlanResult::Error
        } else if self.steps.values().any(|s| s.state == StepState::Skipped) {
            PlanResult::Warning
        } else {
            PlanResult::Success
        };
        self.state = PlanState::Stopped;
        Ok(())
    }

    /// Action classes of singleton steps that are not yet finished.
    pub fn live_singleton_classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self
            .steps
            .values()
            .filter(|s| s.singleton && !s.state.is_finished())
            .map(|s| s.action_class.as_str())
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

/// Test builder for plans. Steps are appended in insertion order.
#[cfg(any(test, feature = "test-support"))]
pub struct PlanBuilder {
    id: PlanId,
    state: PlanState,
    result: PlanResult,
    steps: Vec<Step>,
    planner_world_id: WorldId,
    executor_world_id: Option<WorldId>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for PlanBuilder {
    fn default() -> Self {
        Self {
            id: PlanId::generate(),
            state: PlanState::Planned,
            result: PlanResult::Pending,
            steps: Vec::new(),
            planner_world_id: WorldId::generate(),
            executor_world_id: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl PlanBuilder {
    pub fn id(mut self, v: impl Into<PlanId>) -> Self {
        self.id = v.into();
        self
    }

    pub fn state(mut self, v: PlanState) -> Self {
        self.state = v;
        self
    }

    pub fn result(mut self, v: PlanResult) -> Self {
        self.result = v;
        self
    }

    pub fn planner(mut self, v: impl Into<WorldId>) -> Self {
        self.planner_world_id = v.into();
        self
    }

    pub fn executor(mut self, v: impl Into<WorldId>) -> Self {
        self.executor_world_id = Some(v.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> ExecutionPlan {
        ExecutionPlan {
            id: self.id,
            state: self.state,
            result: self.result,
            steps: self.steps.into_iter().map(|s| (s.id.clone(), s)).collect(),
            execution_history: Vec::new(),
            planner_world_id: self.planner_world_id,
            executor_world_id: self.executor_world_id,
            version: 0,
            exception: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ExecutionPlan {
    /// Create a builder with test defaults.
    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
