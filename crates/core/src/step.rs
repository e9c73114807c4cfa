// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan steps.
//!
//! The coordination core only reads and writes a step's `state`; everything
//! else about a step belongs to the executor that runs it.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a step within an execution plan.
    pub struct StepId("stp-");
}

/// Execution state of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Success,
    Error,
    Skipped,
    /// Terminal for the current run but resumable later.
    Suspended,
}

impl StepState {
    /// Finished states: the step will not run again without intervention.
    pub fn is_finished(&self) -> bool {
        matches!(self, StepState::Success | StepState::Error | StepState::Skipped)
    }
}

crate::simple_display! {
    StepState {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Error => "error",
        Skipped => "skipped",
        Suspended => "suspended",
    }
}

/// Per-action-class policy consulted when cleaning up a crashed plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueStrategy {
    /// Leave the plan paused for a human to inspect.
    #[default]
    Pause,
    /// Mark unfinished steps skipped and close the plan out.
    Skip,
}

crate::simple_display! {
    RescueStrategy {
        Pause => "pause",
        Skip => "skip",
    }
}

/// One step of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    /// Name of the user action class this step runs.
    pub action_class: String,
    pub state: StepState,
    /// Whether the action class is a cluster-wide singleton.
    #[serde(default)]
    pub singleton: bool,
    /// Rescue policy of the action class.
    #[serde(default)]
    pub rescue: RescueStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    pub fn new(action_class: impl Into<String>) -> Self {
        Self {
            id: StepId::generate(),
            action_class: action_class.into(),
            state: StepState::Pending,
            singleton: false,
            rescue: RescueStrategy::default(),
            error: None,
        }
    }
}

crate::builder! {
    pub struct StepBuilder => Step {
        into {
            id: StepId = StepId::generate(),
            action_class: String = "Dummy",
        }
        set {
            state: StepState = StepState::Pending,
            singleton: bool = false,
            rescue: RescueStrategy = RescueStrategy::Pause,
            error: Option<String> = None,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
