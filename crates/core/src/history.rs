// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution history: the append-only trail of who did what to a plan.

use crate::world::WorldId;
use serde::{Deserialize, Serialize};

/// Well-known history event names written by the coordination core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventName {
    StartExecution,
    FinishExecution,
    TerminateExecution,
    PauseExecution,
}

crate::simple_display! {
    HistoryEventName {
        StartExecution => "start execution",
        FinishExecution => "finish execution",
        TerminateExecution => "terminate execution",
        PauseExecution => "pause execution",
    }
}

/// One entry in a plan's execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub name: HistoryEventName,
    /// World that performed the transition (for `terminate execution`, the
    /// world being terminated).
    pub world_id: WorldId,
    pub at_ms: u64,
}

impl HistoryEvent {
    pub fn new(name: HistoryEventName, world_id: WorldId, at_ms: u64) -> Self {
        Self { name, world_id, at_ms }
    }
}
