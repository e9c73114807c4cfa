// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination error kinds.

use flotilla_adapters::{ConnectorError, ExecutorError};
use flotilla_core::{PlanId, TransitionError, WorldId};
use flotilla_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the coordination core.
///
/// `NotFound` from storage is downgraded inside the invalidator (a missing
/// plan means "already reclaimed") and only escapes from operations where
/// the caller named the row explicitly.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("plan transition rejected: {0}")]
    Transition(#[from] TransitionError),

    /// A plan save conflicted twice in a row; the surrounding run is
    /// abandoned and stays eligible for a later retry.
    #[error("conflict persisted after retry for plan {plan}")]
    ConflictPersisted { plan: PlanId },

    #[error("transport failure: {0}")]
    Transport(#[from] ConnectorError),

    #[error("executor failure: {0}")]
    Executor(#[from] ExecutorError),

    #[error("world {0} has no executor configured")]
    NoExecutor(WorldId),
}

impl CoordinationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoordinationError::Storage(e) if e.is_not_found())
    }
}
