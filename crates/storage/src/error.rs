// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error kinds.

use thiserror::Error;

/// Errors surfaced by a [`crate::Persistence`] driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The referenced row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An optimistic-concurrency token mismatched on write.
    #[error("conflicting write to {kind} {id}")]
    Conflict { kind: &'static str, id: String },

    /// The backend is unreachable or refused the operation. Fatal: the
    /// caller should treat its world as degraded.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound { kind, id: id.into() }
    }

    pub fn conflict(kind: &'static str, id: impl Into<String>) -> Self {
        StorageError::Conflict { kind, id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}
