// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flotilla-storage: typed persistence gateway over plans, steps, locks,
//! worlds, and execution history.
//!
//! Production deployments plug a transactional KV or SQL driver in behind
//! [`Persistence`]; the bundled [`MemoryPersistence`] adapter backs tests
//! and single-process fleets.

mod error;
mod memory;
mod persistence;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::StorageError;
pub use memory::MemoryPersistence;
pub use persistence::{
    LockDelete, LockFilter, LockInsert, Persistence, PlanFilter, WorldFilter,
};
