// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flotilla-core: domain types for the flotilla coordination fleet

pub mod macros;

pub mod clock;
pub mod history;
pub mod id;
pub mod lock;
pub mod plan;
pub mod step;
pub mod world;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use history::{HistoryEvent, HistoryEventName};
pub use lock::{Lock, LockKind, PlanLockRole};
#[cfg(any(test, feature = "test-support"))]
pub use plan::PlanBuilder;
pub use plan::{ExecutionPlan, PlanId, PlanResult, PlanState, TransitionError};
#[cfg(any(test, feature = "test-support"))]
pub use step::StepBuilder;
pub use step::{RescueStrategy, Step, StepId, StepState};
#[cfg(any(test, feature = "test-support"))]
pub use world::WorldBuilder;
pub use world::{World, WorldId, WorldKind};
