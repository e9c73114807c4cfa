// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers and proptest strategies.
//!
//! Available to other crates' tests via the `test-support` feature.

use crate::plan::PlanState;
use crate::step::{RescueStrategy, StepState};
use proptest::prelude::*;

pub fn arb_plan_state() -> impl Strategy<Value = PlanState> {
    prop_oneof![
        Just(PlanState::Planning),
        Just(PlanState::Planned),
        Just(PlanState::Scheduled),
        Just(PlanState::Running),
        Just(PlanState::Paused),
        Just(PlanState::Stopped),
    ]
}

pub fn arb_step_state() -> impl Strategy<Value = StepState> {
    prop_oneof![
        Just(StepState::Pending),
        Just(StepState::Running),
        Just(StepState::Success),
        Just(StepState::Error),
        Just(StepState::Skipped),
        Just(StepState::Suspended),
    ]
}

pub fn arb_rescue() -> impl Strategy<Value = RescueStrategy> {
    prop_oneof![Just(RescueStrategy::Pause), Just(RescueStrategy::Skip)]
}
