// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flotilla-adapters: pluggable seams between the coordination core and the
//! outside world.
//!
//! Two contracts live here: [`Connector`] carries messages between worlds,
//! and [`PlanExecutor`] runs a plan's steps. The bundled `Direct*`/`Local*`
//! implementations keep everything in-process for tests and single-node
//! fleets.

pub mod connector;
pub mod executor;

pub use connector::{Connector, ConnectorError, DirectConnector, WorldMessage};
pub use executor::{ExecutorError, LocalExecutor, PlanExecutor};
