// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message transport between worlds.
//!
//! Messages are a closed sum type dispatched explicitly by the receiver's
//! listener loop. The core never inspects transport internals; it only
//! needs `send` plus listener registration.

use async_trait::async_trait;
use flotilla_core::{PlanId, WorldId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Messages exchanged between worlds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldMessage {
    /// Start executing a plan from scratch (history not yet written).
    PlanDispatch { plan: PlanId },
    /// Pick up a plan whose execution was already reassigned to the target.
    ExecutionResumed { plan: PlanId },
    /// Liveness probe.
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// No listener is registered for the target world.
    #[error("no route to world {0}")]
    Unroutable(WorldId),
    #[error("send to {0} failed: {1}")]
    SendFailed(WorldId, String),
}

/// Transport contract consumed by the coordination core.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn send(&self, target: &WorldId, message: WorldMessage) -> Result<(), ConnectorError>;

    /// Register the world's inbox. Messages sent to `world` flow into `tx`
    /// until `stop_listening`.
    fn start_listening(&self, world: &WorldId, tx: mpsc::Sender<WorldMessage>);

    /// Drop the world's route. Subsequent sends fail with `Unroutable`;
    /// tests use this to simulate a partition.
    fn stop_listening(&self, world: &WorldId);
}

/// In-process connector: a routing table of channels.
#[derive(Clone, Default)]
pub struct DirectConnector {
    routes: Arc<Mutex<HashMap<WorldId, mpsc::Sender<WorldMessage>>>>,
}

impl DirectConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a listener is currently registered for `world`.
    pub fn is_listening(&self, world: &WorldId) -> bool {
        self.routes.lock().contains_key(world)
    }
}

#[async_trait]
impl Connector for DirectConnector {
    async fn send(&self, target: &WorldId, message: WorldMessage) -> Result<(), ConnectorError> {
        let tx = self
            .routes
            .lock()
            .get(target)
            .cloned()
            .ok_or_else(|| ConnectorError::Unroutable(target.clone()))?;
        tx.send(message)
            .await
            .map_err(|e| ConnectorError::SendFailed(target.clone(), e.to_string()))
    }

    fn start_listening(&self, world: &WorldId, tx: mpsc::Sender<WorldMessage>) {
        debug!(world = %world, "listener registered");
        self.routes.lock().insert(world.clone(), tx);
    }

    fn stop_listening(&self, world: &WorldId) {
        debug!(world = %world, "listener dropped");
        self.routes.lock().remove(world);
    }
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
