// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! World registry: registration, heartbeats, and staleness.

use flotilla_core::{Clock, World, WorldId};
use flotilla_storage::{Persistence, StorageError, WorldFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Registry of live worlds over the shared store.
///
/// A world is stale once `now - last_seen` exceeds the validity timeout.
/// Heartbeat rows are single-writer (the owning world) and multi-reader.
#[derive(Clone)]
pub struct WorldRegistry<C: Clock> {
    persistence: Arc<dyn Persistence>,
    clock: C,
    validity_timeout: Duration,
}

impl<C: Clock> WorldRegistry<C> {
    pub fn new(persistence: Arc<dyn Persistence>, clock: C, validity_timeout: Duration) -> Self {
        Self { persistence, clock, validity_timeout }
    }

    pub fn validity_timeout(&self) -> Duration {
        self.validity_timeout
    }

    /// Register a world, stamping its heartbeat with the current time.
    pub async fn register(&self, world: &World) -> Result<(), StorageError> {
        let mut row = world.clone();
        row.last_seen_ms = self.clock.epoch_ms();
        self.persistence.register_world(row).await
    }

    pub async fn heartbeat(&self, id: &WorldId) -> Result<(), StorageError> {
        self.persistence.heartbeat_world(id, self.clock.epoch_ms()).await
    }

    /// Remove a registration. Returns false when no row existed.
    pub async fn deregister(&self, id: &WorldId) -> Result<bool, StorageError> {
        debug!(world = %id, "deregistering");
        self.persistence.deregister_world(id).await
    }

    pub fn is_stale(&self, world: &World) -> bool {
        world.is_stale(self.clock.epoch_ms(), self.validity_timeout)
    }

    /// Worlds with a trusted heartbeat.
    pub async fn find_live(&self, filter: &WorldFilter) -> Result<Vec<World>, StorageError> {
        let cutoff = self
            .clock
            .epoch_ms()
            .saturating_sub(self.validity_timeout.as_millis() as u64);
        self.persistence.find_worlds(filter, Some(cutoff)).await
    }

    /// All registered worlds, stale ones included.
    pub async fn find_all(&self, filter: &WorldFilter) -> Result<Vec<World>, StorageError> {
        self.persistence.find_worlds(filter, None).await
    }

    /// Live executor worlds, minus the one being excluded (typically the
    /// world under invalidation).
    pub async fn live_executors(&self, exclude: &WorldId) -> Result<Vec<World>, StorageError> {
        let mut executors = self.find_live(&WorldFilter::executors()).await?;
        executors.retain(|w| &w.id != exclude);
        Ok(executors)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
