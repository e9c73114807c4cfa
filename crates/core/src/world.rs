// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! World records: one per process participating in the fleet.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

crate::define_id! {
    /// Unique identifier for a world (a single participating process).
    pub struct WorldId("wld-");
}

/// Role a world plays in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldKind {
    /// Plans work: materializes execution plans and triggers them.
    Client,
    /// Runs work: owns execution of plans.
    Executor,
}

crate::simple_display! {
    WorldKind {
        Client => "client",
        Executor => "executor",
    }
}

/// Registration record for a live world.
///
/// Created when a process joins the fleet; mutated only by heartbeat and by
/// deregistration/invalidation. At most one live registration exists per id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub kind: WorldKind,
    /// Free-form deployment metadata (hostname, pid, version).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
    /// Epoch ms of the last heartbeat.
    pub last_seen_ms: u64,
}

impl World {
    pub fn new(kind: WorldKind) -> Self {
        Self {
            id: WorldId::generate(),
            kind,
            meta: HashMap::new(),
            last_seen_ms: 0,
        }
    }

    pub fn is_executor(&self) -> bool {
        self.kind == WorldKind::Executor
    }

    /// A world is stale once its heartbeat is older than the validity timeout.
    /// A heartbeat exactly at the timeout boundary is still trusted.
    pub fn is_stale(&self, now_ms: u64, validity_timeout: Duration) -> bool {
        now_ms.saturating_sub(self.last_seen_ms) > validity_timeout.as_millis() as u64
    }
}

crate::builder! {
    pub struct WorldBuilder => World {
        into {
            id: WorldId = WorldId::generate(),
        }
        set {
            kind: WorldKind = WorldKind::Executor,
            meta: HashMap<String, String> = HashMap::new(),
            last_seen_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
