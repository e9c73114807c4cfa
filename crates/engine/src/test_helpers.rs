// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: a fleet over one in-memory store.

use crate::config::CoordinationConfig;
use crate::coordinator::Coordinator;
use flotilla_adapters::{DirectConnector, LocalExecutor, PlanExecutor};
use flotilla_core::{Clock, ExecutionPlan, FakeClock, PlanId, PlanState, WorldBuilder, WorldKind};
use flotilla_storage::{MemoryPersistence, Persistence};
use std::sync::Arc;
use std::time::Duration;

/// Poll the store until the plan reaches `state`; spawned executions run
/// on ready futures, so yielding is enough to let them make progress.
pub(crate) async fn wait_for_plan_state(
    store: &MemoryPersistence,
    id: &PlanId,
    state: PlanState,
) -> ExecutionPlan {
    for _ in 0..500 {
        if let Ok(plan) = store.load_plan(id).await {
            if plan.state == state {
                return plan;
            }
        }
        tokio::task::yield_now().await;
    }
    panic!("plan {id} never reached {state}");
}

/// Validity timeout used across engine tests.
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_millis(200);

pub(crate) fn test_config() -> CoordinationConfig {
    CoordinationConfig::default()
        .validity_check_timeout(TEST_TIMEOUT)
        .heartbeat_interval(Duration::from_millis(50))
}

/// Shared backend for a test fleet.
#[derive(Clone)]
pub(crate) struct Fleet {
    pub store: MemoryPersistence,
    pub connector: DirectConnector,
    pub clock: FakeClock,
}

impl Fleet {
    pub fn new() -> Self {
        Self {
            store: MemoryPersistence::new(),
            connector: DirectConnector::new(),
            clock: FakeClock::new(),
        }
    }

    /// Coordinator for an executor world with a local executor attached.
    pub fn executor(&self, id: &str) -> Arc<Coordinator<FakeClock>> {
        self.executor_with_config(id, test_config())
    }

    pub fn executor_with_config(
        &self,
        id: &str,
        config: CoordinationConfig,
    ) -> Arc<Coordinator<FakeClock>> {
        let world = WorldBuilder::default().id(id).kind(WorldKind::Executor).build();
        let executor = LocalExecutor::new(
            world.id.clone(),
            Arc::new(self.store.clone()),
            self.clock.clone(),
        );
        Coordinator::new(
            world,
            Arc::new(self.store.clone()),
            Arc::new(self.connector.clone()),
            Some(Arc::new(executor) as Arc<dyn PlanExecutor>),
            config,
            self.clock.clone(),
        )
    }

    /// Coordinator for a client world (no executor attached).
    pub fn client(&self, id: &str) -> Arc<Coordinator<FakeClock>> {
        let world = WorldBuilder::default().id(id).kind(WorldKind::Client).build();
        Coordinator::new(
            world,
            Arc::new(self.store.clone()),
            Arc::new(self.connector.clone()),
            None,
            test_config(),
            self.clock.clone(),
        )
    }

    /// Register a coordinator's world with a fresh heartbeat.
    pub async fn join(&self, coordinator: &Arc<Coordinator<FakeClock>>) {
        coordinator
            .registry()
            .register(coordinator.world())
            .await
            .unwrap_or_else(|e| panic!("registration failed: {e}"));
    }

    /// Age every heartbeat past the validity timeout.
    pub fn age_past_timeout(&self) {
        self.clock.advance(TEST_TIMEOUT + Duration::from_millis(1));
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}
