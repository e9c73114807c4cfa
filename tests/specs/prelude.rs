// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared cluster harness for the coordination specs.

pub use flotilla_adapters::{Connector, DirectConnector, LocalExecutor, PlanExecutor};
pub use flotilla_core::{
    Clock, ExecutionPlan, FakeClock, HistoryEventName, Lock, LockKind, PlanId, PlanResult,
    PlanState, RescueStrategy, StepBuilder, StepState, World, WorldBuilder, WorldId, WorldKind,
};
pub use flotilla_engine::{
    Coordinator, CoordinationConfig, InvalidationOutcome, WorldHandle, WorldValidity,
};
pub use flotilla_storage::{LockFilter, MemoryPersistence, Persistence, WorldFilter};
pub use std::sync::Arc;
pub use std::time::Duration;

pub const VALIDITY_TIMEOUT: Duration = Duration::from_millis(200);

/// A fleet's shared backend: one store, one connector, one fake clock.
#[derive(Clone)]
pub struct Cluster {
    pub store: MemoryPersistence,
    pub connector: DirectConnector,
    pub clock: FakeClock,
}

impl Cluster {
    pub fn new() -> Self {
        Self {
            store: MemoryPersistence::new(),
            connector: DirectConnector::new(),
            clock: FakeClock::new(),
        }
    }

    /// Startup checks are opted into per test; specs that want them pass a
    /// config built from `self.config()` with the flag flipped on.
    pub fn config(&self) -> CoordinationConfig {
        CoordinationConfig::default()
            .validity_check_timeout(VALIDITY_TIMEOUT)
            .heartbeat_interval(Duration::from_millis(50))
            .auto_validity_check(false)
    }

    pub fn executor_coordinator(&self, id: &str) -> Arc<Coordinator<FakeClock>> {
        self.executor_with_config(id, self.config())
    }

    pub fn executor_with_config(
        &self,
        id: &str,
        config: CoordinationConfig,
    ) -> Arc<Coordinator<FakeClock>> {
        let world = WorldBuilder::default().id(id).kind(WorldKind::Executor).build();
        let executor =
            LocalExecutor::new(world.id.clone(), Arc::new(self.store.clone()), self.clock.clone());
        Coordinator::new(
            world,
            Arc::new(self.store.clone()),
            Arc::new(self.connector.clone()),
            Some(Arc::new(executor) as Arc<dyn PlanExecutor>),
            config,
            self.clock.clone(),
        )
    }

    pub fn client_coordinator(&self, id: &str) -> Arc<Coordinator<FakeClock>> {
        let world = WorldBuilder::default().id(id).kind(WorldKind::Client).build();
        Coordinator::new(
            world,
            Arc::new(self.store.clone()),
            Arc::new(self.connector.clone()),
            None,
            self.config(),
            self.clock.clone(),
        )
    }

    /// Start a full executor world (registered, listening, heartbeating).
    pub async fn start_executor(&self, id: &str) -> WorldHandle<FakeClock> {
        WorldHandle::start(self.executor_coordinator(id))
            .await
            .unwrap_or_else(|e| panic!("executor {id} failed to start: {e}"))
    }

    pub async fn start_client(&self, id: &str) -> WorldHandle<FakeClock> {
        WorldHandle::start(self.client_coordinator(id))
            .await
            .unwrap_or_else(|e| panic!("client {id} failed to start: {e}"))
    }

    /// Register a world row directly, as if the process joined and died
    /// without deregistering.
    pub async fn register_corpse(&self, id: &str, kind: WorldKind) -> World {
        let mut world = WorldBuilder::default().id(id).kind(kind).build();
        world.last_seen_ms = self.clock.epoch_ms();
        self.store.register_world(world.clone()).await.unwrap();
        world
    }

    pub fn age_past_timeout(&self) {
        self.clock.advance(VALIDITY_TIMEOUT + Duration::from_millis(1));
    }

    /// A running plan owned by `executor_id`, execution lock in place and
    /// `start execution` already in its history.
    pub async fn seed_running_plan(&self, executor_id: &str, rescue: RescueStrategy) -> ExecutionPlan {
        let owner = WorldId::from_string(executor_id);
        let mut plan = ExecutionPlan::builder()
            .state(PlanState::Running)
            .executor(executor_id)
            .step(StepBuilder::default().state(StepState::Success).rescue(rescue).build())
            .step(StepBuilder::default().state(StepState::Running).rescue(rescue).build())
            .build();
        plan.record_history(HistoryEventName::StartExecution, owner.clone(), self.clock.epoch_ms());
        self.store.save_plan(&mut plan).await.unwrap();
        self.store.insert_lock(Lock::execution(plan.id.clone(), owner)).await.unwrap();
        plan
    }

    pub async fn wait_for_plan_state(&self, id: &PlanId, state: PlanState) -> ExecutionPlan {
        for _ in 0..1000 {
            if let Ok(plan) = self.store.load_plan(id).await {
                if plan.state == state {
                    return plan;
                }
            }
            tokio::task::yield_now().await;
        }
        panic!("plan {id} never reached {state}");
    }
}

/// History as (event, world) pairs for compact assertions.
pub fn history_of(plan: &ExecutionPlan) -> Vec<(HistoryEventName, WorldId)> {
    plan.execution_history.iter().map(|e| (e.name, e.world_id.clone())).collect()
}

pub fn he(name: HistoryEventName, world: &str) -> (HistoryEventName, WorldId) {
    (name, WorldId::from_string(world))
}
