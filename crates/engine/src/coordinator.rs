// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The coordinator: one world's handle on the fleet's shared state.
//!
//! Bundles the durable lock table, the world registry, the transport, and
//! the optional local executor, and exposes the reclamation entry points
//! (`invalidate`, `auto_execute`, the validity checks). Plan dispatch runs
//! through here so that lock bookkeeping stays in one place: whoever starts
//! an execution also arranges for its locks to be surrendered when the
//! plan reaches a resting state.

use crate::auto_execute;
use crate::config::CoordinationConfig;
use crate::error::CoordinationError;
use crate::invalidator::{self, InvalidationOutcome};
use crate::locks::{AcquireOutcome, LockLog, LockTable};
use crate::registry::WorldRegistry;
use crate::validity::{self, WorldValidity};
use flotilla_adapters::{Connector, PlanExecutor, WorldMessage};
use flotilla_core::{
    Clock, ExecutionPlan, HistoryEventName, Lock, LockKind, PlanId, PlanLockRole, PlanResult,
    PlanState, World, WorldId,
};
use flotilla_storage::{LockFilter, Persistence, WorldFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

/// Handle returned for a dispatched plan execution.
pub type ExecutionHandle = JoinHandle<Result<ExecutionPlan, CoordinationError>>;

pub struct Coordinator<C: Clock> {
    world: World,
    persistence: Arc<dyn Persistence>,
    locks: LockTable,
    registry: WorldRegistry<C>,
    connector: Arc<dyn Connector>,
    executor: Option<Arc<dyn PlanExecutor>>,
    config: CoordinationConfig,
    clock: C,
    /// Serializes this world's own critical sections; cross-world mutual
    /// exclusion flows through the durable lock table.
    section: tokio::sync::Mutex<()>,
}

impl<C: Clock> Coordinator<C> {
    pub fn new(
        world: World,
        persistence: Arc<dyn Persistence>,
        connector: Arc<dyn Connector>,
        executor: Option<Arc<dyn PlanExecutor>>,
        config: CoordinationConfig,
        clock: C,
    ) -> Arc<Self> {
        let locks = LockTable::new(Arc::clone(&persistence));
        let registry =
            WorldRegistry::new(Arc::clone(&persistence), clock.clone(), config.validity_check_timeout);
        Arc::new(Self {
            world,
            persistence,
            locks,
            registry,
            connector,
            executor,
            config,
            clock,
            section: tokio::sync::Mutex::new(()),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_id(&self) -> &WorldId {
        &self.world.id
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    pub fn lock_log(&self) -> &LockLog {
        self.locks.log()
    }

    pub fn registry(&self) -> &WorldRegistry<C> {
        &self.registry
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub fn executor_handle(&self) -> Option<&Arc<dyn PlanExecutor>> {
        self.executor.as_ref()
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub(crate) fn section(&self) -> &tokio::sync::Mutex<()> {
        &self.section
    }

    /// Whether this world can run plans locally.
    pub fn is_executor(&self) -> bool {
        self.world.is_executor() && self.executor.is_some()
    }

    // -- reclamation entry points --

    /// Declare `target` dead and reclaim everything it held.
    pub async fn invalidate(
        self: &Arc<Self>,
        target: &World,
    ) -> Result<InvalidationOutcome, CoordinationError> {
        invalidator::invalidate(self, target).await
    }

    /// Resume plans left without an owner. Returns handles for every
    /// execution dispatched by this sweep.
    pub async fn auto_execute(self: &Arc<Self>) -> Result<Vec<ExecutionHandle>, CoordinationError> {
        auto_execute::auto_execute(self).await
    }

    /// Scan the registry for stale worlds; optionally invalidate them.
    pub async fn worlds_validity_check(
        self: &Arc<Self>,
        invalidate: bool,
        filter: &WorldFilter,
    ) -> Result<HashMap<WorldId, WorldValidity>, CoordinationError> {
        validity::worlds_validity_check(self, invalidate, filter).await
    }

    /// Remove locks whose owner or referenced plan is gone.
    pub async fn locks_validity_check(self: &Arc<Self>) -> Result<Vec<Lock>, CoordinationError> {
        validity::locks_validity_check(self).await
    }

    /// Remove singleton-action locks whose plan is missing or terminal.
    pub async fn clean_orphaned_locks(self: &Arc<Self>) -> Result<Vec<Lock>, CoordinationError> {
        validity::clean_orphaned_locks(self).await
    }

    // -- plan dispatch --

    /// Pick a live executor for a plan whose owner is gone: this world when
    /// it can run plans, otherwise the first live executor by id.
    pub(crate) async fn pick_executor(
        &self,
        exclude: &WorldId,
    ) -> Result<Option<WorldId>, CoordinationError> {
        if self.is_executor() && self.world_id() != exclude {
            return Ok(Some(self.world_id().clone()));
        }
        let executors = self.registry.live_executors(exclude).await?;
        Ok(executors.into_iter().next().map(|w| w.id))
    }

    /// Load-mutate-save with one reload retry on an optimistic conflict.
    /// `mutate` must tolerate running against a newer version of the plan.
    pub(crate) async fn save_plan_with_retry<F>(
        &self,
        plan_id: &PlanId,
        mutate: F,
    ) -> Result<ExecutionPlan, CoordinationError>
    where
        F: Fn(&mut ExecutionPlan) -> Result<(), CoordinationError>,
    {
        let mut plan = self.persistence.load_plan(plan_id).await?;
        mutate(&mut plan)?;
        match self.persistence.save_plan(&mut plan).await {
            Ok(()) => Ok(plan),
            Err(e) if e.is_conflict() => {
                warn!(plan = %plan_id, "plan save conflicted, retrying once");
                let mut plan = self.persistence.load_plan(plan_id).await?;
                mutate(&mut plan)?;
                match self.persistence.save_plan(&mut plan).await {
                    Ok(()) => Ok(plan),
                    Err(e) if e.is_conflict() => {
                        Err(CoordinationError::ConflictPersisted { plan: plan_id.clone() })
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start executing a plan this world already holds the execution lock
    /// for: record `start execution`, take singleton-action locks for its
    /// live singleton steps, and hand it to the executor.
    pub async fn dispatch_plan(
        self: &Arc<Self>,
        plan_id: &PlanId,
    ) -> Result<ExecutionHandle, CoordinationError> {
        let me = self.world_id().clone();
        let now = self.clock.epoch_ms();
        let stamp = me.clone();
        let plan = self
            .save_plan_with_retry(plan_id, move |p| {
                p.record_history(HistoryEventName::StartExecution, stamp.clone(), now);
                Ok(())
            })
            .await?;

        for class in plan.live_singleton_classes() {
            let lock = Lock::singleton_action(class, plan_id.clone(), me.clone());
            if let AcquireOutcome::HeldBy(holder) = self.locks.acquire(lock).await? {
                warn!(plan = %plan_id, class, holder = %holder, "singleton action already locked elsewhere");
            }
        }

        Ok(self.spawn_execution(plan_id))
    }

    /// Run the executor in a task and surrender the plan's locks when it
    /// reaches a resting state. `start execution` must already be recorded.
    pub fn spawn_execution(self: &Arc<Self>, plan_id: &PlanId) -> ExecutionHandle {
        let coordinator = Arc::clone(self);
        let plan_id = plan_id.clone();
        let span = tracing::info_span!("execution", plan = %plan_id, world = %self.world.id);
        tokio::spawn(
            async move {
                let executor = coordinator
                    .executor
                    .clone()
                    .ok_or_else(|| CoordinationError::NoExecutor(coordinator.world_id().clone()))?;
                let result = executor.execute(&plan_id).await;
                coordinator.surrender_plan_locks(&plan_id).await;
                Ok(result?)
            }
            .instrument(span),
        )
    }

    /// Release the execution lock and, unless the plan is still resumable,
    /// its singleton-action locks.
    async fn surrender_plan_locks(&self, plan_id: &PlanId) {
        let resumable = match self.persistence.load_plan(plan_id).await {
            Ok(p) => {
                (p.state == PlanState::Paused && p.result == PlanResult::Pending)
                    || p.state == PlanState::Running
            }
            Err(_) => false,
        };

        let kind = LockKind::ExecutionPlan { plan: plan_id.clone(), role: PlanLockRole::Execution };
        if let Err(e) = self.locks.release(&kind, self.world_id()).await {
            warn!(plan = %plan_id, error = %e, "could not release execution lock");
        }

        if resumable {
            // Singleton locks stay with a plan that will run again.
            return;
        }
        let filter = LockFilter::by_prefix(LockKind::SINGLETON_ACTION_PREFIX);
        let singletons = match self.locks.find(&filter).await {
            Ok(locks) => locks,
            Err(e) => {
                warn!(plan = %plan_id, error = %e, "could not enumerate singleton locks");
                return;
            }
        };
        for lock in singletons {
            if lock.plan_id() == Some(plan_id) && &lock.owner == self.world_id() {
                if let Err(e) = self.locks.release_lock(&lock).await {
                    warn!(plan = %plan_id, error = %e, "could not release singleton lock");
                }
            }
        }
    }

    /// Dispatch an incoming world message.
    pub async fn handle_message(self: &Arc<Self>, message: WorldMessage) {
        match message {
            WorldMessage::PlanDispatch { plan } => {
                if let Err(e) = self.dispatch_plan(&plan).await {
                    warn!(plan = %plan, error = %e, "dispatch failed");
                }
            }
            WorldMessage::ExecutionResumed { plan } => {
                // Detached; the task surrenders the plan's locks itself.
                let _ = self.spawn_execution(&plan);
            }
            WorldMessage::Ping => debug!(world = %self.world_id(), "ping"),
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
