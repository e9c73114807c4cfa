// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory persistence adapter.
//!
//! One parking_lot mutex guards the whole store, which gives every method
//! row atomicity for free and makes `save_plan` a genuine cross-row
//! transaction. Clones share the store, so a test fleet of worlds points
//! at one adapter the same way production worlds point at one database.

use crate::error::StorageError;
use crate::persistence::{
    LockDelete, LockFilter, LockInsert, Persistence, PlanFilter, WorldFilter,
};
use async_trait::async_trait;
use flotilla_core::{
    ExecutionPlan, HistoryEvent, Lock, PlanId, PlanResult, PlanState, Step, StepId, World, WorldId,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Plan row as stored: steps and history live in their own collections.
#[derive(Debug, Clone)]
struct PlanRow {
    state: PlanState,
    result: PlanResult,
    step_order: Vec<StepId>,
    planner_world_id: WorldId,
    executor_world_id: Option<WorldId>,
    version: u64,
    exception: Option<String>,
}

#[derive(Default)]
struct Store {
    plans: BTreeMap<PlanId, PlanRow>,
    steps: HashMap<PlanId, HashMap<StepId, Step>>,
    history: HashMap<PlanId, Vec<HistoryEvent>>,
    locks: BTreeMap<String, Lock>,
    worlds: BTreeMap<WorldId, World>,
}

impl Store {
    fn hydrate(&self, id: &PlanId, row: &PlanRow) -> ExecutionPlan {
        let step_rows = self.steps.get(id);
        let mut steps = indexmap::IndexMap::with_capacity(row.step_order.len());
        let mut missing: Vec<&StepId> = Vec::new();
        for step_id in &row.step_order {
            match step_rows.and_then(|m| m.get(step_id)) {
                Some(step) => {
                    steps.insert(step_id.clone(), step.clone());
                }
                None => missing.push(step_id),
            }
        }
        let exception = if missing.is_empty() {
            row.exception.clone()
        } else {
            let ids: Vec<String> = missing.iter().map(|s| s.to_string()).collect();
            Some(format!("steps missing from storage: {}", ids.join(", ")))
        };
        ExecutionPlan {
            id: id.clone(),
            state: row.state,
            result: row.result,
            steps,
            execution_history: self.history.get(id).cloned().unwrap_or_default(),
            planner_world_id: row.planner_world_id.clone(),
            executor_world_id: row.executor_world_id.clone(),
            version: row.version,
            exception,
        }
    }
}

/// Shared in-memory store; cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    store: Arc<Mutex<Store>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a single step row, leaving the plan's step order referencing it.
    /// Simulates partial storage damage for data-consistency tests.
    pub fn corrupt_step(&self, plan_id: &PlanId, step_id: &StepId) {
        let mut store = self.store.lock();
        if let Some(steps) = store.steps.get_mut(plan_id) {
            steps.remove(step_id);
        }
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load_plan(&self, id: &PlanId) -> Result<ExecutionPlan, StorageError> {
        let store = self.store.lock();
        let row = store
            .plans
            .get(id)
            .ok_or_else(|| StorageError::not_found("plan", id.as_str()))?;
        Ok(store.hydrate(id, row))
    }

    async fn save_plan(&self, plan: &mut ExecutionPlan) -> Result<(), StorageError> {
        let mut store = self.store.lock();
        if let Some(existing) = store.plans.get(&plan.id) {
            if existing.version != plan.version {
                debug!(plan = %plan.id, stored = existing.version, given = plan.version, "plan version conflict");
                return Err(StorageError::conflict("plan", plan.id.as_str()));
            }
        } else if plan.version != 0 {
            return Err(StorageError::conflict("plan", plan.id.as_str()));
        }
        plan.version += 1;
        let row = PlanRow {
            state: plan.state,
            result: plan.result,
            step_order: plan.steps.keys().cloned().collect(),
            planner_world_id: plan.planner_world_id.clone(),
            executor_world_id: plan.executor_world_id.clone(),
            version: plan.version,
            exception: plan.exception.clone(),
        };
        store.plans.insert(plan.id.clone(), row);
        store.steps.insert(
            plan.id.clone(),
            plan.steps.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        );
        store.history.insert(plan.id.clone(), plan.execution_history.clone());
        Ok(())
    }

    async fn find_plans(&self, filter: &PlanFilter) -> Result<Vec<ExecutionPlan>, StorageError> {
        let store = self.store.lock();
        Ok(store
            .plans
            .iter()
            .filter(|(id, row)| filter.matches(id, row.state))
            .map(|(id, row)| store.hydrate(id, row))
            .collect())
    }

    async fn delete_plans(&self, filter: &PlanFilter) -> Result<usize, StorageError> {
        let mut store = self.store.lock();
        let doomed: Vec<PlanId> = store
            .plans
            .iter()
            .filter(|(id, row)| filter.matches(id, row.state))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            store.plans.remove(id);
            store.steps.remove(id);
            store.history.remove(id);
        }
        Ok(doomed.len())
    }

    async fn load_step(&self, plan_id: &PlanId, step_id: &StepId) -> Result<Step, StorageError> {
        let store = self.store.lock();
        store
            .steps
            .get(plan_id)
            .and_then(|m| m.get(step_id))
            .cloned()
            .ok_or_else(|| StorageError::not_found("step", step_id.as_str()))
    }

    async fn save_step(&self, plan_id: &PlanId, step: &Step) -> Result<(), StorageError> {
        let mut store = self.store.lock();
        if !store.plans.contains_key(plan_id) {
            return Err(StorageError::not_found("plan", plan_id.as_str()));
        }
        store
            .steps
            .entry(plan_id.clone())
            .or_default()
            .insert(step.id.clone(), step.clone());
        Ok(())
    }

    async fn insert_lock(&self, lock: Lock) -> Result<LockInsert, StorageError> {
        let mut store = self.store.lock();
        let id = lock.id();
        if let Some(existing) = store.locks.get(&id) {
            return Ok(LockInsert::Held(existing.owner.clone()));
        }
        store.locks.insert(id, lock);
        Ok(LockInsert::Inserted)
    }

    async fn delete_lock(
        &self,
        id: &str,
        expected_owner: &WorldId,
    ) -> Result<LockDelete, StorageError> {
        let mut store = self.store.lock();
        match store.locks.get(id) {
            None => Ok(LockDelete::NotHeld),
            Some(lock) if &lock.owner != expected_owner => {
                Ok(LockDelete::OwnerMismatch(lock.owner.clone()))
            }
            Some(_) => {
                store.locks.remove(id);
                Ok(LockDelete::Done)
            }
        }
    }

    async fn update_lock_owner(
        &self,
        id: &str,
        from: &WorldId,
        to: &WorldId,
    ) -> Result<LockDelete, StorageError> {
        let mut store = self.store.lock();
        match store.locks.get_mut(id) {
            None => Ok(LockDelete::NotHeld),
            Some(lock) if &lock.owner != from => Ok(LockDelete::OwnerMismatch(lock.owner.clone())),
            Some(lock) => {
                lock.owner = to.clone();
                Ok(LockDelete::Done)
            }
        }
    }

    async fn find_locks(&self, filter: &LockFilter) -> Result<Vec<Lock>, StorageError> {
        let store = self.store.lock();
        Ok(store
            .locks
            .iter()
            .filter(|(id, lock)| filter.matches(id, &lock.owner))
            .map(|(_, lock)| lock.clone())
            .collect())
    }

    async fn register_world(&self, world: World) -> Result<(), StorageError> {
        let mut store = self.store.lock();
        debug!(world = %world.id, kind = %world.kind, "registering world");
        store.worlds.insert(world.id.clone(), world);
        Ok(())
    }

    async fn heartbeat_world(&self, id: &WorldId, now_ms: u64) -> Result<(), StorageError> {
        let mut store = self.store.lock();
        let world = store
            .worlds
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found("world", id.as_str()))?;
        world.last_seen_ms = now_ms;
        Ok(())
    }

    async fn deregister_world(&self, id: &WorldId) -> Result<bool, StorageError> {
        let mut store = self.store.lock();
        Ok(store.worlds.remove(id).is_some())
    }

    async fn find_worlds(
        &self,
        filter: &WorldFilter,
        stale_before_ms: Option<u64>,
    ) -> Result<Vec<World>, StorageError> {
        let store = self.store.lock();
        Ok(store
            .worlds
            .values()
            .filter(|w| filter.matches(w))
            .filter(|w| stale_before_ms.is_none_or(|cutoff| w.last_seen_ms >= cutoff))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
