// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test adapters for exercising storage failure paths in other crates.
//!
//! Available via the `test-support` feature.

use crate::error::StorageError;
use crate::memory::MemoryPersistence;
use crate::persistence::{
    LockDelete, LockFilter, LockInsert, Persistence, PlanFilter, WorldFilter,
};
use async_trait::async_trait;
use flotilla_core::{ExecutionPlan, Lock, PlanId, Step, StepId, World, WorldId};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Delegating adapter that fails the next `n` plan saves with `Conflict`.
///
/// Everything else passes straight through to the wrapped
/// [`MemoryPersistence`].
pub struct FlakyPersistence {
    inner: MemoryPersistence,
    conflicts_remaining: AtomicUsize,
}

impl FlakyPersistence {
    pub fn conflicting(inner: MemoryPersistence, conflicts: usize) -> Self {
        Self { inner, conflicts_remaining: AtomicUsize::new(conflicts) }
    }

    fn take_conflict(&self) -> bool {
        self.conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Persistence for FlakyPersistence {
    async fn load_plan(&self, id: &PlanId) -> Result<ExecutionPlan, StorageError> {
        self.inner.load_plan(id).await
    }

    async fn save_plan(&self, plan: &mut ExecutionPlan) -> Result<(), StorageError> {
        if self.take_conflict() {
            return Err(StorageError::conflict("plan", plan.id.as_str()));
        }
        self.inner.save_plan(plan).await
    }

    async fn find_plans(&self, filter: &PlanFilter) -> Result<Vec<ExecutionPlan>, StorageError> {
        self.inner.find_plans(filter).await
    }

    async fn delete_plans(&self, filter: &PlanFilter) -> Result<usize, StorageError> {
        self.inner.delete_plans(filter).await
    }

    async fn load_step(&self, plan_id: &PlanId, step_id: &StepId) -> Result<Step, StorageError> {
        self.inner.load_step(plan_id, step_id).await
    }

    async fn save_step(&self, plan_id: &PlanId, step: &Step) -> Result<(), StorageError> {
        self.inner.save_step(plan_id, step).await
    }

    async fn insert_lock(&self, lock: Lock) -> Result<LockInsert, StorageError> {
        self.inner.insert_lock(lock).await
    }

    async fn delete_lock(
        &self,
        id: &str,
        expected_owner: &WorldId,
    ) -> Result<LockDelete, StorageError> {
        self.inner.delete_lock(id, expected_owner).await
    }

    async fn update_lock_owner(
        &self,
        id: &str,
        from: &WorldId,
        to: &WorldId,
    ) -> Result<LockDelete, StorageError> {
        self.inner.update_lock_owner(id, from, to).await
    }

    async fn find_locks(&self, filter: &LockFilter) -> Result<Vec<Lock>, StorageError> {
        self.inner.find_locks(filter).await
    }

    async fn register_world(&self, world: World) -> Result<(), StorageError> {
        self.inner.register_world(world).await
    }

    async fn heartbeat_world(&self, id: &WorldId, now_ms: u64) -> Result<(), StorageError> {
        self.inner.heartbeat_world(id, now_ms).await
    }

    async fn deregister_world(&self, id: &WorldId) -> Result<bool, StorageError> {
        self.inner.deregister_world(id).await
    }

    async fn find_worlds(
        &self,
        filter: &WorldFilter,
        stale_before_ms: Option<u64>,
    ) -> Result<Vec<World>, StorageError> {
        self.inner.find_worlds(filter, stale_before_ms).await
    }
}
