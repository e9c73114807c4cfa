// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence contract consumed by the coordination core.
//!
//! Every mutation is atomic against concurrent readers of the same row;
//! cross-row atomicity is only promised where a method documents it
//! (`save_plan` persists the plan row, its steps, and its history as one
//! transaction). Drivers must be durable: a lock or world row written here
//! survives process restart.

use crate::error::StorageError;
use async_trait::async_trait;
use flotilla_core::{ExecutionPlan, Lock, PlanId, PlanState, Step, StepId, World, WorldId, WorldKind};

/// Filter for plan enumeration and deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFilter {
    pub id: Option<PlanId>,
    pub state: Option<PlanState>,
}

impl PlanFilter {
    pub fn by_state(state: PlanState) -> Self {
        Self { id: None, state: Some(state) }
    }

    pub fn by_id(id: PlanId) -> Self {
        Self { id: Some(id), state: None }
    }

    pub fn matches(&self, plan_id: &PlanId, state: PlanState) -> bool {
        self.id.as_ref().is_none_or(|id| id == plan_id)
            && self.state.is_none_or(|s| s == state)
    }
}

/// Filter for lock enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFilter {
    /// Exact lock id.
    pub id: Option<String>,
    /// Lock-id prefix, e.g. `singleton-action:`.
    pub id_prefix: Option<String>,
    pub owner: Option<WorldId>,
}

impl LockFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), ..Self::default() }
    }

    pub fn by_prefix(prefix: impl Into<String>) -> Self {
        Self { id_prefix: Some(prefix.into()), ..Self::default() }
    }

    pub fn by_owner(owner: WorldId) -> Self {
        Self { owner: Some(owner), ..Self::default() }
    }

    pub fn matches(&self, lock_id: &str, owner: &WorldId) -> bool {
        self.id.as_deref().is_none_or(|id| id == lock_id)
            && self.id_prefix.as_deref().is_none_or(|p| lock_id.starts_with(p))
            && self.owner.as_ref().is_none_or(|o| o == owner)
    }
}

/// Filter for world enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldFilter {
    pub id: Option<WorldId>,
    pub kind: Option<WorldKind>,
}

impl WorldFilter {
    pub fn by_id(id: WorldId) -> Self {
        Self { id: Some(id), kind: None }
    }

    pub fn executors() -> Self {
        Self { id: None, kind: Some(WorldKind::Executor) }
    }

    pub fn matches(&self, world: &World) -> bool {
        self.id.as_ref().is_none_or(|id| id == &world.id)
            && self.kind.is_none_or(|k| k == world.kind)
    }
}

/// Outcome of an atomic lock insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockInsert {
    Inserted,
    /// The lock id is already taken by the given world.
    Held(WorldId),
}

/// Outcome of a lock delete or ownership transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDelete {
    Done,
    /// No lock exists under that id.
    NotHeld,
    /// A lock exists but is owned by the given world, not the expected one.
    OwnerMismatch(WorldId),
}

/// Typed CRUD over the shared store. Object-safe; shared across tasks as
/// `Arc<dyn Persistence>`.
#[async_trait]
pub trait Persistence: Send + Sync {
    // -- plans --

    /// Load a plan with its steps and history hydrated.
    ///
    /// A plan row whose step references are damaged still loads: the
    /// missing steps are dropped and the plan comes back with
    /// `is_valid() == false` and `exception` populated.
    async fn load_plan(&self, id: &PlanId) -> Result<ExecutionPlan, StorageError>;

    /// Persist the plan row, its steps, and its history atomically.
    ///
    /// Optimistic concurrency: fails with `Conflict` unless `plan.version`
    /// matches the stored version; bumps `plan.version` on success.
    async fn save_plan(&self, plan: &mut ExecutionPlan) -> Result<(), StorageError>;

    /// Enumerate plans matching the filter, hydrated like `load_plan`.
    async fn find_plans(&self, filter: &PlanFilter) -> Result<Vec<ExecutionPlan>, StorageError>;

    /// Delete matching plans with their steps and history. Returns how many
    /// plans were removed.
    async fn delete_plans(&self, filter: &PlanFilter) -> Result<usize, StorageError>;

    // -- steps --

    async fn load_step(&self, plan_id: &PlanId, step_id: &StepId) -> Result<Step, StorageError>;

    /// Upsert one step row of an existing plan.
    async fn save_step(&self, plan_id: &PlanId, step: &Step) -> Result<(), StorageError>;

    // -- locks --

    /// Atomically insert a lock row; reports the current holder when the id
    /// is already taken.
    async fn insert_lock(&self, lock: Lock) -> Result<LockInsert, StorageError>;

    /// Delete the lock under `id` if it is owned by `expected_owner`.
    async fn delete_lock(
        &self,
        id: &str,
        expected_owner: &WorldId,
    ) -> Result<LockDelete, StorageError>;

    /// Atomically move the lock under `id` from one owner to another.
    async fn update_lock_owner(
        &self,
        id: &str,
        from: &WorldId,
        to: &WorldId,
    ) -> Result<LockDelete, StorageError>;

    /// Enumerate locks matching the filter, ordered by lock id.
    async fn find_locks(&self, filter: &LockFilter) -> Result<Vec<Lock>, StorageError>;

    // -- worlds --

    /// Insert or replace the registration row for `world.id`.
    async fn register_world(&self, world: World) -> Result<(), StorageError>;

    /// Refresh a world's `last_seen_ms`.
    async fn heartbeat_world(&self, id: &WorldId, now_ms: u64) -> Result<(), StorageError>;

    /// Remove a registration. Returns false when no row existed.
    async fn deregister_world(&self, id: &WorldId) -> Result<bool, StorageError>;

    /// Enumerate worlds matching the filter, ordered by world id. When
    /// `stale_before_ms` is set, worlds whose heartbeat is older are
    /// excluded.
    async fn find_worlds(
        &self,
        filter: &WorldFilter,
        stale_before_ms: Option<u64>,
    ) -> Result<Vec<World>, StorageError>;
}
