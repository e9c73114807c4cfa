// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable named locks.
//!
//! All cross-world mutual exclusion flows through locks: plan ownership,
//! reclamation of dead worlds, singleton actions, and the cluster-wide
//! auto-execute sweep. The lock id string is derived from the kind, so two
//! worlds competing for the same resource always collide on the same row.

use crate::plan::PlanId;
use crate::world::WorldId;
use serde::{Deserialize, Serialize};

/// Role an `execution-plan` lock is held in.
///
/// Planning and execution never overlap, so both roles share one lock id:
/// a plan has at most one active `execution-plan` lock at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanLockRole {
    /// Held by the client world while it materializes the plan.
    Planning,
    /// Held by the executor world that owns running the plan.
    Execution,
}

crate::simple_display! {
    PlanLockRole {
        Planning => "planning",
        Execution => "execution",
    }
}

/// What a lock protects. Determines the durable lock id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LockKind {
    /// Held by the world performing reclamation of the named world.
    WorldInvalidation { world: WorldId },
    /// Held by whoever owns the plan's planning or execution.
    ExecutionPlan { plan: PlanId, role: PlanLockRole },
    /// Held while a plan containing the singleton action class is
    /// non-terminal. The payload records the owning plan so orphans can be
    /// detected.
    SingletonAction { class: String, plan: PlanId },
    /// Cluster-wide singleton: whoever holds it is currently sweeping.
    AutoExecute,
    /// Held by a world running the delayed-dispatch role.
    DelayedExecutor { world: WorldId },
}

impl LockKind {
    pub const WORLD_INVALIDATION_PREFIX: &'static str = "world-invalidation:";
    pub const EXECUTION_PLAN_PREFIX: &'static str = "execution-plan:";
    pub const SINGLETON_ACTION_PREFIX: &'static str = "singleton-action:";
    pub const AUTO_EXECUTE_ID: &'static str = "auto-execute";
    pub const DELAYED_EXECUTOR_PREFIX: &'static str = "delayed-executor:";

    /// The durable lock id. Two kinds that must exclude each other map to
    /// the same id (planning vs execution of one plan).
    pub fn id(&self) -> String {
        match self {
            LockKind::WorldInvalidation { world } => {
                format!("{}{}", Self::WORLD_INVALIDATION_PREFIX, world)
            }
            LockKind::ExecutionPlan { plan, .. } => {
                format!("{}{}", Self::EXECUTION_PLAN_PREFIX, plan)
            }
            LockKind::SingletonAction { class, .. } => {
                format!("{}{}", Self::SINGLETON_ACTION_PREFIX, class)
            }
            LockKind::AutoExecute => Self::AUTO_EXECUTE_ID.to_string(),
            LockKind::DelayedExecutor { world } => {
                format!("{}{}", Self::DELAYED_EXECUTOR_PREFIX, world)
            }
        }
    }

    /// Plan the lock references, if any.
    pub fn plan_id(&self) -> Option<&PlanId> {
        match self {
            LockKind::ExecutionPlan { plan, .. } | LockKind::SingletonAction { plan, .. } => {
                Some(plan)
            }
            _ => None,
        }
    }

    pub fn is_planning(&self) -> bool {
        matches!(self, LockKind::ExecutionPlan { role: PlanLockRole::Planning, .. })
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, LockKind::ExecutionPlan { role: PlanLockRole::Execution, .. })
    }

    pub fn is_singleton_action(&self) -> bool {
        matches!(self, LockKind::SingletonAction { .. })
    }
}

crate::simple_display! {
    LockKind {
        WorldInvalidation { .. } => "world-invalidation",
        ExecutionPlan { .. } => "execution-plan",
        SingletonAction { .. } => "singleton-action",
        AutoExecute => "auto-execute",
        DelayedExecutor { .. } => "delayed-executor",
    }
}

/// A durable lock row: a kind plus the world holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub kind: LockKind,
    pub owner: WorldId,
}

impl Lock {
    pub fn new(kind: LockKind, owner: WorldId) -> Self {
        Self { kind, owner }
    }

    pub fn id(&self) -> String {
        self.kind.id()
    }

    pub fn plan_id(&self) -> Option<&PlanId> {
        self.kind.plan_id()
    }

    pub fn world_invalidation(target: &WorldId, owner: WorldId) -> Self {
        Self::new(LockKind::WorldInvalidation { world: target.clone() }, owner)
    }

    pub fn planning(plan: PlanId, owner: WorldId) -> Self {
        Self::new(
            LockKind::ExecutionPlan { plan, role: PlanLockRole::Planning },
            owner,
        )
    }

    pub fn execution(plan: PlanId, owner: WorldId) -> Self {
        Self::new(
            LockKind::ExecutionPlan { plan, role: PlanLockRole::Execution },
            owner,
        )
    }

    pub fn singleton_action(class: impl Into<String>, plan: PlanId, owner: WorldId) -> Self {
        Self::new(LockKind::SingletonAction { class: class.into(), plan }, owner)
    }

    pub fn auto_execute(owner: WorldId) -> Self {
        Self::new(LockKind::AutoExecute, owner)
    }

    pub fn delayed_executor(world: WorldId, owner: WorldId) -> Self {
        Self::new(LockKind::DelayedExecutor { world }, owner)
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
