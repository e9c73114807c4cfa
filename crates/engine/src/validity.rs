// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consistency sweeps: stale worlds and orphaned locks.
//!
//! Run on executor startup before the world announces itself ready, and on
//! demand by operators. Every queried world always gets a definite
//! verdict — a failed invalidation downgrades to `invalid` instead of
//! disappearing from the result.

use crate::coordinator::Coordinator;
use crate::error::CoordinationError;
use crate::invalidator::InvalidationOutcome;
use flotilla_core::{Clock, Lock, LockKind, PlanResult, PlanState, WorldId};
use flotilla_storage::{LockFilter, WorldFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Verdict for one world in a validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldValidity {
    Valid,
    /// Heartbeat expired; the world was not (or could not be) reclaimed.
    Invalid,
    /// Heartbeat expired and this check reclaimed the world.
    Invalidated,
}

flotilla_core::simple_display! {
    WorldValidity {
        Valid => "valid",
        Invalid => "invalid",
        Invalidated => "invalidated",
    }
}

/// Scan the registry for stale worlds. With `invalidate`, reclaim each
/// stale world and upgrade its verdict; without it the verdict caps at
/// `Invalid` even if reclamation happens to run concurrently elsewhere.
pub(crate) async fn worlds_validity_check<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
    invalidate: bool,
    filter: &WorldFilter,
) -> Result<HashMap<WorldId, WorldValidity>, CoordinationError> {
    let worlds = coordinator.registry().find_all(filter).await?;
    let mut verdicts = HashMap::with_capacity(worlds.len());

    for world in worlds {
        if !coordinator.registry().is_stale(&world) {
            verdicts.insert(world.id.clone(), WorldValidity::Valid);
            continue;
        }
        if !invalidate {
            verdicts.insert(world.id.clone(), WorldValidity::Invalid);
            continue;
        }
        let verdict = match coordinator.invalidate(&world).await {
            Ok(InvalidationOutcome::Completed) | Ok(InvalidationOutcome::AlreadyDone) => {
                WorldValidity::Invalidated
            }
            Ok(InvalidationOutcome::AlreadyRunning) => WorldValidity::Invalid,
            Err(e) => {
                warn!(world = %world.id, error = %e, "invalidation failed during validity check");
                WorldValidity::Invalid
            }
        };
        verdicts.insert(world.id.clone(), verdict);
    }
    Ok(verdicts)
}

/// Remove locks whose owner is absent from the registry, then orphaned
/// singleton-action locks. Returns everything removed.
pub(crate) async fn locks_validity_check<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
) -> Result<Vec<Lock>, CoordinationError> {
    let mut removed = Vec::new();

    for lock in coordinator.locks().find(&LockFilter::default()).await? {
        let known = coordinator
            .registry()
            .find_all(&WorldFilter::by_id(lock.owner.clone()))
            .await?;
        if known.is_empty() {
            info!(lock = %lock.id(), owner = %lock.owner, "releasing lock of unregistered world");
            coordinator.locks().release_lock(&lock).await?;
            removed.push(lock);
        }
    }

    removed.extend(clean_orphaned_locks(coordinator).await?);
    Ok(removed)
}

/// Remove singleton-action locks whose referenced plan is missing,
/// stopped, or paused with a settled result.
pub(crate) async fn clean_orphaned_locks<C: Clock>(
    coordinator: &Arc<Coordinator<C>>,
) -> Result<Vec<Lock>, CoordinationError> {
    let filter = LockFilter::by_prefix(LockKind::SINGLETON_ACTION_PREFIX);
    let mut removed = Vec::new();

    for lock in coordinator.locks().find(&filter).await? {
        let orphan = match lock.plan_id() {
            None => true,
            Some(plan_id) => match coordinator.persistence().load_plan(plan_id).await {
                Err(e) if e.is_not_found() => true,
                Err(e) => return Err(e.into()),
                Ok(plan) => {
                    plan.is_terminal()
                        || (plan.state == PlanState::Paused && plan.result != PlanResult::Pending)
                }
            },
        };
        if orphan {
            info!(lock = %lock.id(), "releasing orphaned singleton lock");
            coordinator.locks().release_lock(&lock).await?;
            removed.push(lock);
        }
    }
    Ok(removed)
}

#[cfg(test)]
#[path = "validity_tests.rs"]
mod tests;
