// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable lock table with an observable lock log.
//!
//! Acquire/release are serializable per lock id (the persistence driver
//! guarantees per-row atomicity) and non-reentrant: a second acquire of a
//! held id reports `HeldBy` even for the same owner. The [`LockLog`]
//! records every successful `lock`/`unlock` in order; invalidation tests
//! assert exact sequences against it.

use flotilla_core::{Lock, LockKind, WorldId};
use flotilla_storage::{LockDelete, LockFilter, LockInsert, Persistence, StorageError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Outcome of an acquire attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    /// The lock id is already taken by the given world.
    HeldBy(WorldId),
}

/// Outcome of a release or ownership transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// No lock exists under that id.
    NotHeld,
    /// The lock is owned by the given world, not the expected one.
    WrongOwner(WorldId),
}

/// Observable acquire/release trail, shared by clone.
#[derive(Clone, Default)]
pub struct LockLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl LockLog {
    fn record_lock(&self, id: &str) {
        self.entries.lock().push(format!("lock {id}"));
    }

    fn record_unlock(&self, id: &str) {
        self.entries.lock().push(format!("unlock {id}"));
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Durable named locks over the shared store.
#[derive(Clone)]
pub struct LockTable {
    persistence: Arc<dyn Persistence>,
    log: LockLog,
}

impl LockTable {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence, log: LockLog::default() }
    }

    pub fn log(&self) -> &LockLog {
        &self.log
    }

    pub async fn acquire(&self, lock: Lock) -> Result<AcquireOutcome, StorageError> {
        let id = lock.id();
        let owner = lock.owner.clone();
        match self.persistence.insert_lock(lock).await? {
            LockInsert::Inserted => {
                debug!(lock = %id, owner = %owner, "acquired");
                self.log.record_lock(&id);
                Ok(AcquireOutcome::Acquired)
            }
            LockInsert::Held(holder) => Ok(AcquireOutcome::HeldBy(holder)),
        }
    }

    pub async fn release(
        &self,
        kind: &LockKind,
        owner: &WorldId,
    ) -> Result<ReleaseOutcome, StorageError> {
        self.release_id(&kind.id(), owner).await
    }

    /// Release using the owner recorded on the lock row itself.
    pub async fn release_lock(&self, lock: &Lock) -> Result<ReleaseOutcome, StorageError> {
        self.release_id(&lock.id(), &lock.owner).await
    }

    async fn release_id(&self, id: &str, owner: &WorldId) -> Result<ReleaseOutcome, StorageError> {
        match self.persistence.delete_lock(id, owner).await? {
            LockDelete::Done => {
                debug!(lock = %id, owner = %owner, "released");
                self.log.record_unlock(id);
                Ok(ReleaseOutcome::Released)
            }
            LockDelete::NotHeld => Ok(ReleaseOutcome::NotHeld),
            LockDelete::OwnerMismatch(holder) => Ok(ReleaseOutcome::WrongOwner(holder)),
        }
    }

    /// Atomically reassign a held lock. Logged as an unlock/lock pair.
    pub async fn transfer(
        &self,
        kind: &LockKind,
        from: &WorldId,
        to: &WorldId,
    ) -> Result<ReleaseOutcome, StorageError> {
        let id = kind.id();
        match self.persistence.update_lock_owner(&id, from, to).await? {
            LockDelete::Done => {
                debug!(lock = %id, from = %from, to = %to, "transferred");
                self.log.record_unlock(&id);
                self.log.record_lock(&id);
                Ok(ReleaseOutcome::Released)
            }
            LockDelete::NotHeld => Ok(ReleaseOutcome::NotHeld),
            LockDelete::OwnerMismatch(holder) => Ok(ReleaseOutcome::WrongOwner(holder)),
        }
    }

    pub async fn find(&self, filter: &LockFilter) -> Result<Vec<Lock>, StorageError> {
        self.persistence.find_locks(filter).await
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
