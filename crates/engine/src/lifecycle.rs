// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! World lifecycle: startup, heartbeating, message handling, clean exit.
//!
//! `WorldHandle::start` takes a freshly built coordinator through the full
//! join sequence — register, listen, optional role locks, startup validity
//! sweep — and keeps the heartbeat row fresh until `stop`. A clean stop
//! pauses any plans this world was running and surrenders every lock, so
//! nothing is left for a later invalidation to reclaim.

use crate::coordinator::Coordinator;
use crate::error::CoordinationError;
use crate::locks::AcquireOutcome;
use flotilla_core::{Clock, HistoryEventName, Lock, PlanState};
use flotilla_storage::{LockFilter, WorldFilter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A started world: coordinator plus its background tasks.
pub struct WorldHandle<C: Clock> {
    coordinator: Arc<Coordinator<C>>,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl<C: Clock> WorldHandle<C> {
    /// Run the join sequence and spawn the background tasks.
    pub async fn start(coordinator: Arc<Coordinator<C>>) -> Result<Self, CoordinationError> {
        let world = coordinator.world().clone();
        coordinator.registry().register(&world).await?;

        let (tx, mut rx) = mpsc::channel(16);
        coordinator.connector().start_listening(&world.id, tx);

        if coordinator.is_executor() && coordinator.config().delayed_executor {
            let lock = Lock::delayed_executor(world.id.clone(), world.id.clone());
            if let AcquireOutcome::HeldBy(holder) = coordinator.locks().acquire(lock).await? {
                warn!(holder = %holder, "delayed-executor role already taken");
            }
        }

        if coordinator.config().auto_validity_check_for(world.kind) {
            coordinator.worlds_validity_check(true, &WorldFilter::default()).await?;
            coordinator.locks_validity_check().await?;
        }

        let cancel = CancellationToken::new();

        let listener = {
            let coordinator = Arc::clone(&coordinator);
            let token = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        message = rx.recv() => match message {
                            Some(message) => coordinator.handle_message(message).await,
                            None => break,
                        },
                    }
                }
            })
        };

        let heartbeat = {
            let coordinator = Arc::clone(&coordinator);
            let token = cancel.clone();
            let interval = coordinator.config().heartbeat_interval;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            if let Err(e) = coordinator.registry().heartbeat(coordinator.world_id()).await {
                                warn!(error = %e, "heartbeat failed");
                            }
                        }
                    }
                }
            })
        };

        info!(world = %world.id, kind = %world.kind, "world ready");
        Ok(Self { coordinator, cancel, listener, heartbeat })
    }

    pub fn coordinator(&self) -> &Arc<Coordinator<C>> {
        &self.coordinator
    }

    /// Clean exit: stop the background tasks, pause owned running plans,
    /// surrender every lock, deregister.
    pub async fn stop(self) -> Result<(), CoordinationError> {
        let coordinator = &self.coordinator;
        let world = coordinator.world().clone();

        self.cancel.cancel();
        let _ = self.listener.await;
        let _ = self.heartbeat.await;
        coordinator.connector().stop_listening(&world.id);

        if let Some(executor) = coordinator.executor_handle() {
            if let Err(e) = executor.terminate().await {
                warn!(error = %e, "executor refused to terminate cleanly");
            }
        }

        let owned = coordinator.locks().find(&LockFilter::by_owner(world.id.clone())).await?;
        for lock in owned {
            if lock.kind.is_execution() {
                if let Some(plan_id) = lock.plan_id() {
                    let plan_id = plan_id.clone();
                    let me = world.id.clone();
                    let now = coordinator.clock().epoch_ms();
                    let paused = coordinator
                        .save_plan_with_retry(&plan_id, move |p| {
                            if p.state == PlanState::Running {
                                p.record_history(
                                    HistoryEventName::PauseExecution,
                                    me.clone(),
                                    now,
                                );
                                p.transition_to(PlanState::Paused)?;
                            }
                            Ok(())
                        })
                        .await;
                    match paused {
                        Ok(_) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => warn!(plan = %plan_id, error = %e, "could not pause plan on shutdown"),
                    }
                }
            }
            if let Err(e) = coordinator.locks().release_lock(&lock).await {
                warn!(lock = %lock.id(), error = %e, "could not release lock on shutdown");
            }
        }

        coordinator.registry().deregister(&world.id).await?;
        info!(world = %world.id, "world stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
