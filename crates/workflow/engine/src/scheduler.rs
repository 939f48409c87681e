//! Timer scheduler: the background loop driving durable timers
//!
//! Timers live in the [`InstanceStore`](crate::InstanceStore), not in
//! process memory, so delivery survives restarts. The scheduler is a
//! polling sweep: every period it asks the engine to fire whatever is
//! due. A timer may therefore fire late, and after a crash it may fire
//! more than once; the engine's stale-signal handling absorbs both.

use crate::WorkflowEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Store-backed polling scheduler.
pub struct TimerScheduler {
    engine: Arc<WorkflowEngine>,
    period: Duration,
}

impl TimerScheduler {
    pub fn new(engine: Arc<WorkflowEngine>, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Spawn the sweep loop on the current runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let engine = self.engine;
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match engine.sweep_timers().await {
                            Ok(fired) if fired > 0 => {
                                tracing::debug!(fired, "Timer sweep fired timers");
                            }
                            Ok(_) => {}
                            Err(err) => {
                                tracing::warn!(error = %err, "Timer sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Timer scheduler stopping");
                            break;
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}
