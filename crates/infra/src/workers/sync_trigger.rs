//! Periodic incremental-sync trigger.
//!
//! Fires `incremental_sync` on a fixed interval until shut down. Ticks that
//! arrive while a previous run is still going are skipped, and the engine
//! itself turns a tick during a full reload into a no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::reconcile::ReconciliationEngine;

/// Handle to stop the trigger and wait for it.
#[derive(Debug)]
pub struct TriggerHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl TriggerHandle {
    /// Request graceful shutdown and wait for the loop to exit.
    ///
    /// A sync already in flight is allowed to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "sync trigger task ended abnormally");
        }
    }
}

pub struct SyncTrigger;

impl SyncTrigger {
    /// Spawn the trigger on the current tokio runtime.
    ///
    /// The first tick fires immediately.
    pub fn spawn(engine: Arc<ReconciliationEngine>, interval: Duration) -> TriggerHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown.clone();

        let join = tokio::spawn(async move {
            tracing::info!(interval = ?interval, "sync trigger started");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = signal.notified() => {
                        tracing::info!("sync trigger received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        match engine.incremental_sync().await {
                            Ok(outcome) if outcome.skipped => {
                                tracing::debug!("tick skipped, full reload running");
                            }
                            Ok(outcome) => {
                                tracing::debug!(applied = outcome.applied, "scheduled sync completed");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "scheduled sync failed");
                            }
                        }
                    }
                }
            }

            tracing::info!("sync trigger stopped");
        });

        TriggerHandle { shutdown, join }
    }
}
