//! Background trigger loop for sync cycles.
//!
//! # Responsibility
//! - Fire `run_sync` on a fixed interval and whenever a sync is requested.
//! - Stop cleanly on shutdown.
//!
//! # Invariants
//! - Cycles run on their own tasks so a slow remote never delays tick detection.
//! - Overlap is rejected by the engine's phase guard; triggers are never queued.

use crate::sync::engine::{SyncEngine, SyncOutcome};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns the periodic trigger for one engine.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Starts the loop on the current tokio runtime.
    ///
    /// The first tick fires immediately, so a cycle runs at startup.
    pub fn spawn(engine: Arc<SyncEngine>) -> SchedulerHandle {
        let period = engine.config().sync_interval.max(MIN_SYNC_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                "event=scheduler module=scheduler status=start interval_ms={}",
                period.as_millis()
            );

            loop {
                let trigger = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => "tick",
                    _ = engine.sync_signal().notified() => "request",
                };
                debug!("event=scheduler module=scheduler status=trigger source={trigger}");

                let cycle_engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    if let SyncOutcome::AlreadySyncing = cycle_engine.run_sync().await {
                        debug!(
                            "event=scheduler module=scheduler status=dropped source={trigger} reason=busy"
                        );
                    }
                });
            }

            info!("event=scheduler module=scheduler status=stop");
        });

        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Owner handle for a running scheduler loop.
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the trigger loop. A cycle already in flight runs to completion.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!("event=scheduler module=scheduler status=error reason=join error={err}");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}
