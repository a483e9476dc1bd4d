//! Background builder worker
//!
//! Runs [`TreeBuilder`] passes on a fixed interval for the lifetime of the server.
//! Only one pass runs at a time: a tick that finds the previous pass still running
//! is skipped. Shutdown is observed between passes, never mid-pass.

use super::builder::{PassReport, TreeBuilder};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Scheduled owner of the tree builder
pub struct BuilderWorker {
    builder: Arc<AsyncMutex<TreeBuilder>>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BuilderWorker {
    pub fn new(builder: TreeBuilder, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            builder: Arc::new(AsyncMutex::new(builder)),
            interval,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Start the background loop. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        // A receiver subscribed now only sees shutdowns sent after this start.
        self.shutdown.send_replace(false);
        let shutdown = self.shutdown.subscribe();
        let builder = Arc::clone(&self.builder);
        let interval = self.interval;

        *handle = Some(tokio::spawn(async move {
            Self::run_loop(builder, interval, shutdown).await;
        }));
        info!(interval_ms = interval.as_millis() as u64, "Started projection builder");
    }

    /// Signal shutdown and wait for the loop to finish its current pass
    pub async fn stop(&self) {
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(e) = handle.await {
            error!(error = %e, "Projection builder task ended abnormally");
        }
        info!("Stopped projection builder");
    }

    /// Run one pass now, unless one is already running or there is nothing to do
    pub async fn tick(&self) -> Option<PassReport> {
        Self::tick_with(&self.builder).await
    }

    async fn run_loop(
        builder: Arc<AsyncMutex<TreeBuilder>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }
            Self::tick_with(&builder).await;
        }
        debug!("Projection builder loop exited");
    }

    async fn tick_with(builder: &AsyncMutex<TreeBuilder>) -> Option<PassReport> {
        let Ok(mut builder) = builder.try_lock() else {
            debug!("Previous projection pass still running, skipping tick");
            return None;
        };
        if !builder.has_work() {
            return None;
        }

        info!("Updating projection");
        match builder.run_pass().await {
            Ok(report) => {
                info!(
                    bootstrapped = report.bootstrapped,
                    removed = report.removed,
                    reindexed = report.reindexed,
                    reflowed = report.reflowed,
                    failed = report.failed,
                    duration_ms = report.duration_ms,
                    "Projection update completed"
                );
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Projection pass failed, retrying next tick");
                None
            }
        }
    }
}
