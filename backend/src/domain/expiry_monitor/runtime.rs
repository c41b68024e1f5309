//! Spawned polling loop and its owning handle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ExpiryMonitor, MIN_MONITOR_INTERVAL};

/// Owns a running monitor task.
///
/// Dropping the handle cancels the task; [`ExpiryMonitorHandle::shutdown`]
/// also waits for it to finish.
#[derive(Debug)]
pub struct ExpiryMonitorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ExpiryMonitorHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "expiry monitor task ended abnormally");
        }
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for ExpiryMonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ExpiryMonitor {
    /// Run a check immediately, then on every interval tick, until the
    /// returned handle is shut down or dropped.
    #[must_use = "dropping the handle stops the monitor"]
    pub fn spawn(self) -> ExpiryMonitorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(Arc::new(self), cancel.clone()));
        ExpiryMonitorHandle {
            cancel,
            task: Some(task),
        }
    }
}

async fn run_loop(monitor: Arc<ExpiryMonitor>, cancel: CancellationToken) {
    let period = monitor.config().interval.max(MIN_MONITOR_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        interval_secs = period.as_secs(),
        dedup = %monitor.config().dedup,
        "expiry monitor started"
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                monitor.run_check().await;
            }
        }
    }
    info!("expiry monitor stopped");
}
