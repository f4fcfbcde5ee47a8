//! Deferred operation queue and its background worker.
//!
//! One worker task serves the whole process. It drains an unbounded FIFO
//! channel, sleeps out each job's remaining cooldown, then dispatches the
//! device action. Failures are logged and dropped: the HTTP caller already
//! got its "queued" response, and nothing retries on its behalf. One bad
//! job never stops the worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::controller::ControllerInner;
use super::PowerAction;

/// A device action postponed to respect the per-port cooldown.
#[derive(Debug, Clone)]
pub struct DeferredJob {
    pub port: u16,
    pub action: PowerAction,
    pub delay: Duration,
}

/// Protocol on the worker channel. `Shutdown` is the sentinel that ends the
/// worker; closing the channel has the same effect.
#[derive(Debug)]
pub enum WorkerCommand {
    Run(DeferredJob),
    Shutdown,
}

/// Worker loop. The shutdown signal also cancels an in-flight cooldown
/// sleep, so stopping the process never waits out a pending delay.
pub(crate) async fn run_worker(
    inner: Arc<ControllerInner>,
    mut jobs: mpsc::UnboundedReceiver<WorkerCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("deferred-operation worker started");
    loop {
        let command = tokio::select! {
            command = jobs.recv() => command,
            _ = shutdown.changed() => break,
        };

        let job = match command {
            Some(WorkerCommand::Run(job)) => job,
            Some(WorkerCommand::Shutdown) | None => break,
        };

        if !job.delay.is_zero() {
            tokio::select! {
                _ = sleep(job.delay) => {}
                _ = shutdown.changed() => {
                    debug!(port = job.port, action = %job.action, "shutdown during cooldown, dropping job");
                    break;
                }
            }
        }

        info!(port = job.port, action = %job.action, "executing queued operation");
        match inner.dispatch(job.port, job.action).await {
            Ok(()) => {
                info!(port = job.port, action = %job.action, "queued operation completed");
            }
            Err(e) => {
                warn!(port = job.port, action = %job.action, error = %e, "queued operation failed");
            }
        }
    }
    debug!("deferred-operation worker stopped");
}
