//! Coordinator facade over the limiter, cooldown gate, and deferred queue.
//!
//! This is the contract the HTTP layer consumes: three mutating operations
//! and a status query, all returning synchronously. A request is never
//! blocked waiting for the device; when the cooldown disallows an immediate
//! call the caller gets a "queued" result and the background worker finishes
//! the job later.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::unifi::{DeviceError, PortActionClient};

use super::cooldown::{DeviceActivity, Gate};
use super::limiter::OperationLog;
use super::queue::{self, DeferredJob, WorkerCommand};
use super::{ceil_secs, PortPowerState, PortStatusReport, PowerAction, PowerOutcome};

/// State shared between the request path and the worker.
pub(crate) struct ControllerInner {
    pub(crate) client: Arc<dyn PortActionClient>,
    pub(crate) log: OperationLog,
    pub(crate) activity: DeviceActivity,
    /// All device calls for a port, immediate or deferred, serialize through
    /// this lock so they never overlap.
    device_locks: DashMap<u16, Arc<Mutex<()>>>,
}

impl ControllerInner {
    pub(crate) fn new(client: Arc<dyn PortActionClient>) -> Self {
        Self {
            client,
            log: OperationLog::new(),
            activity: DeviceActivity::new(),
            device_locks: DashMap::new(),
        }
    }

    /// Send the device action and, on success, mark the port's activity.
    pub(crate) async fn dispatch(&self, port: u16, action: PowerAction) -> Result<(), DeviceError> {
        let lock = self.device_locks.entry(port).or_default().clone();
        let _guard = lock.lock().await;

        self.client.power_cycle(port).await?;
        self.activity.mark(port, Instant::now());
        Ok(())
    }
}

/// Per-port power operation coordinator. Construct once at startup and share
/// via `Arc` with the HTTP layer.
pub struct PowerController {
    inner: Arc<ControllerInner>,
    jobs_tx: mpsc::UnboundedSender<WorkerCommand>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PowerController {
    /// Create the controller and spawn its background worker.
    pub fn new(client: Arc<dyn PortActionClient>) -> Self {
        let inner = Arc::new(ControllerInner::new(client));
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(queue::run_worker(inner.clone(), jobs_rx, shutdown_rx));

        Self {
            inner,
            jobs_tx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Power on a port. The controller API has no power-on primitive
    /// separate from a cycle, and a cycle already re-energizes the port, so
    /// this only records the request for status inference.
    pub fn power_on(&self, port: u16) -> PowerOutcome {
        self.inner
            .log
            .record(port, PowerAction::PowerOn, Instant::now());
        info!(port, "power_on recorded, no device action needed");
        PowerOutcome::no_action_needed(port)
    }

    pub async fn power_off(&self, port: u16) -> PowerOutcome {
        self.cycle_action(port, PowerAction::PowerOff).await
    }

    pub async fn power_cycle(&self, port: u16) -> PowerOutcome {
        self.cycle_action(port, PowerAction::PowerCycle).await
    }

    /// Shared path for the two operations that reach the device.
    async fn cycle_action(&self, port: u16, action: PowerAction) -> PowerOutcome {
        let now = Instant::now();

        if let Err(remaining) = self.inner.log.try_acquire(port, action, now) {
            let retry_after = ceil_secs(remaining);
            warn!(port, %action, retry_after, "request rate limited");
            return PowerOutcome::rate_limited(action, port, retry_after);
        }

        match self.inner.activity.check(port, now) {
            Gate::Ready => match self.inner.dispatch(port, action).await {
                Ok(()) => {
                    info!(port, %action, "device action executed");
                    PowerOutcome::cycling(action, port)
                }
                Err(e) => {
                    error!(port, %action, error = %e, "device action failed");
                    PowerOutcome::failed(action, port, e.to_string())
                }
            },
            Gate::CoolingDown(delay) => {
                let job = DeferredJob {
                    port,
                    action,
                    delay,
                };
                if self.jobs_tx.send(WorkerCommand::Run(job)).is_err() {
                    error!(port, %action, "deferred worker unavailable");
                    return PowerOutcome::failed(
                        action,
                        port,
                        "deferred worker unavailable".to_string(),
                    );
                }
                info!(port, %action, delay_secs = delay.as_secs_f64(), "device cooling down, operation queued");
                PowerOutcome::queued(action, port, delay)
            }
        }
    }

    /// Infer a port's power state from recorded request history. Reports
    /// `stopped` only when the last power-off acceptance is strictly more
    /// recent than the last power-on; defaults to `running`. Deliberately
    /// ignorant of whether a deferred job has actually executed yet.
    pub fn status(&self, port: u16) -> PortStatusReport {
        let last_off = self.inner.log.last_recorded(port, PowerAction::PowerOff);
        let last_on = self.inner.log.last_recorded(port, PowerAction::PowerOn);

        let state = match (last_off, last_on) {
            (Some(off), Some(on)) if off > on => PortPowerState::Stopped,
            (Some(_), None) => PortPowerState::Stopped,
            _ => PortPowerState::Running,
        };
        PortStatusReport::new(port, state)
    }

    /// Stop the background worker. Sends the sentinel and flips the shutdown
    /// signal so an in-flight cooldown sleep is cancelled rather than waited
    /// out, then joins the task.
    pub async fn shutdown(&self) {
        let _ = self.jobs_tx.send(WorkerCommand::Shutdown);
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
    }
}
