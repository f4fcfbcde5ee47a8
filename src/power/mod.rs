//! Per-port power operation coordinator.
//!
//! The external controller imposes a minimum spacing between operations on
//! the same physical port, and must not be hammered by rapid repeated
//! webhook calls. This module coordinates that: [`limiter`] throttles how
//! often a caller may issue the same logical operation on a port,
//! [`cooldown`] tracks when the device itself was last touched, [`queue`]
//! runs the single background worker that drains deferred operations, and
//! [`controller`] ties them together behind the facade the HTTP layer uses.

pub mod controller;
pub mod cooldown;
pub mod limiter;
pub mod queue;

pub use controller::PowerController;
pub use cooldown::{DeviceActivity, Gate, DEVICE_COOLDOWN};
pub use limiter::{OperationLog, RATE_LIMIT_WINDOW};
pub use queue::{DeferredJob, WorkerCommand};

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-facing logical operation. `PowerOff` and `PowerCycle` both map to
/// the controller's single `POWER_CYCLE` device action; `PowerOn` never
/// reaches the device at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    PowerOn,
    PowerOff,
    PowerCycle,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::PowerOn => "power_on",
            PowerAction::PowerOff => "power_off",
            PowerAction::PowerCycle => "power_cycle",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inferred power state, derived from request history rather than measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPowerState {
    Running,
    Stopped,
}

impl fmt::Display for PortPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortPowerState::Running => f.write_str("running"),
            PortPowerState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Synchronous result of a mutating power operation. Always returned
/// immediately, even when the device action was deferred.
#[derive(Debug, Clone, Serialize)]
pub struct PowerOutcome {
    pub success: bool,
    pub action: PowerAction,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_delay: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PowerOutcome {
    fn base(success: bool, action: PowerAction, port: u16) -> Self {
        Self {
            success,
            action,
            port,
            status: None,
            message: None,
            error: None,
            rate_limited: None,
            retry_after: None,
            queued_delay: None,
            timestamp: Utc::now(),
        }
    }

    /// The device action was sent and accepted by the controller.
    pub fn cycling(action: PowerAction, port: u16) -> Self {
        Self {
            status: Some("cycling".to_string()),
            ..Self::base(true, action, port)
        }
    }

    /// The device action was deferred to respect the per-port cooldown.
    pub fn queued(action: PowerAction, port: u16, delay: Duration) -> Self {
        Self {
            status: Some("queued".to_string()),
            queued_delay: Some(delay.as_secs_f64()),
            message: Some(format!(
                "Operation queued for execution in {} seconds",
                delay.as_secs()
            )),
            ..Self::base(true, action, port)
        }
    }

    /// `power_on` result: nothing to send, the previous cycle already
    /// re-energizes the port.
    pub fn no_action_needed(port: u16) -> Self {
        Self {
            status: Some("no_action_needed".to_string()),
            message: Some("Port will power on automatically after power cycle".to_string()),
            ..Self::base(true, PowerAction::PowerOn, port)
        }
    }

    /// Request rejected by the per-operation rate limiter.
    pub fn rate_limited(action: PowerAction, port: u16, retry_after: u64) -> Self {
        Self {
            error: Some(format!(
                "Rate limited. Please wait {} seconds before next {} operation",
                retry_after, action
            )),
            rate_limited: Some(true),
            retry_after: Some(retry_after),
            ..Self::base(false, action, port)
        }
    }

    /// The immediate-path device call failed.
    pub fn failed(action: PowerAction, port: u16, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::base(false, action, port)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited.unwrap_or(false)
    }
}

/// Result of a status query. The `status` string is a literal contract: a
/// monitoring integration matches it with a `status.*:.*running` regex.
#[derive(Debug, Clone, Serialize)]
pub struct PortStatusReport {
    pub success: bool,
    pub port: u16,
    pub status: String,
    pub method: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl PortStatusReport {
    pub fn new(port: u16, state: PortPowerState) -> Self {
        Self {
            success: true,
            port,
            status: format!("status: {}", state),
            method: "operation_tracking",
            timestamp: Utc::now(),
        }
    }
}

/// Round a remaining window up to whole seconds, so a caller that waits
/// `retry_after` seconds is always past the window.
pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs_f64().ceil() as u64
}
