//! Device cooldown gate.
//!
//! Separate clock from the rate limiter: this one tracks when a port was
//! last touched on the device itself, across all logical operations. The
//! controller misbehaves when consecutive actions on one port arrive closer
//! than the cooldown, so anything inside it is deferred rather than sent.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Observed minimum spacing the controller tolerates between operations on
/// the same port.
pub const DEVICE_COOLDOWN: Duration = Duration::from_secs(10);

/// Gate decision for a prospective device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// No recent device activity on the port; execute now.
    Ready,
    /// Port was touched too recently; defer by the remaining time.
    CoolingDown(Duration),
}

/// Last device-level action per port. Written only after a call actually
/// reaches the controller and succeeds.
pub struct DeviceActivity {
    last_action: DashMap<u16, Instant>,
    cooldown: Duration,
}

impl DeviceActivity {
    pub fn new() -> Self {
        Self {
            last_action: DashMap::new(),
            cooldown: DEVICE_COOLDOWN,
        }
    }

    pub fn check(&self, port: u16, now: Instant) -> Gate {
        match self.last_action.get(&port) {
            None => Gate::Ready,
            Some(last) => {
                let elapsed = now.saturating_duration_since(*last);
                if elapsed >= self.cooldown {
                    Gate::Ready
                } else {
                    Gate::CoolingDown(self.cooldown - elapsed)
                }
            }
        }
    }

    /// Record a completed device call on the port.
    pub fn mark(&self, port: u16, now: Instant) {
        self.last_action.insert(port, now);
    }

    pub fn last_action(&self, port: u16) -> Option<Instant> {
        self.last_action.get(&port).map(|slot| *slot)
    }
}

impl Default for DeviceActivity {
    fn default() -> Self {
        Self::new()
    }
}
