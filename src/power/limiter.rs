//! Per-operation rate limiter.
//!
//! Tracks the last accepted request per (port, logical operation) pair and
//! rejects a repeat of the same operation on the same port inside the
//! window. It throttles request acceptance, not device-call success: the
//! timestamp is written the moment a request is accepted, whether the
//! device call happens immediately, gets deferred, or later fails.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use super::PowerAction;

/// Minimum spacing between accepted requests of the same operation on the
/// same port.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(30);

/// Last-accepted timestamps per (port, operation). Entries are overwritten
/// on each accepted request and never removed; the map lives as long as the
/// process.
pub struct OperationLog {
    entries: DashMap<(u16, PowerAction), Instant>,
    window: Duration,
}

impl OperationLog {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            window: RATE_LIMIT_WINDOW,
        }
    }

    /// Accept or reject a request, recording it if accepted.
    ///
    /// Check and record happen under the entry lock for the key, so two
    /// concurrent requests for the same (port, operation) can never both be
    /// accepted inside one window.
    pub fn try_acquire(
        &self,
        port: u16,
        action: PowerAction,
        now: Instant,
    ) -> Result<(), Duration> {
        match self.entries.entry((port, action)) {
            Entry::Occupied(mut slot) => {
                let elapsed = now.saturating_duration_since(*slot.get());
                if elapsed < self.window {
                    Err(self.window - elapsed)
                } else {
                    slot.insert(now);
                    Ok(())
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                Ok(())
            }
        }
    }

    /// Record unconditionally. Used for `power_on`, which is tracked for
    /// status inference but never throttled.
    pub fn record(&self, port: u16, action: PowerAction, now: Instant) {
        self.entries.insert((port, action), now);
    }

    pub fn last_recorded(&self, port: u16, action: PowerAction) -> Option<Instant> {
        self.entries.get(&(port, action)).map(|slot| *slot)
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new()
    }
}
