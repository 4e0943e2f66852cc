//! Reconnect scheduling.
//!
//! Two independent axes decide when the next connect attempt may start: an
//! exponential delay for transient failures, and a forced-wait floor the
//! server imposes via close codes, `admin_kick`, or error frames. The floor
//! always dominates and never advances the exponential.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    current: Duration,
    /// Earliest instant at which the next open may begin; `None` means no
    /// restriction.
    reconnect_at: Option<Instant>,
}

impl ReconnectPolicy {
    pub(crate) fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            current: base,
            reconnect_at: None,
        }
    }

    /// Reset after a successful transport open: the exponential returns to
    /// the base and any consumed floor is cleared.
    pub(crate) fn on_open(&mut self) {
        self.current = self.base;
        self.reconnect_at = None;
    }

    /// Impose a floor: no connect attempt before `until`.
    pub(crate) fn force_wait_until(&mut self, until: Instant) {
        self.reconnect_at = Some(until);
    }

    #[cfg(test)]
    pub(crate) fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Time to wait before the next attempt, as of `now`.
    ///
    /// A future floor is returned as-is and leaves the exponential state
    /// untouched; otherwise the current delay is returned and doubled up to
    /// the cap.
    pub(crate) fn next_delay(&mut self, now: Instant) -> Duration {
        if let Some(at) = self.reconnect_at {
            if at > now {
                return at - now;
            }
        }
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.cap);
        delay
    }
}
