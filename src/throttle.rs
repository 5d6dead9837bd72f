// src/throttle.rs
//! Publish rate limiting
//!
//! Fixes are acquired far more often than consumers read their sinks.
//! The throttle counts acquisitions and authorizes a publish only once
//! enough of them have accumulated, with a time and a position seen
//! somewhere in the window.

use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleState {
    pending: u32,
    has_time: bool,
    has_position: bool,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one acquisition; returns `true` when a publish is due.
    ///
    /// Flags are OR'd across the window. Authorization resets the state.
    pub fn record(&mut self, threshold: u32, has_time: bool, has_position: bool) -> bool {
        self.pending = self.pending.saturating_add(1);
        self.has_time |= has_time;
        self.has_position |= has_position;

        if self.has_time && self.has_position && self.pending > threshold {
            trace!("Publish authorized after {} acquisitions", self.pending);
            self.reset();
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }
}
