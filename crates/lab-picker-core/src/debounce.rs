//! Input debouncing.
//!
//! The debouncer is clock-agnostic: callers pass the current instant, and
//! async drivers sleep until [`Debouncer::deadline`]. Each instance owns its
//! own pending value, so two pickers on one page never interfere.

use std::time::{Duration, Instant};

/// Collapses a burst of values into the last one after a quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

#[derive(Debug)]
struct Pending<T> {
    value: T,
    due: Instant,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new value, replacing any pending one and restarting the timer.
    pub fn observe(&mut self, value: T, at: Instant) {
        self.pending = Some(Pending {
            value,
            due: at + self.delay,
        });
    }

    /// When the pending value settles, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Release the pending value if its quiet period has elapsed.
    pub fn settle(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(p) if now >= p.due => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Drop the pending value without settling it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }
}
