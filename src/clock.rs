//! Wall-clock seam.
//!
//! Archive names are stamped in the agent's local time and the activity
//! window is computed from the agent's clock. Both go through [`Clock`] so
//! tests can pin the instant.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local};

/// Source of the current instant, including the local UTC offset.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant in the agent's local offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host wall clock in its local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    /// Creates a clock that always returns `instant`.
    #[must_use]
    pub const fn new(instant: DateTime<FixedOffset>) -> Self {
        Self(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
