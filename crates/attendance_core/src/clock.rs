//! Time source for services.
//!
//! Services never read the system clock directly; they ask a [`Clock`], so the
//! calendar day used by the one-per-day rule follows the configured offset and
//! tests can pin time.

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, Utc};
use std::cell::Cell;

/// Supplies the current instant in the offset that defines calendar days.
pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

/// Wall clock reported in a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Uses the host's current local offset.
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Manually driven clock, mainly for tests.
///
/// Time only moves through [`FixedClock::set`] and [`FixedClock::advance`].
/// Not `Sync`; production code should use [`SystemClock`].
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn at(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now.get()
    }
}
