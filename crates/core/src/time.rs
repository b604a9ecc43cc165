use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// Clock abstraction so services and tests control the flow of time.
///
/// `Shared` clones observe the same instant, which lets a test advance the
/// clock a live session is reading from (the suspend/resume case).
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
    Shared(Arc<RwLock<DateTime<Utc>>>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a clock starting at the given timestamp whose clones all
    /// observe the same advancing instant.
    #[must_use]
    pub fn shared(at: DateTime<Utc>) -> Self {
        Self::Shared(Arc::new(RwLock::new(at)))
    }

    /// Returns the current time according to the clock.
    ///
    /// # Panics
    ///
    /// Panics if a `Shared` clock's lock has been poisoned.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Shared(t) => *t.read().expect("shared clock lock poisoned"),
        }
    }

    /// Advance a `Fixed` or `Shared` clock by the given duration.
    ///
    /// Has no effect on `Clock::Default`. Advancing a clone of a `Shared`
    /// clock advances every other clone of it as well.
    ///
    /// # Panics
    ///
    /// Panics if a `Shared` clock's lock has been poisoned.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::Default => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Shared(t) => {
                let mut guard = t.write().expect("shared clock lock poisoned");
                *guard += delta;
            }
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
    }
}

/// Deterministic timestamp for tests and examples (2025-06-15T08:00:00Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_749_974_400;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
