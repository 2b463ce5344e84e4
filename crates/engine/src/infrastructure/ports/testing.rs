//! Testability ports for injecting time and dice.

use chrono::{DateTime, Utc};

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of die results.
pub trait RandomPort: Send + Sync {
    /// A value in `min..=max`.
    fn roll(&self, min: u32, max: u32) -> u32;
}
