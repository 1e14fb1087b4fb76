//! Signed time intervals in nanoseconds.
//!
//! [`Duration`] cannot go below zero, but a schedule may legitimately be handed
//! a negative offset (for example from [`Interval::from_seconds`] with a
//! negative argument). [`Interval`] keeps the sign so nothing is validated at
//! conversion time; the timer source treats a non-positive offset as already due.

use std::fmt;
use std::ops::{Add, Neg};
use std::time::Duration;

use tokio::time::Instant;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A signed interval with nanosecond resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval(i64);

impl Interval {
    /// The zero-length interval, also the default leeway.
    pub const ZERO: Interval = Interval(0);

    pub const fn nanoseconds(nanos: i64) -> Self {
        Interval(nanos)
    }

    pub const fn microseconds(micros: i64) -> Self {
        Interval(micros.saturating_mul(1_000))
    }

    pub const fn milliseconds(millis: i64) -> Self {
        Interval(millis.saturating_mul(1_000_000))
    }

    pub const fn seconds(secs: i64) -> Self {
        Interval(secs.saturating_mul(NANOS_PER_SEC))
    }

    /// Converts floating-point seconds to nanoseconds, truncating toward zero.
    ///
    /// Negative input yields a negative interval. Values outside the `i64`
    /// nanosecond range saturate and `NaN` becomes zero.
    pub fn from_seconds(seconds: f64) -> Self {
        Interval((seconds * NANOS_PER_SEC as f64) as i64)
    }

    /// Raw signed nanosecond count.
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// True for intervals strictly greater than zero.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// The interval as a [`Duration`], clamping negative values to zero.
    pub fn to_duration(self) -> Duration {
        Duration::from_nanos(self.0.max(0) as u64)
    }

    /// `now + self`, where a non-positive interval means `now`.
    pub fn after(self, now: Instant) -> Instant {
        now + self.to_duration()
    }
}

impl From<Duration> for Interval {
    fn from(duration: Duration) -> Self {
        Interval(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        Interval(self.0.saturating_add(rhs.0))
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        Interval(self.0.saturating_neg())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
