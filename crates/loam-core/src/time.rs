//! UTC timestamps.
//!
//! All times in Loam are UTC by construction: [`Timestamp`] is an integer
//! microsecond count since the Unix epoch with no timezone component.
//! Wire formats that accept external time input carry an explicit UTC
//! flag which is validated at decode time; a value that reaches this type
//! is already known to be UTC.

use std::fmt;
use std::ops::{Add, Sub};

/// Microseconds since the Unix epoch, UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Earliest representable time ("beginning of time" sentinel for
    /// open-ended ranges).
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    /// Latest representable time ("end of time" sentinel for open-ended
    /// ranges).
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Construct from whole seconds since the Unix epoch.
    pub const fn from_seconds(secs: i64) -> Self {
        Self(secs * 1_000_000)
    }

    /// Construct from whole minutes since the Unix epoch.
    pub const fn from_minutes(mins: i64) -> Self {
        Self::from_seconds(mins * 60)
    }

    /// Construct from whole hours since the Unix epoch.
    pub const fn from_hours(hours: i64) -> Self {
        Self::from_minutes(hours * 60)
    }

    /// Microseconds since the Unix epoch.
    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Whether `self` lies in the half-open range `[start, end)`.
    pub fn in_range(self, start: Timestamp, end: Timestamp) -> bool {
        self >= start && self < end
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl Add<i64> for Timestamp {
    type Output = Timestamp;

    /// Add a microsecond offset.
    fn add(self, rhs: i64) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl Sub for Timestamp {
    type Output = i64;

    /// Difference in microseconds.
    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}
