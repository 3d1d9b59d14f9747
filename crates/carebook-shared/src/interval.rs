use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A non-empty half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if start >= end {
            return Err(CoreError::InvalidInput("start time must be before end time"));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Two ranges overlap when they share at least one instant.
    ///
    /// Touching ranges (`a.end == b.start`) do not overlap. For non-empty
    /// ranges this is equivalent to "starts during, ends during, or fully
    /// covers" the other range.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn range(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeRange {
        TimeRange::new(at(h1, m1), at(h2, m2)).unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted() {
        assert!(TimeRange::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeRange::new(at(11, 0), at(10, 0)).is_err());
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let booked = range(10, 0, 10, 30);
        assert!(!booked.overlaps(&range(9, 30, 10, 0)));
        assert!(!booked.overlaps(&range(10, 30, 11, 0)));
    }

    #[test]
    fn partial_and_containing_ranges_overlap() {
        let booked = range(10, 0, 10, 30);
        // starts during
        assert!(booked.overlaps(&range(10, 15, 10, 45)));
        // ends during
        assert!(booked.overlaps(&range(9, 45, 10, 15)));
        // covers
        assert!(booked.overlaps(&range(9, 0, 11, 0)));
        // inside
        assert!(booked.overlaps(&range(10, 10, 10, 20)));
        // identical
        assert!(booked.overlaps(&range(10, 0, 10, 30)));
    }
}
