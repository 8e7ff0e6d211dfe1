//! Half-open intervals `[start, end)` and the strict overlap predicate.
//!
//! The same type backs event instants (`OffsetDateTime`) and working-hours
//! times of day (`time::Time`).

use std::fmt;
use thiserror::Error;

/// Rejected interval bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interval {start} - {end}: {reason}")]
pub struct InvalidInterval {
    pub start: String,
    pub end: String,
    pub reason: &'static str,
}

impl InvalidInterval {
    pub(crate) fn malformed(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            reason: "malformed time of day",
        }
    }
}

/// A non-empty interval; `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval<T> {
    start: T,
    end: T,
}

impl<T: Ord + Copy + fmt::Display> Interval<T> {
    pub fn new(start: T, end: T) -> Result<Self, InvalidInterval> {
        if start >= end {
            return Err(InvalidInterval {
                start: start.to_string(),
                end: end.to_string(),
                reason: "end must be after start",
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> T {
        self.start
    }

    pub fn end(&self) -> T {
        self.end
    }

    /// Strict overlap: intervals that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}
