//! Interval coverage arithmetic
//!
//! Used to detect rules whose decomposed ranges amount to "any" without saying
//! so, and to measure how much of the port space a service opens.

use serde::{Deserialize, Serialize};

/// Closed integer interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Closed-interval intersection test; touching endpoints overlap.
    pub const fn overlaps(&self, other: &Interval) -> bool {
        other.start <= self.end && self.start <= other.end
    }
}

impl From<(u64, u64)> for Interval {
    fn from((start, end): (u64, u64)) -> Self {
        Self { start, end }
    }
}

/// Returns `true` when the union of `intervals` spans `[0, universe_max]`.
///
/// Greedy sweep over the intervals sorted by start: any interval starting past
/// the current frontier leaves a gap. An empty list covers nothing unless the
/// universe is `[0, 0]`.
pub fn covers(intervals: &[Interval], universe_max: u64) -> bool {
    let mut sorted = intervals.to_vec();
    sorted.sort_unstable();

    let mut frontier = 0;
    for interval in &sorted {
        if interval.start > frontier {
            return false;
        }
        frontier = frontier.max(interval.end);
    }

    frontier >= universe_max
}

/// Sum of `end - start` over all intervals.
///
/// Overlapping intervals are counted once each, so this over-reports distinct
/// coverage. The breadth check depends on that exact figure.
pub fn total_length(intervals: &[Interval]) -> u64 {
    intervals
        .iter()
        .map(|i| i.end.saturating_sub(i.start))
        .fold(0u64, u64::saturating_add)
}

/// Returns `true` if any interval of `a` intersects any interval of `b`.
pub fn any_overlap(a: &[Interval], b: &[Interval]) -> bool {
    a.iter().any(|x| b.iter().any(|y| x.overlaps(y)))
}
