//! Rational media time and time ranges

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// A point in time expressed as `value / timescale` seconds.
///
/// Comparisons are exact: `1/30` and `2/60` are equal even though their
/// fields differ. `timescale` must be positive.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaTime {
    /// Number of `1 / timescale` units
    pub value: i64,
    /// Units per second
    pub timescale: i32,
}

impl MediaTime {
    /// Time zero
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    /// Creates a new media time
    pub fn new(value: i64, timescale: i32) -> Self {
        debug_assert!(timescale > 0, "timescale must be positive");
        Self { value, timescale }
    }

    /// Returns the time in seconds
    pub fn seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    /// Converts to another timescale, rounding to the nearest unit
    pub fn rescale(&self, timescale: i32) -> Self {
        if timescale == self.timescale {
            return *self;
        }
        let num = self.value as i128 * timescale as i128;
        let den = self.timescale as i128;
        Self::new(div_round(num, den) as i64, timescale)
    }

    /// Multiplies the time by an integer count, e.g. a frame index times a frame duration
    pub fn multiply(&self, count: i64) -> Self {
        Self::new(self.value * count, self.timescale)
    }

    /// Returns the larger of two times
    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Number of whole `step` intervals needed to cover this time (rounded up)
    pub fn count_of(&self, step: MediaTime) -> u64 {
        if self.value <= 0 || step.value <= 0 {
            return 0;
        }
        let num = self.value as i128 * step.timescale as i128;
        let den = self.timescale as i128 * step.value as i128;
        ((num + den - 1) / den) as u64
    }

    fn cross(&self, other: &Self) -> (i128, i128) {
        (
            self.value as i128 * other.timescale as i128,
            other.value as i128 * self.timescale as i128,
        )
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(other);
        a.cmp(&b)
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: Self) -> Self::Output {
        let timescale = common_timescale(self.timescale, rhs.timescale);
        MediaTime::new(
            self.rescale(timescale).value + rhs.rescale(timescale).value,
            timescale,
        )
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    fn sub(self, rhs: Self) -> Self::Output {
        let timescale = common_timescale(self.timescale, rhs.timescale);
        MediaTime::new(
            self.rescale(timescale).value - rhs.rescale(timescale).value,
            timescale,
        )
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.seconds())
    }
}

/// Least common multiple of two timescales, falling back to the larger one on overflow
fn common_timescale(a: i32, b: i32) -> i32 {
    if a == b {
        return a;
    }
    let lcm = a as i64 / gcd(a as i64, b as i64) * b as i64;
    i32::try_from(lcm).unwrap_or(a.max(b))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs().max(1)
}

fn div_round(num: i128, den: i128) -> i128 {
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    }
}

/// A half-open time range `[start, start + duration)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start: MediaTime,
    pub duration: MediaTime,
}

impl TimeRange {
    /// Creates a new time range
    pub fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// Creates a time range spanning `[start, end)`
    pub fn from_start_end(start: MediaTime, end: MediaTime) -> Self {
        Self::new(start, end - start)
    }

    /// Returns the exclusive end of the range
    pub fn end(&self) -> MediaTime {
        self.start + self.duration
    }

    /// Checks whether `time` falls inside the range
    pub fn contains(&self, time: MediaTime) -> bool {
        time >= self.start && time < self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.duration.value <= 0
    }

    /// A valid range starts at or after zero and has a non-negative duration
    pub fn is_valid(&self) -> bool {
        !self.start.is_negative() && !self.duration.is_negative()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_across_timescales() {
        assert_eq!(MediaTime::new(1, 30), MediaTime::new(2, 60));
        assert_eq!(MediaTime::new(10, 1), MediaTime::new(10_000_000, 1_000_000));
        assert!(MediaTime::new(1, 30) < MediaTime::new(1, 29));
    }

    #[test]
    fn test_add_and_sub_use_common_timescale() {
        let sum = MediaTime::new(1, 30) + MediaTime::new(1, 25);
        assert_eq!(sum.timescale, 150);
        assert_eq!(sum, MediaTime::new(11, 150));

        let diff = MediaTime::new(10, 1) - MediaTime::new(1, 2);
        assert_eq!(diff, MediaTime::new(19, 2));
    }

    #[test]
    fn test_rescale_rounds_to_nearest() {
        assert_eq!(MediaTime::new(1, 3).rescale(1000).value, 333);
        assert_eq!(MediaTime::new(2, 3).rescale(1000).value, 667);
        assert_eq!(MediaTime::new(-2, 3).rescale(1000).value, -667);
    }

    #[test]
    fn test_count_of_rounds_up() {
        let frame = MediaTime::new(1, 30);
        assert_eq!(MediaTime::new(10, 1).count_of(frame), 300);
        assert_eq!(MediaTime::new(1001, 1000).count_of(frame), 31);
        assert_eq!(MediaTime::ZERO.count_of(frame), 0);
    }

    #[test]
    fn test_time_range_bounds() {
        let range = TimeRange::new(MediaTime::ZERO, MediaTime::new(10, 1));
        assert!(range.contains(MediaTime::ZERO));
        assert!(range.contains(MediaTime::new(9999, 1000)));
        assert!(!range.contains(MediaTime::new(10, 1)));
        assert_eq!(range.end(), MediaTime::new(10, 1));

        let range = TimeRange::from_start_end(MediaTime::new(1, 1), MediaTime::new(3, 1));
        assert_eq!(range.duration, MediaTime::new(2, 1));
        assert!(range.is_valid());
        assert!(!TimeRange::new(MediaTime::new(-1, 1), MediaTime::new(1, 1)).is_valid());
    }
}
