//! Frame progress logging for an export

use std::time::{Duration, Instant};

/// Counts encoded frames and logs progress with a remaining-time estimate
#[derive(Debug)]
pub struct ProgressTracker {
    label: &'static str,
    total: u64,
    done: u64,
    every: u64,
    started: Instant,
}

impl ProgressTracker {
    /// Tracks `total` frames, logging every `every` frames and at the end
    pub fn new(label: &'static str, total: u64, every: u64) -> Self {
        Self {
            label,
            total,
            done: 0,
            every: every.max(1),
            started: Instant::now(),
        }
    }

    /// Records one more frame
    pub fn advance(&mut self) {
        self.done += 1;
        if self.done == self.total {
            tracing::info!(
                "{}: {} frames in {}",
                self.label,
                self.done,
                format_duration(self.started.elapsed())
            );
        } else if self.done % self.every == 0 {
            let elapsed = self.started.elapsed();
            tracing::debug!(
                "{}: {}/{} frames, {} left",
                self.label,
                self.done,
                self.total,
                format_duration(remaining(elapsed, self.done, self.total))
            );
        }
    }
}

/// Linear estimate of the time left after `done` of `total` items
fn remaining(elapsed: Duration, done: u64, total: u64) -> Duration {
    if done == 0 || done >= total {
        return Duration::ZERO;
    }
    elapsed.mul_f64((total - done) as f64 / done as f64)
}

/// Formats a duration as `12.3s`, `2m 5s` or `1h 2m 5s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }
    let whole = duration.as_secs();
    let (hours, mins, rest) = (whole / 3600, whole % 3600 / 60, whole % 60);
    if hours == 0 {
        format!("{mins}m {rest}s")
    } else {
        format!("{hours}h {mins}m {rest}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(12_340)), "12.3s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_remaining_scales_with_rate() {
        assert_eq!(remaining(Duration::from_secs(10), 25, 100), Duration::from_secs(30));
        assert_eq!(remaining(Duration::from_secs(10), 0, 100), Duration::ZERO);
        assert_eq!(remaining(Duration::from_secs(10), 100, 100), Duration::ZERO);
    }

    #[test]
    fn test_advance_counts_frames() {
        let mut tracker = ProgressTracker::new("frames", 4, 0);
        for _ in 0..3 {
            tracker.advance();
        }
        assert_eq!(tracker.done, 3);
    }
}
