//! Conversion of variable-rate source frames to a fixed output frame rate

use crate::MediaTime;

/// Resamples timestamped frames onto a fixed grid of output ticks.
///
/// Output tick `n` at `n * frame_duration` shows the latest source frame whose
/// time is at or before the tick. The first source frame also fills any ticks
/// before it. Exactly `ceil(end / frame_duration)` ticks are emitted.
#[derive(Debug)]
pub struct FrameRetimer<T> {
    frame_duration: MediaTime,
    total: u64,
    next_index: u64,
    pending: Option<T>,
}

impl<T> FrameRetimer<T> {
    /// Creates a retimer covering `[0, end)`
    pub fn new(frame_duration: MediaTime, end: MediaTime) -> Self {
        Self {
            frame_duration,
            total: end.count_of(frame_duration),
            next_index: 0,
            pending: None,
        }
    }

    /// Total number of output frames
    pub fn total_frames(&self) -> u64 {
        self.total
    }

    /// Time of output tick `index`
    pub fn tick_time(&self, index: u64) -> MediaTime {
        self.frame_duration.multiply(index as i64)
    }

    /// Feeds the next source frame; `emit` is called for every tick it completes
    pub fn push<E, F>(&mut self, frame: T, time: MediaTime, mut emit: F) -> Result<(), E>
    where
        F: FnMut(u64, &T) -> Result<(), E>,
    {
        if let Some(previous) = self.pending.take() {
            while self.next_index < self.total && self.tick_time(self.next_index) < time {
                emit(self.next_index, &previous)?;
                self.next_index += 1;
            }
        }
        self.pending = Some(frame);
        Ok(())
    }

    /// Fills the remaining ticks with the last source frame
    pub fn finish<E, F>(mut self, mut emit: F) -> Result<u64, E>
    where
        F: FnMut(u64, &T) -> Result<(), E>,
    {
        if let Some(last) = self.pending.take() {
            while self.next_index < self.total {
                emit(self.next_index, &last)?;
                self.next_index += 1;
            }
        }
        Ok(self.next_index)
    }
}
