//! Rendering instructions applied to the video frames of a composition

use crate::{AnimationTool, Error, MediaTime, Result, Size, TimeRange, TrackId, Transform};

/// How one composition track contributes to an instruction
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInstruction {
    /// Composition track providing the frames
    pub track_id: TrackId,
    /// Transform applied to the track's frames, if any
    pub transform: Option<Transform>,
}

impl LayerInstruction {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            transform: None,
        }
    }
}

/// Composites the listed tracks over a time range
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionInstruction {
    pub time_range: TimeRange,
    pub layer_instructions: Vec<LayerInstruction>,
}

impl CompositionInstruction {
    pub fn new(time_range: TimeRange, layer_instructions: Vec<LayerInstruction>) -> Self {
        Self {
            time_range,
            layer_instructions,
        }
    }
}

/// Describes how the video frames of a composition are rendered
#[derive(Debug, Clone)]
pub struct VideoComposition {
    /// Instructions in timeline order
    pub instructions: Vec<CompositionInstruction>,
    /// Size of every output frame
    pub render_size: Size,
    /// Duration of one output frame
    pub frame_duration: MediaTime,
    /// Layer graph the decoded frames are drawn into
    pub animation_tool: Option<AnimationTool>,
}

impl VideoComposition {
    /// Creates a video composition without instructions
    pub fn new(render_size: Size, frame_duration: MediaTime) -> Self {
        Self {
            instructions: Vec::new(),
            render_size,
            frame_duration,
            animation_tool: None,
        }
    }

    /// Frames per second implied by the frame duration
    pub fn frame_rate(&self) -> f64 {
        1.0 / self.frame_duration.seconds()
    }

    /// Time covered by all instructions
    pub fn time_range(&self) -> Option<TimeRange> {
        let start = self.instructions.iter().map(|i| i.time_range.start).min()?;
        let end = self.instructions.iter().map(|i| i.time_range.end()).max()?;
        Some(TimeRange::from_start_end(start, end))
    }

    /// Number of output frames needed to cover the instructions
    pub fn frame_count(&self) -> u64 {
        self.time_range()
            .map(|r| r.duration.count_of(self.frame_duration))
            .unwrap_or(0)
    }

    /// Checks render size and frame duration before export
    pub fn validate(&self) -> Result<()> {
        if self.render_size.is_empty() {
            return Err(Error::InvalidRenderSize(self.render_size));
        }
        if self.frame_duration.value <= 0 {
            return Err(Error::InvalidFrameDuration(self.frame_duration));
        }
        for instruction in &self.instructions {
            if !instruction.time_range.is_valid() {
                return Err(Error::InvalidTimeRange {
                    start: instruction.time_range.start,
                    duration: instruction.time_range.duration,
                });
            }
        }
        Ok(())
    }
}
