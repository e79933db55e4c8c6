//! alphacomp Core Library
//!
//! This library provides the data structures shared by the alphacomp crates:
//! rational media time, track and asset descriptions, editable compositions,
//! layer graphs and the rendering instruction applied during export.

pub mod asset;
pub mod composition;
pub mod destination;
pub mod geometry;
pub mod instruction;
pub mod layer;
pub mod retime;
pub mod time;

pub use asset::{AssetInfo, MediaType, TrackId, TrackInfo};
pub use composition::{Composition, CompositionTrack, TrackSegment};
pub use destination::{ContainerType, Destination, ExportPreset};
pub use geometry::{Point, Rect, Size, Transform};
pub use instruction::{CompositionInstruction, LayerInstruction, VideoComposition};
pub use layer::{AnimationTool, Compositor, Layer, LayerContents, LayerId, LayerTree};
pub use retime::FrameRetimer;
pub use time::{MediaTime, TimeRange};

/// Result type for alphacomp-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for alphacomp-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid time range: start {start}, duration {duration}")]
    InvalidTimeRange { start: MediaTime, duration: MediaTime },

    #[error("Time range {range} lies outside source track {track} ({track_range})")]
    RangeOutsideTrack {
        track: TrackId,
        range: TimeRange,
        track_range: TimeRange,
    },

    #[error("Media type mismatch: expected {expected}, found {found}")]
    MediaTypeMismatch { expected: MediaType, found: MediaType },

    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Invalid layer: {0}")]
    InvalidLayer(usize),

    #[error("Invalid render size: {0}")]
    InvalidRenderSize(Size),

    #[error("Invalid frame duration: {0}")]
    InvalidFrameDuration(MediaTime),
}
