//! Source asset and track descriptions

use crate::{MediaTime, Size, TimeRange, Transform};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a track inside an asset or composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackId(pub i32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MediaType {
    Video,
    Audio,
    Other,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        };
        f.write_str(name)
    }
}

/// Describes a single track of a source asset
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackInfo {
    /// Track identifier as stored in the container
    pub track_id: TrackId,
    /// Index of the stream inside the container
    pub stream_index: usize,
    /// Kind of media in this track
    pub media_type: MediaType,
    /// Time range covered by the track, relative to the asset start
    pub time_range: TimeRange,
    /// Natural frame size (video tracks only)
    pub natural_size: Option<Size>,
    /// Display transform the player should apply (identity when absent)
    pub preferred_transform: Transform,
    /// Average frame rate (video tracks only)
    pub nominal_frame_rate: Option<f64>,
    /// Codec name reported by the demuxer
    pub codec: String,
}

impl TrackInfo {
    /// Creates a video track description
    pub fn video(track_id: i32, stream_index: usize, time_range: TimeRange, natural_size: Size) -> Self {
        Self {
            track_id: TrackId(track_id),
            stream_index,
            media_type: MediaType::Video,
            time_range,
            natural_size: Some(natural_size),
            preferred_transform: Transform::IDENTITY,
            nominal_frame_rate: None,
            codec: String::new(),
        }
    }

    /// Creates an audio track description
    pub fn audio(track_id: i32, stream_index: usize, time_range: TimeRange) -> Self {
        Self {
            track_id: TrackId(track_id),
            stream_index,
            media_type: MediaType::Audio,
            time_range,
            natural_size: None,
            preferred_transform: Transform::IDENTITY,
            nominal_frame_rate: None,
            codec: String::new(),
        }
    }

    /// Returns the track duration
    pub fn duration(&self) -> MediaTime {
        self.time_range.duration
    }
}

/// Describes a loaded source asset
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetInfo {
    /// Location of the asset
    pub path: PathBuf,
    /// Total duration of the asset
    pub duration: MediaTime,
    /// All tracks, in container order
    pub tracks: Vec<TrackInfo>,
}

impl AssetInfo {
    /// Creates a new asset description
    pub fn new(path: impl Into<PathBuf>, duration: MediaTime, tracks: Vec<TrackInfo>) -> Self {
        Self {
            path: path.into(),
            duration,
            tracks,
        }
    }

    /// Returns the tracks of the given media type, in container order
    pub fn tracks_with_media_type(&self, media_type: MediaType) -> impl Iterator<Item = &TrackInfo> {
        self.tracks.iter().filter(move |t| t.media_type == media_type)
    }

    /// Returns the first track of the given media type
    pub fn first_track(&self, media_type: MediaType) -> Option<&TrackInfo> {
        self.tracks_with_media_type(media_type).next()
    }
}
