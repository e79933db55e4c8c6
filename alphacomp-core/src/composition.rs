//! Editable compositions built from time ranges of source tracks

use crate::{Error, MediaTime, MediaType, Result, TimeRange, TrackId, TrackInfo};

/// A span of a source track placed on a composition track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSegment {
    /// Track the media is read from
    pub source_track: TrackId,
    /// Container stream index of the source track
    pub source_stream_index: usize,
    /// Range of the source track that is used
    pub source_range: TimeRange,
    /// Where the range starts on the composition timeline
    pub target_start: MediaTime,
}

impl TrackSegment {
    /// Range this segment occupies on the composition timeline
    pub fn target_range(&self) -> TimeRange {
        TimeRange::new(self.target_start, self.source_range.duration)
    }

    /// Maps a source time to composition time, if the segment uses it
    pub fn map_source_time(&self, time: MediaTime) -> Option<MediaTime> {
        if self.source_range.contains(time) {
            Some(self.target_start + (time - self.source_range.start))
        } else {
            None
        }
    }
}

/// A mutable track of a composition
#[derive(Debug, Clone)]
pub struct CompositionTrack {
    track_id: TrackId,
    media_type: MediaType,
    segments: Vec<TrackSegment>,
}

impl CompositionTrack {
    fn new(track_id: TrackId, media_type: MediaType) -> Self {
        Self {
            track_id,
            media_type,
            segments: Vec::new(),
        }
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Segments ordered by their position on the timeline
    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// End of the last segment on the timeline
    pub fn duration(&self) -> MediaTime {
        self.segments
            .iter()
            .map(|s| s.target_range().end())
            .max()
            .unwrap_or(MediaTime::ZERO)
    }

    /// Container stream index of the first segment's source
    pub fn source_stream_index(&self) -> Option<usize> {
        self.segments.first().map(|s| s.source_stream_index)
    }

    /// Maps a time of the given source stream onto this track's timeline
    pub fn map_source_time(&self, stream_index: usize, time: MediaTime) -> Option<MediaTime> {
        self.segments
            .iter()
            .filter(|s| s.source_stream_index == stream_index)
            .find_map(|s| s.map_source_time(time))
    }

    /// Inserts `range` of `source` at composition time `at`.
    ///
    /// Media already placed at or after `at` moves later by the range's
    /// duration; a segment spanning `at` is split in two.
    pub fn insert_time_range(&mut self, range: TimeRange, source: &TrackInfo, at: MediaTime) -> Result<()> {
        if source.media_type != self.media_type {
            return Err(Error::MediaTypeMismatch {
                expected: self.media_type,
                found: source.media_type,
            });
        }

        if !range.is_valid() || range.is_empty() || at.is_negative() {
            return Err(Error::InvalidTimeRange {
                start: range.start,
                duration: range.duration,
            });
        }

        if source.time_range.is_empty() || range.start >= source.time_range.end() {
            return Err(Error::RangeOutsideTrack {
                track: source.track_id,
                range,
                track_range: source.time_range,
            });
        }

        self.split_at(at);

        for segment in &mut self.segments {
            if segment.target_start >= at {
                segment.target_start = segment.target_start + range.duration;
            }
        }

        self.segments.push(TrackSegment {
            source_track: source.track_id,
            source_stream_index: source.stream_index,
            source_range: range,
            target_start: at,
        });
        self.segments.sort_by(|a, b| a.target_start.cmp(&b.target_start));

        Ok(())
    }

    fn split_at(&mut self, at: MediaTime) {
        let Some(pos) = self
            .segments
            .iter()
            .position(|s| s.target_start < at && s.target_range().contains(at))
        else {
            return;
        };

        let segment = self.segments[pos];
        let head = at - segment.target_start;
        let tail = segment.source_range.duration - head;

        self.segments[pos].source_range.duration = head;
        self.segments.insert(
            pos + 1,
            TrackSegment {
                source_range: TimeRange::new(segment.source_range.start + head, tail),
                target_start: at,
                ..segment
            },
        );
    }
}

/// An editable timeline of tracks
#[derive(Debug, Clone, Default)]
pub struct Composition {
    tracks: Vec<CompositionTrack>,
}

impl Composition {
    /// Creates an empty composition
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty track.
    ///
    /// `preferred_id` is used when it is positive and unused; otherwise the
    /// next free identifier is assigned.
    pub fn add_mutable_track(&mut self, media_type: MediaType, preferred_id: Option<TrackId>) -> &mut CompositionTrack {
        let track_id = match preferred_id {
            Some(id) if id.0 > 0 && self.track(id).is_none() => id,
            _ => TrackId(self.tracks.iter().map(|t| t.track_id.0).max().unwrap_or(0) + 1),
        };

        self.tracks.push(CompositionTrack::new(track_id, media_type));
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    pub fn track(&self, track_id: TrackId) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    /// Returns the first track of the given media type
    pub fn first_track(&self, media_type: MediaType) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.media_type == media_type)
    }

    /// Duration of the longest track
    pub fn duration(&self) -> MediaTime {
        self.tracks
            .iter()
            .map(|t| t.duration())
            .max()
            .unwrap_or(MediaTime::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size;

    fn seconds(s: i64) -> MediaTime {
        MediaTime::new(s, 1)
    }

    fn video_source() -> TrackInfo {
        TrackInfo::video(
            7,
            0,
            TimeRange::new(MediaTime::ZERO, seconds(10)),
            Size::new(1280.0, 720.0),
        )
    }

    #[test]
    fn test_preferred_track_id_is_kept() {
        let mut composition = Composition::new();
        let id = composition
            .add_mutable_track(MediaType::Video, Some(TrackId(7)))
            .track_id();
        assert_eq!(id, TrackId(7));

        // Taken id falls back to the next free one
        let id = composition
            .add_mutable_track(MediaType::Audio, Some(TrackId(7)))
            .track_id();
        assert_eq!(id, TrackId(8));

        let id = composition.add_mutable_track(MediaType::Audio, None).track_id();
        assert_eq!(id, TrackId(9));
    }

    #[test]
    fn test_insert_full_range() {
        let source = video_source();
        let mut composition = Composition::new();
        let track = composition.add_mutable_track(MediaType::Video, Some(source.track_id));
        track
            .insert_time_range(source.time_range, &source, MediaTime::ZERO)
            .unwrap();

        assert_eq!(track.duration(), seconds(10));
        assert_eq!(track.segments().len(), 1);
        assert_eq!(track.source_stream_index(), Some(0));
        assert_eq!(composition.duration(), seconds(10));
    }

    #[test]
    fn test_insert_rejects_mismatched_media_type() {
        let source = video_source();
        let mut composition = Composition::new();
        let track = composition.add_mutable_track(MediaType::Audio, None);
        let err = track
            .insert_time_range(source.time_range, &source, MediaTime::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::MediaTypeMismatch { .. }));
    }

    #[test]
    fn test_insert_rejects_invalid_ranges() {
        let source = video_source();
        let mut composition = Composition::new();
        let track = composition.add_mutable_track(MediaType::Video, None);

        let empty = TimeRange::new(MediaTime::ZERO, MediaTime::ZERO);
        assert!(matches!(
            track.insert_time_range(empty, &source, MediaTime::ZERO),
            Err(Error::InvalidTimeRange { .. })
        ));

        let outside = TimeRange::new(seconds(12), seconds(1));
        assert!(matches!(
            track.insert_time_range(outside, &source, MediaTime::ZERO),
            Err(Error::RangeOutsideTrack { .. })
        ));
        assert!(track.segments().is_empty());
    }

    #[test]
    fn test_insert_in_the_middle_splits_and_shifts() {
        let source = video_source();
        let mut composition = Composition::new();
        let track = composition.add_mutable_track(MediaType::Video, None);
        track
            .insert_time_range(source.time_range, &source, MediaTime::ZERO)
            .unwrap();
        track
            .insert_time_range(TimeRange::new(MediaTime::ZERO, seconds(2)), &source, seconds(4))
            .unwrap();

        let starts: Vec<_> = track.segments().iter().map(|s| s.target_start).collect();
        assert_eq!(starts, vec![MediaTime::ZERO, seconds(4), seconds(6)]);
        assert_eq!(track.segments()[2].source_range.start, seconds(4));
        assert_eq!(track.duration(), seconds(12));
    }

    #[test]
    fn test_map_source_time() {
        let source = video_source();
        let mut composition = Composition::new();
        let track = composition.add_mutable_track(MediaType::Video, None);
        track
            .insert_time_range(TimeRange::new(seconds(2), seconds(3)), &source, seconds(1))
            .unwrap();

        assert_eq!(track.map_source_time(0, seconds(2)), Some(seconds(1)));
        assert_eq!(track.map_source_time(0, seconds(4)), Some(seconds(3)));
        assert_eq!(track.map_source_time(0, seconds(5)), None);
        assert_eq!(track.map_source_time(1, seconds(3)), None);
    }
}
