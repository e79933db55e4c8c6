//! Probing source assets with FFmpeg

use crate::{init_ffmpeg, Result};
use alphacomp_core::{AssetInfo, MediaTime, MediaType, Size, TimeRange, TrackId, TrackInfo, Transform};
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

/// A source asset whose tracks have been loaded
#[derive(Debug, Clone)]
pub struct SourceAsset {
    info: AssetInfo,
    start_offset: MediaTime,
}

impl SourceAsset {
    /// Opens a media file and loads its duration and track properties
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        init_ffmpeg()?;

        let path = path.as_ref();
        let input = ffmpeg::format::input(&path)?;

        // Container start time, in AV_TIME_BASE units
        let container_start = unsafe { (*input.as_ptr()).start_time };
        let start_offset = if container_start == ffmpeg::ffi::AV_NOPTS_VALUE {
            MediaTime::ZERO
        } else {
            MediaTime::new(container_start, ffmpeg::ffi::AV_TIME_BASE as i32)
        };

        let container_duration = if input.duration() > 0 {
            Some(MediaTime::new(input.duration(), ffmpeg::ffi::AV_TIME_BASE as i32))
        } else {
            None
        };

        let mut tracks = Vec::new();
        for stream in input.streams() {
            let track = probe_track(&stream, start_offset, container_duration)?;
            tracing::debug!(
                track = %track.track_id,
                media_type = %track.media_type,
                codec = %track.codec,
                range = %track.time_range,
                "loaded track"
            );
            tracks.push(track);
        }

        let duration = container_duration.unwrap_or_else(|| {
            tracks
                .iter()
                .map(|t| t.time_range.end())
                .max()
                .unwrap_or(MediaTime::ZERO)
        });

        tracing::debug!(%duration, tracks = tracks.len(), "loaded asset");

        Ok(Self {
            info: AssetInfo::new(path, duration, tracks),
            start_offset,
        })
    }

    /// Loaded asset properties
    pub fn info(&self) -> &AssetInfo {
        &self.info
    }

    pub fn path(&self) -> &PathBuf {
        &self.info.path
    }

    pub fn duration(&self) -> MediaTime {
        self.info.duration
    }

    /// Offset subtracted from stream timestamps to get asset time
    pub fn start_offset(&self) -> MediaTime {
        self.start_offset
    }

    /// Converts a stream timestamp to time relative to the asset start
    pub fn asset_time(&self, timestamp: i64, time_base: ffmpeg::Rational) -> MediaTime {
        stream_time(timestamp, time_base) - self.start_offset
    }
}

/// Converts a timestamp in `time_base` units to media time
pub fn stream_time(timestamp: i64, time_base: ffmpeg::Rational) -> MediaTime {
    MediaTime::new(
        timestamp * time_base.numerator() as i64,
        time_base.denominator().max(1),
    )
}

/// Converts media time to a timestamp in `time_base` units, rounding to nearest
pub fn stream_ticks(time: MediaTime, time_base: ffmpeg::Rational) -> i64 {
    let num = time.value as i128 * time_base.denominator() as i128;
    let den = time.timescale as i128 * time_base.numerator().max(1) as i128;
    if den == 0 {
        return 0;
    }
    let half = den / 2;
    let rounded = if num >= 0 { (num + half) / den } else { (num - half) / den };
    rounded as i64
}

fn probe_track(
    stream: &ffmpeg::format::stream::Stream,
    start_offset: MediaTime,
    container_duration: Option<MediaTime>,
) -> Result<TrackInfo> {
    let parameters = stream.parameters();
    let time_base = stream.time_base();

    let media_type = match parameters.medium() {
        ffmpeg::media::Type::Video
            if !stream
                .disposition()
                .contains(ffmpeg::format::stream::Disposition::ATTACHED_PIC) =>
        {
            MediaType::Video
        }
        ffmpeg::media::Type::Audio => MediaType::Audio,
        _ => MediaType::Other,
    };

    let start = if stream.start_time() == ffmpeg::ffi::AV_NOPTS_VALUE {
        MediaTime::ZERO
    } else {
        (stream_time(stream.start_time(), time_base) - start_offset).max(MediaTime::ZERO)
    };

    let duration = if stream.duration() > 0 {
        stream_time(stream.duration(), time_base)
    } else {
        container_duration.unwrap_or(MediaTime::ZERO)
    };

    // Container track IDs start at 1; streams without one get their index
    let track_id = if stream.id() > 0 {
        stream.id()
    } else {
        stream.index() as i32 + 1
    };

    let mut track = TrackInfo {
        track_id: TrackId(track_id),
        stream_index: stream.index(),
        media_type,
        time_range: TimeRange::new(start, duration),
        natural_size: None,
        preferred_transform: Transform::IDENTITY,
        nominal_frame_rate: None,
        codec: parameters.id().name().to_string(),
    };

    if media_type == MediaType::Video {
        let decoder = ffmpeg::codec::context::Context::from_parameters(parameters)?
            .decoder()
            .video()?;
        track.natural_size = Some(Size::from_pixels(decoder.width(), decoder.height()));
        track.preferred_transform = display_transform(stream);

        let rate = stream.avg_frame_rate();
        if rate.denominator() != 0 && rate.numerator() > 0 {
            track.nominal_frame_rate = Some(f64::from(rate));
        }
    }

    Ok(track)
}

/// Reads the display matrix side data, falling back to the `rotate` tag
fn display_transform(stream: &ffmpeg::format::stream::Stream) -> Transform {
    for side_data in stream.side_data() {
        if side_data.kind() != ffmpeg::codec::packet::side_data::Type::DisplayMatrix {
            continue;
        }
        let data = side_data.data();
        if data.len() < 36 {
            continue;
        }
        let mut matrix = [0i32; 9];
        for (value, chunk) in matrix.iter_mut().zip(data.chunks_exact(4)) {
            *value = i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        return Transform::from_display_matrix(&matrix);
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|r| r.trim().parse::<f64>().ok())
        .map(Transform::rotation)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_time_uses_time_base() {
        let time = stream_time(900, ffmpeg::Rational(1, 90_000));
        assert_eq!(time, MediaTime::new(1, 100));

        let time = stream_time(3, ffmpeg::Rational(1001, 30_000));
        assert_eq!(time, MediaTime::new(3003, 30_000));
    }

    #[test]
    fn test_stream_ticks_rounds_to_time_base() {
        assert_eq!(stream_ticks(MediaTime::new(1, 30), ffmpeg::Rational(1, 48_000)), 1600);
        assert_eq!(stream_ticks(MediaTime::new(1, 3), ffmpeg::Rational(1, 1000)), 333);
        assert_eq!(stream_ticks(MediaTime::new(-1, 100), ffmpeg::Rational(1, 90_000)), -900);
    }
}
