//! Export sessions: encoding a built composition to a destination file

use crate::progress_tracker::ProgressTracker;
use crate::writer::AlphaWriter;
use crate::{prepare_destination, resolve_encoder, BuildError, BuiltComposition, ExportConfig, ExportError, Result};
use alphacomp_core::{
    AnimationTool, Composition, Compositor, Destination, FrameRetimer, MediaTime, MediaType, Size, VideoComposition,
};
use alphacomp_decoder::source::stream_ticks;
use alphacomp_decoder::{FrameCompositor, SourceAsset, VideoReader};
use ffmpeg_next as ffmpeg;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frames between progress log lines
const PROGRESS_INTERVAL: u64 = 30;

/// State of an export session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Exporting,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStatus::Exporting => "exporting",
            ExportStatus::Completed => "completed",
            ExportStatus::Failed => "failed",
            ExportStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Requests cancellation of a running export
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of a finished export
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub status: ExportStatus,
    pub frames_written: u64,
    pub render_size: Size,
    pub frame_rate: f64,
    pub duration: MediaTime,
}

/// Encodes a built composition of a source asset
pub struct ExportSession {
    asset: SourceAsset,
    composition: Composition,
    video_composition: VideoComposition,
    config: ExportConfig,
    cancel: CancelHandle,
}

impl ExportSession {
    /// Creates a session, failing if no encoder exists for the configured preset
    pub fn new(asset: SourceAsset, built: BuiltComposition, config: ExportConfig) -> Result<Self> {
        resolve_encoder(config.preset)?;
        Ok(Self {
            asset,
            composition: built.composition,
            video_composition: built.video_composition,
            config,
            cancel: CancelHandle::default(),
        })
    }

    /// Handle that stops the export at the next packet
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Writes the composition to `output` on a blocking worker thread
    #[tracing::instrument(skip_all, fields(output = %output.as_ref().display()))]
    pub async fn export(self, output: impl AsRef<Path>) -> Result<ExportReport> {
        let mut destination = Destination::new(output.as_ref()).with_preset(self.config.preset);
        destination.optimize_for_network_use = self.config.optimize_for_network_use;

        prepare_destination(&destination)?;

        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            self.run(&destination)
        })
        .await
        .map_err(|e| ExportError::failed(format!("export task failed: {e}")))?
    }

    fn run(&self, destination: &Destination) -> Result<ExportReport> {
        tracing::info!(status = %ExportStatus::Exporting, preset = %self.config.preset, "starting export");

        match self.encode(destination) {
            Ok(report) => {
                tracing::info!(
                    status = %report.status,
                    frames = report.frames_written,
                    duration = %report.duration,
                    "export finished"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "export failed");
                if let Err(remove_err) = fs::remove_file(destination.path()) {
                    tracing::debug!(error = %remove_err, "no partial output removed");
                }
                Err(err)
            }
        }
    }

    fn encode(&self, destination: &Destination) -> Result<ExportReport> {
        let vc = &self.video_composition;
        let video_track = self
            .composition
            .first_track(MediaType::Video)
            .ok_or(BuildError::MissingTrack(MediaType::Video))?;
        let video_stream = video_track
            .source_stream_index()
            .ok_or(BuildError::MissingTrack(MediaType::Video))?;
        let audio_track = self.composition.first_track(MediaType::Audio);
        let audio_stream = audio_track.and_then(|t| t.source_stream_index());
        let end = vc
            .time_range()
            .map(|r| r.end())
            .ok_or_else(|| ExportError::failed("video composition has no instructions"))?;

        let mut input = ffmpeg::format::input(self.asset.path()).map_err(alphacomp_decoder::Error::from)?;
        let mut reader = VideoReader::for_stream(&input, video_stream)?;
        let writer = {
            let audio = audio_stream.and_then(|index| input.stream(index));
            AlphaWriter::create(destination, vc.render_size, vc.frame_duration, audio.as_ref())?
        };

        let mut retimer = FrameRetimer::new(vc.frame_duration, end);
        let mut sink = FrameSink {
            compositor: FrameCompositor::new(),
            tool: vc.animation_tool.as_ref(),
            render_size: vc.render_size,
            progress: ProgressTracker::new("Encoding", retimer.total_frames(), PROGRESS_INTERVAL),
            cancel: &self.cancel,
            writer,
        };
        let mut last_time: Option<MediaTime> = None;

        for (stream, packet) in input.packets() {
            if self.cancel.is_cancelled() {
                return Err(ExportError::cancelled());
            }

            let index = stream.index();
            if index == video_stream {
                reader.send_packet(&packet).map_err(ExportError::failed)?;
                for frame in reader.receive_frames().map_err(ExportError::failed)? {
                    let time = frame_time(&self.asset, &reader, frame.timestamp, last_time, vc.frame_duration);
                    last_time = Some(time);
                    if let Some(at) = video_track.map_source_time(video_stream, time) {
                        retimer.push(frame.image, at, |i, f| sink.emit(i, f))?;
                    }
                }
            } else if Some(index) == audio_stream {
                let Some(audio_track) = audio_track else {
                    continue;
                };
                let Some(pts) = packet.pts().or_else(|| packet.dts()) else {
                    continue;
                };
                let time_base = stream.time_base();
                let time = self.asset.asset_time(pts, time_base);
                if let Some(at) = audio_track.map_source_time(index, time) {
                    let shift = stream_ticks(at, time_base) - pts;
                    sink.writer.write_audio_packet(packet, shift)?;
                }
            }
        }

        reader.send_eof().map_err(ExportError::failed)?;
        for frame in reader.receive_frames().map_err(ExportError::failed)? {
            let time = frame_time(&self.asset, &reader, frame.timestamp, last_time, vc.frame_duration);
            last_time = Some(time);
            if let Some(at) = video_track.map_source_time(video_stream, time) {
                retimer.push(frame.image, at, |i, f| sink.emit(i, f))?;
            }
        }

        let emitted = retimer.finish(|i, f| sink.emit(i, f))?;
        if emitted == 0 {
            return Err(ExportError::failed("no video frames were decoded"));
        }

        let frames_written = sink.writer.finish()?;

        Ok(ExportReport {
            path: destination.path().to_path_buf(),
            status: ExportStatus::Completed,
            frames_written,
            render_size: vc.render_size,
            frame_rate: vc.frame_rate(),
            duration: end,
        })
    }
}

/// Renders retimed frames and hands them to the writer
struct FrameSink<'a> {
    compositor: FrameCompositor,
    tool: Option<&'a AnimationTool>,
    render_size: Size,
    progress: ProgressTracker,
    cancel: &'a CancelHandle,
    writer: AlphaWriter,
}

impl FrameSink<'_> {
    fn emit(&mut self, index: u64, frame: &RgbaImage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ExportError::cancelled());
        }
        let rendered = render_frame(&mut self.compositor, self.tool, frame, self.render_size)?;
        self.writer.write_frame(&rendered, index)?;
        self.progress.advance();
        Ok(())
    }
}

/// Flattens the layer graph over a decoded frame, or scales the frame to the
/// render size when there is no graph
fn render_frame(
    compositor: &mut FrameCompositor,
    tool: Option<&AnimationTool>,
    frame: &RgbaImage,
    render_size: Size,
) -> Result<RgbaImage> {
    match tool {
        Some(tool) => compositor
            .flatten(tool, frame, render_size)
            .map_err(|e| ExportError::failed(format!("compositing failed: {e}"))),
        None => {
            let (width, height) = render_size.to_pixels();
            if frame.width() == width && frame.height() == height {
                Ok(frame.clone())
            } else {
                Ok(imageops::resize(frame, width, height, FilterType::Triangle))
            }
        }
    }
}

/// Asset time of a decoded frame; frames without a timestamp follow the
/// previous frame by one output frame
fn frame_time(
    asset: &SourceAsset,
    reader: &VideoReader,
    timestamp: Option<i64>,
    previous: Option<MediaTime>,
    frame_duration: MediaTime,
) -> MediaTime {
    match timestamp {
        Some(ts) => asset.asset_time(ts, reader.time_base()),
        None => previous.map(|t| t + frame_duration).unwrap_or(MediaTime::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphacomp_core::{LayerTree, Rect};
    use image::Rgba;

    #[test]
    fn test_status_display() {
        assert_eq!(ExportStatus::Completed.to_string(), "completed");
        assert_eq!(ExportStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(ExportError::failed("boom").to_string(), "Export failed: boom");
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_render_without_graph_scales_to_render_size() {
        let frame = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let rendered = render_frame(&mut FrameCompositor::new(), None, &frame, Size::new(8.0, 2.0)).unwrap();
        assert_eq!(rendered.dimensions(), (8, 2));
    }

    #[test]
    fn test_render_with_graph_draws_overlay_top_left() {
        let size = Size::new(4.0, 4.0);
        let frame_rect = Rect::with_size(size);
        let mut tree = LayerTree::new(frame_rect);
        let root = tree.root();
        let video = tree.add_video_surface(root, frame_rect).unwrap();
        let overlay = tree.add_layer(root, frame_rect).unwrap();
        let image = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        tree.add_image(overlay, Arc::new(image), Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
        let tool = AnimationTool::post_processing_as_video_layer(video, tree).unwrap();

        let frame = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
        let rendered = render_frame(&mut FrameCompositor::new(), Some(&tool), &frame, size).unwrap();

        assert_eq!(rendered.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(rendered.get_pixel(3, 3), &Rgba([0, 0, 255, 255]));
    }
}
