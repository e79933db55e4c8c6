//! Builds the overlay composition for a source asset

use crate::BuildError;
use alphacomp_core::{
    AnimationTool, AssetInfo, Composition, CompositionInstruction, LayerInstruction, LayerTree, MediaTime, MediaType,
    Rect, Size, TimeRange, VideoComposition,
};
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;

/// Output frame rate, independent of the source frame rate
pub const FRAME_RATE: i32 = 30;

/// A static image drawn over every video frame
#[derive(Debug, Clone)]
pub struct Overlay {
    image: Arc<RgbaImage>,
}

impl Overlay {
    /// Loads the overlay image from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| BuildError::Overlay {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(image.to_rgba8()))
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image: Arc::new(image) }
    }

    /// Native pixel size of the image
    pub fn size(&self) -> Size {
        Size::from_pixels(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }
}

/// A composition ready for export, together with its rendering instruction
#[derive(Debug, Clone)]
pub struct BuiltComposition {
    pub composition: Composition,
    pub video_composition: VideoComposition,
}

/// Copies the first video and audio track of an asset into a new composition
/// and describes how the overlay is drawn over the video.
pub struct CompositionBuilder {
    overlay: Overlay,
}

impl CompositionBuilder {
    pub fn new(overlay: Overlay) -> Self {
        Self { overlay }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(asset = %asset.path.display()))]
    pub fn build(&self, asset: &AssetInfo) -> Result<BuiltComposition, BuildError> {
        let video_track = asset
            .first_track(MediaType::Video)
            .ok_or(BuildError::MissingTrack(MediaType::Video))?;
        let audio_track = asset
            .first_track(MediaType::Audio)
            .ok_or(BuildError::MissingTrack(MediaType::Audio))?;

        let duration = asset.duration;
        let full_range = TimeRange::new(MediaTime::ZERO, duration);

        let mut composition = Composition::new();

        let video = composition.add_mutable_track(MediaType::Video, Some(video_track.track_id));
        video.insert_time_range(full_range, video_track, MediaTime::ZERO)?;
        let video_track_id = video.track_id();

        let audio = composition.add_mutable_track(MediaType::Audio, Some(audio_track.track_id));
        audio.insert_time_range(full_range, audio_track, MediaTime::ZERO)?;

        let natural_size = video_track
            .natural_size
            .filter(|size| !size.is_empty())
            .ok_or(BuildError::MissingNaturalSize(video_track.track_id))?;

        // Read but not applied: rotated sources render in their stored orientation
        let transform = video_track.preferred_transform;
        if !transform.is_identity() {
            tracing::warn!(
                track = %video_track.track_id,
                rotation = transform.rotation_degrees(),
                "source has a preferred transform that is not applied"
            );
        }

        let instruction = CompositionInstruction::new(
            TimeRange::from_start_end(MediaTime::ZERO, duration),
            vec![LayerInstruction::new(video_track_id)],
        );

        let mut video_composition = VideoComposition::new(natural_size, MediaTime::new(1, FRAME_RATE));
        video_composition.instructions = vec![instruction];
        video_composition.animation_tool = Some(self.layer_graph(natural_size)?);
        video_composition.validate()?;

        tracing::debug!(
            render_size = %natural_size,
            %duration,
            overlay = %self.overlay.size(),
            "built composition"
        );

        Ok(BuiltComposition {
            composition,
            video_composition,
        })
    }

    /// Parent layer holding the video layer and, above it, the overlay layer
    /// with the image at its native size in the top-left corner.
    fn layer_graph(&self, natural_size: Size) -> Result<AnimationTool, BuildError> {
        let frame = Rect::with_size(natural_size);

        let mut tree = LayerTree::new(frame);
        let parent = tree.root();
        let video_layer = tree.add_video_surface(parent, frame)?;
        let overlay_layer = tree.add_layer(parent, frame)?;
        tree.add_image(
            overlay_layer,
            Arc::clone(&self.overlay.image),
            Rect::with_size(self.overlay.size()),
        )?;

        Ok(AnimationTool::post_processing_as_video_layer(video_layer, tree)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_captured_logs;
    use alphacomp_core::{LayerContents, TrackId, TrackInfo, Transform};

    fn seconds(s: i64) -> MediaTime {
        MediaTime::new(s, 1)
    }

    fn asset(natural_size: Size, with_audio: bool) -> AssetInfo {
        let duration = seconds(10);
        let mut video = TrackInfo::video(1, 0, TimeRange::new(MediaTime::ZERO, duration), natural_size);
        video.nominal_frame_rate = Some(24.0);
        let mut tracks = vec![video];
        if with_audio {
            // Audio a little shorter than the asset, as muxers often produce
            tracks.push(TrackInfo::audio(2, 1, TimeRange::new(MediaTime::ZERO, MediaTime::new(9_980, 1000))));
        }
        AssetInfo::new("clip.mov", duration, tracks)
    }

    fn builder(width: u32, height: u32) -> CompositionBuilder {
        CompositionBuilder::new(Overlay::from_image(RgbaImage::new(width, height)))
    }

    #[test]
    fn test_track_durations_match_asset() {
        let built = builder(64, 64).build(&asset(Size::new(1920.0, 1080.0), true)).unwrap();

        let video = built.composition.first_track(MediaType::Video).unwrap();
        let audio = built.composition.first_track(MediaType::Audio).unwrap();
        assert_eq!(video.duration(), seconds(10));
        assert_eq!(audio.duration(), seconds(10));
        assert_eq!(video.track_id(), TrackId(1));
        assert_eq!(audio.track_id(), TrackId(2));
    }

    #[test]
    fn test_render_size_follows_video_not_overlay() {
        let natural = Size::new(640.0, 360.0);
        for (w, h) in [(32, 32), (1280, 2000)] {
            let built = builder(w, h).build(&asset(natural, true)).unwrap();
            assert_eq!(built.video_composition.render_size, natural);
        }
    }

    #[test]
    fn test_instruction_and_frame_rate() {
        let built = builder(8, 8).build(&asset(Size::new(320.0, 240.0), true)).unwrap();
        let vc = &built.video_composition;

        assert_eq!(vc.frame_duration, MediaTime::new(1, 30));
        assert_eq!(vc.frame_count(), 300);
        assert_eq!(vc.instructions.len(), 1);
        assert_eq!(
            vc.instructions[0].time_range,
            TimeRange::new(MediaTime::ZERO, seconds(10))
        );
        assert_eq!(vc.instructions[0].layer_instructions, vec![LayerInstruction::new(TrackId(1))]);
    }

    #[test]
    fn test_layer_graph_shape() {
        let natural = Size::new(1920.0, 1080.0);
        let built = builder(200, 400).build(&asset(natural, true)).unwrap();
        let tool = built.video_composition.animation_tool.unwrap();
        let tree = tool.tree();

        let parent = tree.layer(tool.parent_layer()).unwrap();
        assert_eq!(parent.frame, Rect::with_size(natural));
        assert_eq!(parent.sublayers().len(), 2);

        let video = tree.layer(parent.sublayers()[0]).unwrap();
        assert_eq!(parent.sublayers()[0], tool.video_layer());
        assert!(matches!(video.contents, LayerContents::VideoSurface));
        assert_eq!(video.frame, Rect::with_size(natural));

        let overlay = tree.layer(parent.sublayers()[1]).unwrap();
        assert_eq!(overlay.frame, Rect::with_size(natural));
        assert_eq!(overlay.sublayers().len(), 1);

        let image = tree.layer(overlay.sublayers()[0]).unwrap();
        assert!(matches!(image.contents, LayerContents::Image(_)));
        assert_eq!(image.frame, Rect::new(0.0, 0.0, 200.0, 400.0));
    }

    #[test]
    fn test_missing_audio_fails() {
        let err = builder(8, 8)
            .build(&asset(Size::new(320.0, 240.0), false))
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingTrack(MediaType::Audio)));
    }

    #[test]
    fn test_missing_video_fails() {
        let audio = TrackInfo::audio(1, 0, TimeRange::new(MediaTime::ZERO, seconds(3)));
        let asset = AssetInfo::new("audio.m4a", seconds(3), vec![audio]);
        let err = builder(8, 8).build(&asset).unwrap_err();
        assert!(matches!(err, BuildError::MissingTrack(MediaType::Video)));
    }

    #[test]
    fn test_preferred_transform_is_reported_not_applied() {
        let mut asset = asset(Size::new(1080.0, 1920.0), true);
        asset.tracks[0].preferred_transform = Transform::rotation(90.0);

        let (built, logs) = with_captured_logs(|| builder(8, 8).build(&asset));
        let built = built.unwrap();

        assert_eq!(built.video_composition.instructions[0].layer_instructions[0].transform, None);
        assert_eq!(built.video_composition.render_size, Size::new(1080.0, 1920.0));
        assert!(logs.contents().contains("preferred transform"));
    }

    #[test]
    fn test_missing_overlay_file() {
        let err = Overlay::load("/nonexistent/overlay.png").unwrap_err();
        assert!(matches!(err, BuildError::Overlay { .. }));
    }
}
