//! FFmpeg-based alpha-preserving movie writer
//!
//! Encodes RGBA frames with an alpha-capable codec and muxes them, together
//! with audio packets copied from the source, into a QuickTime file.
//!
//! The flow per frame:
//!   1. RGBA pixels → ffmpeg `frame::Video` (RGBA, at the render size)
//!   2. swscale RGBA → the preset's pixel format (`yuva444p10le` or `argb`)
//!   3. encoder → packets, rescaled to the muxer time base and interleaved

use crate::{resolve_encoder, ExportError, Result};
use alphacomp_decoder::is_drained;
use alphacomp_core::{Destination, ExportPreset, MediaTime, Size};
use ffmpeg_next as ffmpeg;
use image::RgbaImage;

/// Audio stream copied into the output without re-encoding
#[derive(Debug, Clone, Copy)]
struct AudioPassthrough {
    output_index: usize,
    input_time_base: ffmpeg::Rational,
    output_time_base: ffmpeg::Rational,
}

/// Writes composited frames and passthrough audio to a movie file
pub struct AlphaWriter {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::codec::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    video_index: usize,
    encoder_time_base: ffmpeg::Rational,
    video_time_base: ffmpeg::Rational,
    audio: Option<AudioPassthrough>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl AlphaWriter {
    /// Opens the output file, configures the encoder and writes the header.
    ///
    /// `audio` is the source stream whose packets will be copied.
    pub fn create(
        destination: &Destination,
        render_size: Size,
        frame_duration: MediaTime,
        audio: Option<&ffmpeg::format::stream::Stream>,
    ) -> Result<Self> {
        let preset = destination.preset;
        let codec = resolve_encoder(preset)?;

        let mut output = ffmpeg::format::output_as(&destination.path, destination.container.format_name())?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        // Both presets take full-resolution chroma, so odd sizes are encoded as is
        let (width, height) = render_size.to_pixels();

        let encoder_time_base = ffmpeg::Rational(frame_duration.value as i32, frame_duration.timescale);

        // ── Configure the encoder ──
        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        video.set_width(width);
        video.set_height(height);
        video.set_format(pixel_format(preset));
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(encoder_time_base.invert()));
        video.set_threading(ffmpeg::codec::threading::Config {
            kind: threading_kind(preset),
            count: num_cpus::get(),
            ..Default::default()
        });
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let mut options = ffmpeg::Dictionary::new();
        for (key, value) in encoder_options(preset) {
            options.set(key, value);
        }

        let encoder = video.open_as_with(codec, options).map_err(|e| {
            ExportError::ResourceUnavailable(format!(
                "could not open {preset} encoder ({width}x{height}): {e}"
            ))
        })?;

        let video_index = {
            let mut stream = output.add_stream(codec)?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            stream.index()
        };

        // ── Audio passthrough ──
        let mut audio = match audio {
            Some(source) => {
                let mut stream = output.add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))?;
                stream.set_parameters(source.parameters());
                // Let the muxer pick a tag valid for the output container
                unsafe {
                    (*stream.parameters().as_mut_ptr()).codec_tag = 0;
                }
                Some(AudioPassthrough {
                    output_index: stream.index(),
                    input_time_base: source.time_base(),
                    output_time_base: source.time_base(),
                })
            }
            None => None,
        };

        let mut mux_options = ffmpeg::Dictionary::new();
        if destination.optimize_for_network_use {
            mux_options.set("movflags", "+faststart");
        }
        output.write_header_with(mux_options)?;

        // The muxer may change stream time bases while writing the header
        let video_time_base = output
            .stream(video_index)
            .map(|s| s.time_base())
            .unwrap_or(encoder_time_base);
        if let Some(audio) = audio.as_mut() {
            if let Some(stream) = output.stream(audio.output_index) {
                audio.output_time_base = stream.time_base();
            }
        }

        let scaler = ffmpeg::software::scaling::Context::get(
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            pixel_format(preset),
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        tracing::debug!(
            path = %destination.path.display(),
            %preset,
            width,
            height,
            audio = audio.is_some(),
            "opened output"
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            video_index,
            encoder_time_base,
            video_time_base,
            audio,
            width,
            height,
            frames_written: 0,
        })
    }

    /// Encodes `image` as output frame `index`
    pub fn write_frame(&mut self, image: &RgbaImage, index: u64) -> Result<()> {
        if image.dimensions() != (self.width, self.height) {
            return Err(ExportError::failed(format!(
                "frame {index} is {}x{}, expected {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }

        let mut rgba = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGBA, self.width, self.height);

        // Copy row by row; the frame stride may be wider than the image
        {
            let stride = rgba.stride(0);
            let dst = rgba.data_mut(0);
            let row_bytes = self.width as usize * 4;
            for (y, row) in image.as_raw().chunks_exact(row_bytes).enumerate() {
                let dst_off = y * stride;
                dst[dst_off..dst_off + row_bytes].copy_from_slice(row);
            }
        }

        let mut converted = ffmpeg::frame::Video::empty();
        self.scaler.run(&rgba, &mut converted)?;
        converted.set_pts(Some(index as i64));

        self.encoder.send_frame(&converted)?;
        self.drain_video()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Copies a source audio packet, shifting its timestamps by `offset`
    /// (in the source stream's time base).
    pub fn write_audio_packet(&mut self, mut packet: ffmpeg::Packet, offset: i64) -> Result<()> {
        let Some(audio) = self.audio else {
            return Ok(());
        };

        packet.set_pts(packet.pts().map(|pts| pts + offset));
        packet.set_dts(packet.dts().map(|dts| dts + offset));
        packet.rescale_ts(audio.input_time_base, audio.output_time_base);
        packet.set_position(-1);
        packet.set_stream(audio.output_index);
        packet.write_interleaved(&mut self.output)?;
        Ok(())
    }

    /// Flushes the encoder and writes the trailer
    pub fn finish(mut self) -> Result<u64> {
        self.encoder.send_eof()?;
        self.drain_video()?;
        self.output.write_trailer()?;
        Ok(self.frames_written)
    }

    fn drain_video(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(self.video_index);
                    packet.rescale_ts(self.encoder_time_base, self.video_time_base);
                    packet.write_interleaved(&mut self.output)?;
                }
                Err(err) if is_drained(&err) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Pixel format the preset's encoder consumes
fn pixel_format(preset: ExportPreset) -> ffmpeg::format::Pixel {
    match preset {
        ExportPreset::ProRes4444 => ffmpeg::format::Pixel::YUVA444P10LE,
        ExportPreset::Animation => ffmpeg::format::Pixel::ARGB,
    }
}

fn threading_kind(preset: ExportPreset) -> ffmpeg::codec::threading::Type {
    match preset {
        ExportPreset::ProRes4444 => ffmpeg::codec::threading::Type::Slice,
        ExportPreset::Animation => ffmpeg::codec::threading::Type::None,
    }
}

/// Encoder private options for the preset
fn encoder_options(preset: ExportPreset) -> &'static [(&'static str, &'static str)] {
    match preset {
        // profile 4 = 4444, vendor tag matching Apple's encoder, full-depth alpha
        ExportPreset::ProRes4444 => &[("profile", "4444"), ("vendor", "apl0"), ("alpha_bits", "16")],
        ExportPreset::Animation => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphacomp_core::MediaType;
    use alphacomp_decoder::SourceAsset;
    use image::Rgba;

    #[test]
    fn test_presets_use_alpha_pixel_formats() {
        assert_eq!(pixel_format(ExportPreset::ProRes4444), ffmpeg::format::Pixel::YUVA444P10LE);
        assert_eq!(pixel_format(ExportPreset::Animation), ffmpeg::format::Pixel::ARGB);
        assert!(encoder_options(ExportPreset::ProRes4444).contains(&("profile", "4444")));
    }

    #[test]
    fn test_odd_render_size_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::new(dir.path().join("odd.mov")).with_preset(ExportPreset::Animation);
        let size = Size::from_pixels(65, 49);

        let mut writer = AlphaWriter::create(&destination, size, MediaTime::new(1, 30), None).unwrap();
        let frame = RgbaImage::from_pixel(65, 49, Rgba([0, 255, 0, 128]));
        for index in 0..3 {
            writer.write_frame(&frame, index).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 3);

        let written = SourceAsset::open(destination.path()).unwrap();
        let video = written.info().first_track(MediaType::Video).unwrap();
        assert_eq!(video.natural_size, Some(size));
    }

    #[test]
    fn test_frame_of_wrong_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::new(dir.path().join("mismatch.mov")).with_preset(ExportPreset::Animation);

        let mut writer =
            AlphaWriter::create(&destination, Size::from_pixels(16, 16), MediaTime::new(1, 30), None).unwrap();
        let err = writer.write_frame(&RgbaImage::new(8, 8), 0).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Encode);
    }
}
