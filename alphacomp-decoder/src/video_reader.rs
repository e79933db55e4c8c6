//! Video decoding to RGBA frames using FFmpeg

use crate::{is_drained, Error, Result};
use ffmpeg_next as ffmpeg;
use image::RgbaImage;

/// A decoded frame converted to straight-alpha RGBA
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub image: RgbaImage,
    /// Presentation timestamp in stream time base units
    pub timestamp: Option<i64>,
}

/// Decodes one video stream of an input into RGBA frames
pub struct VideoReader {
    time_base: ffmpeg::Rational,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<ScalerState>,
}

struct ScalerState {
    context: ffmpeg::software::scaling::Context,
    format: ffmpeg::format::Pixel,
    width: u32,
    height: u32,
}

impl VideoReader {
    /// Creates a decoder for the given stream
    pub fn new(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        if stream.parameters().medium() != ffmpeg::media::Type::Video {
            return Err(Error::NotVideo(stream.index()));
        }

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        Ok(Self {
            time_base: stream.time_base(),
            decoder,
            scaler: None,
        })
    }

    /// Creates a decoder for the stream at `stream_index` of `input`
    pub fn for_stream(input: &ffmpeg::format::context::Input, stream_index: usize) -> Result<Self> {
        let stream = input
            .stream(stream_index)
            .ok_or(Error::StreamNotFound(stream_index))?;
        Self::new(&stream)
    }

    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Sends a demuxed packet of this stream to the decoder
    pub fn send_packet(&mut self, packet: &ffmpeg::Packet) -> Result<()> {
        self.decoder.send_packet(packet)?;
        Ok(())
    }

    /// Signals the end of the stream so buffered frames can be drained
    pub fn send_eof(&mut self) -> Result<()> {
        self.decoder.send_eof()?;
        Ok(())
    }

    /// Drains every frame the decoder has ready
    pub fn receive_frames(&mut self) -> Result<Vec<DecodedFrame>> {
        let mut frames = Vec::new();
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    let timestamp = decoded.timestamp().or_else(|| decoded.pts());
                    let image = self.to_rgba(&decoded)?;
                    frames.push(DecodedFrame { image, timestamp });
                }
                Err(err) if is_drained(&err) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(frames)
    }

    fn to_rgba(&mut self, decoded: &ffmpeg::frame::Video) -> Result<RgbaImage> {
        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());

        let stale = match &self.scaler {
            Some(s) => s.format != format || s.width != width || s.height != height,
            None => true,
        };
        if stale {
            self.scaler = Some(ScalerState {
                context: ffmpeg::software::scaling::Context::get(
                    format,
                    width,
                    height,
                    ffmpeg::format::Pixel::RGBA,
                    width,
                    height,
                    ffmpeg::software::scaling::Flags::BILINEAR,
                )?,
                format,
                width,
                height,
            });
        }

        let mut rgba = ffmpeg::frame::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.context.run(decoded, &mut rgba)?;
        }

        frame_to_image(&rgba)
    }
}

/// Copies an RGBA frame into an image buffer, dropping row padding
pub fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbaImage> {
    let (width, height) = (frame.width(), frame.height());
    let stride = frame.stride(0);
    let row_bytes = width as usize * 4;
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        let row = data
            .get(start..start + row_bytes)
            .ok_or(Error::InvalidFrame { width, height })?;
        pixels.extend_from_slice(row);
    }

    RgbaImage::from_raw(width, height, pixels).ok_or(Error::InvalidFrame { width, height })
}
