//! alphacomp Decoder Library
//!
//! This library opens source assets with FFmpeg, decodes their video frames
//! to RGBA and flattens layer graphs over those frames.

pub mod frame_compositor;
pub mod source;
pub mod video_reader;

pub use frame_compositor::FrameCompositor;
pub use source::SourceAsset;
pub use video_reader::{DecodedFrame, VideoReader};

use ffmpeg_next as ffmpeg;
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Initializes FFmpeg once per process
pub fn init_ffmpeg() -> Result<()> {
    let mut result = Ok(());
    FFMPEG_INIT.call_once(|| {
        result = ffmpeg::init();
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    });
    result.map_err(Error::from)
}

/// Whether a `receive_*` error only means the codec has no more output for now
pub fn is_drained(err: &ffmpeg::Error) -> bool {
    match err {
        ffmpeg::Error::Eof => true,
        ffmpeg::Error::Other { errno } => *errno == ffmpeg::util::error::EAGAIN,
        _ => false,
    }
}

/// Result type for alphacomp-decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for alphacomp-decoder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("alphacomp core error: {0}")]
    Core(#[from] alphacomp_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg::Error),

    #[error("Stream not found: {0}")]
    StreamNotFound(usize),

    #[error("Not a video stream: {0}")]
    NotVideo(usize),

    #[error("Invalid frame: {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },
}
