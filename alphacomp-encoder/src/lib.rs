//! alphacomp Encoder Library
//!
//! This library builds overlay compositions from source assets and exports
//! them to QuickTime files that keep their alpha channel.

pub mod builder;
pub mod destination;
pub mod progress_tracker;
pub mod session;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{BuiltComposition, CompositionBuilder, Overlay, FRAME_RATE};
pub use destination::prepare_destination;
pub use session::{CancelHandle, ExportReport, ExportSession, ExportStatus};
pub use writer::AlphaWriter;

use alphacomp_core::{ExportPreset, MediaType, TrackId};
use alphacomp_decoder::SourceAsset;
use ffmpeg_next as ffmpeg;
use std::fmt;
use std::path::{Path, PathBuf};

/// Result type for alphacomp-encoder export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised while building a composition
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No {0} track found")]
    MissingTrack(MediaType),

    #[error("Video track {0} has no natural size")]
    MissingNaturalSize(TrackId),

    #[error("Composition error: {0}")]
    Core(#[from] alphacomp_core::Error),

    #[error("Could not load overlay {}: {source}", path.display())]
    Overlay {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Error types for alphacomp-encoder export operations
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid input: {0}")]
    Build(#[from] BuildError),

    #[error("Could not open source asset: {0}")]
    Source(#[from] alphacomp_decoder::Error),

    #[error("Could not prepare destination {}: {reason}", path.display())]
    Filesystem { path: PathBuf, reason: String },

    #[error("Encoder unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Export {status}: {reason}")]
    Encode { status: ExportStatus, reason: String },
}

/// Broad classes of export failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source or overlay cannot be used
    InvalidInput,
    /// The destination cannot be prepared
    Filesystem,
    /// The encoder failed or was cancelled
    Encode,
    /// No encoder session can be constructed
    ResourceUnavailable,
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::Build(_) | ExportError::Source(_) => ErrorKind::InvalidInput,
            ExportError::Filesystem { .. } => ErrorKind::Filesystem,
            ExportError::Encode { .. } => ErrorKind::Encode,
            ExportError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
        }
    }

    /// Encode failure with the given reason
    pub fn failed(reason: impl fmt::Display) -> Self {
        ExportError::Encode {
            status: ExportStatus::Failed,
            reason: reason.to_string(),
        }
    }

    pub fn cancelled() -> Self {
        ExportError::Encode {
            status: ExportStatus::Cancelled,
            reason: "export was cancelled".into(),
        }
    }
}

impl From<ffmpeg::Error> for ExportError {
    fn from(err: ffmpeg::Error) -> Self {
        ExportError::failed(format!("FFmpeg error: {err}"))
    }
}

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Alpha-preserving encoder preset
    pub preset: ExportPreset,
    /// Move the movie index to the front of the file
    pub optimize_for_network_use: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preset: ExportPreset::ProRes4444,
            optimize_for_network_use: false,
        }
    }
}

/// Finds an FFmpeg encoder for the preset
pub fn resolve_encoder(preset: ExportPreset) -> Result<ffmpeg::Codec> {
    alphacomp_decoder::init_ffmpeg().map_err(|e| ExportError::ResourceUnavailable(e.to_string()))?;
    preset
        .encoder_names()
        .iter()
        .find_map(|name| ffmpeg::encoder::find_by_name(name))
        .ok_or_else(|| {
            ExportError::ResourceUnavailable(format!(
                "no encoder for preset {preset} (tried {})",
                preset.encoder_names().join(", ")
            ))
        })
}

/// Overlays `overlay` on every frame of `source` and writes the result to `destination`.
///
/// The composition is built before anything touches the destination, so a
/// source without audio or video fails without creating or removing files.
#[tracing::instrument(skip_all, fields(source = %source.as_ref().display()))]
pub async fn export(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    overlay: &Overlay,
    config: ExportConfig,
) -> Result<ExportReport> {
    let asset = SourceAsset::open(source)?;
    let built = CompositionBuilder::new(overlay.clone()).build(asset.info())?;
    let session = ExportSession::new(asset, built, config)?;
    session.export(destination).await
}
