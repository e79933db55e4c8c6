//! Output descriptors: container type and export presets

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerType {
    /// QuickTime movie
    #[default]
    QuickTimeMovie,
}

impl ContainerType {
    /// Muxer short name
    pub fn format_name(&self) -> &'static str {
        match self {
            ContainerType::QuickTimeMovie => "mov",
        }
    }
}

/// Encoder configurations that keep per-pixel transparency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportPreset {
    /// ProRes 4444 with a 16-bit alpha plane, highest quality
    #[default]
    ProRes4444,
    /// QuickTime Animation (run-length ARGB), lossless
    Animation,
}

impl ExportPreset {
    /// Encoder names tried in order
    pub fn encoder_names(&self) -> &'static [&'static str] {
        match self {
            ExportPreset::ProRes4444 => &["prores_ks"],
            ExportPreset::Animation => &["qtrle"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportPreset::ProRes4444 => "prores4444",
            ExportPreset::Animation => "animation",
        }
    }
}

impl fmt::Display for ExportPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prores4444" | "prores" => Ok(ExportPreset::ProRes4444),
            "animation" | "qtrle" => Ok(ExportPreset::Animation),
            other => Err(format!("unknown export preset '{other}' (expected prores4444 or animation)")),
        }
    }
}

/// Where and how an export is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub path: PathBuf,
    pub container: ContainerType,
    pub preset: ExportPreset,
    /// Moves the index to the front of the file for progressive playback
    pub optimize_for_network_use: bool,
}

impl Destination {
    /// Creates a local-file destination with the default preset
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            container: ContainerType::default(),
            preset: ExportPreset::default(),
            optimize_for_network_use: false,
        }
    }

    pub fn with_preset(mut self, preset: ExportPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the output file is written into
    pub fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }
}
