//! alphacomp CLI Tool
//!
//! Command-line interface for overlaying an image onto a video and exporting
//! the result with its alpha channel preserved.

use alphacomp_core::{AssetInfo, ExportPreset, MediaType};
use alphacomp_decoder::SourceAsset;
use alphacomp_encoder::{ExportConfig, Overlay};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alphacomp")]
#[command(about = "Overlay a still image on a video and export it with alpha")]
#[command(version)]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a video with an image drawn over every frame
    Export {
        /// Input video file path
        input: PathBuf,

        /// Output QuickTime file path
        #[arg(short, long)]
        output: PathBuf,

        /// Overlay image path
        #[arg(long)]
        overlay: PathBuf,

        /// Alpha-preserving encoder preset (prores4444 or animation)
        #[arg(long, default_value = "prores4444")]
        preset: ExportPreset,

        /// Move the movie index to the start of the file
        #[arg(long)]
        optimize_for_network: bool,
    },

    /// Show the tracks of a video file
    Inspect {
        /// Input video file path
        input: PathBuf,

        /// Print the asset description as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Export {
            input,
            output,
            overlay,
            preset,
            optimize_for_network,
        } => export_video(input, output, overlay, preset, optimize_for_network).await?,

        Commands::Inspect { input, json } => inspect_video(input, json)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn export_video(
    input: PathBuf,
    output: PathBuf,
    overlay: PathBuf,
    preset: ExportPreset,
    optimize_for_network_use: bool,
) -> Result<()> {
    println!("Exporting video: {}", input.display());
    println!("Overlay: {}", overlay.display());
    println!("Output: {} ({preset})", output.display());

    let overlay = Overlay::load(&overlay).context("Failed to load overlay image")?;
    let config = ExportConfig {
        preset,
        optimize_for_network_use,
    };

    let report = match alphacomp_encoder::export(&input, &output, &overlay, config).await {
        Ok(report) => report,
        Err(err) => {
            let kind = err.kind();
            return Err(err).with_context(|| format!("Export failed ({kind:?})"));
        }
    };

    println!(
        "Wrote {} frames ({}, {:.2} fps, {}) to {}",
        report.frames_written,
        report.render_size,
        report.frame_rate,
        report.duration,
        report.path.display()
    );

    Ok(())
}

fn inspect_video(input: PathBuf, json: bool) -> Result<()> {
    let asset = SourceAsset::open(&input).context("Failed to open video file")?;

    if json {
        let text = serde_json::to_string_pretty(asset.info()).context("Failed to serialize asset info")?;
        println!("{text}");
    } else {
        print_info(asset.info());
    }

    Ok(())
}

fn print_info(info: &AssetInfo) {
    println!("\n=== Asset Information ===");
    println!("Path: {}", info.path.display());
    println!("Duration: {} ({:.2} seconds)", info.duration, info.duration.seconds());
    println!("Tracks: {}", info.tracks.len());

    if let Some(video) = info.first_track(MediaType::Video) {
        if let Some(size) = video.natural_size {
            println!("Natural size: {size}");
        }
        if !video.preferred_transform.is_identity() {
            println!(
                "Preferred transform: rotation {:.0} degrees (not applied on export)",
                video.preferred_transform.rotation_degrees()
            );
        }
    }

    println!("\n=== Tracks ===");
    for track in &info.tracks {
        let mut line = format!(
            "  Track {}: {} ({}), stream {}, range {}",
            track.track_id, track.media_type, track.codec, track.stream_index, track.time_range
        );
        if let Some(rate) = track.nominal_frame_rate {
            line.push_str(&format!(", {rate:.2} fps"));
        }
        println!("{line}");
    }

    let missing: Vec<_> = [MediaType::Video, MediaType::Audio]
        .into_iter()
        .filter(|t| info.first_track(*t).is_none())
        .map(|t| t.to_string())
        .collect();
    if !missing.is_empty() {
        println!("\nCannot be exported: no {} track", missing.join(" or "));
    }
}
