//! Command-line host for the filter pipeline
//!
//! This module provides:
//! - Capture sessions from a webcam or file into a directory of JPEG snapshots
//! - One-shot processing of a still image
//! - Preset export and listing

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lvncam::pipeline::compress::encode_jpeg;
use lvncam::pipeline::config::SharedConfig;
use lvncam::pipeline::frame::Frame;
use lvncam::pipeline::FrameProcessor;
use lvncam::preview::capture::CaptureManager;
use lvncam::preview::sink::{CancelFlag, PreviewSink, SinkFactory, SnapshotSink};
use lvncam::settings::store::{read_preset, PresetStore};
use lvncam::settings::types::PresetFile;
use lvncam::settings::watch::PresetWatcher;
use lvncam::source::{Geometry, SourceOpener, SourceSpec};

pub type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "lvncam")]
#[command(about = "Local variance normalization filter for webcam and file video")]
#[command(version)]
pub struct Cli {
    /// Preset file to start from (JSON, as written by `save-preset`)
    #[arg(long, global = true)]
    pub preset: Option<PathBuf>,

    /// Reload the preset file while a capture is running
    #[arg(long, global = true, requires = "preset")]
    pub watch: bool,

    /// Override one setting, e.g. `--set amplitude=40 --set blendMode=Overlay`
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter a live webcam
    Webcam {
        /// Capture device index (/dev/videoN)
        #[arg(short, long, default_value = "0")]
        index: u32,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Filter a video file (via ffmpeg), image, animated GIF or directory of images
    File {
        path: PathBuf,

        /// Stop at the last frame instead of starting over
        #[arg(long)]
        no_loop: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run a single still image through the filter
    Image { input: PathBuf, output: PathBuf },

    /// Print the default preset
    Defaults,

    /// Save the effective settings as a named preset
    SavePreset {
        name: String,

        /// Preset directory
        #[arg(long, default_value = "presets")]
        dir: PathBuf,
    },

    /// List saved presets
    ListPresets {
        #[arg(long, default_value = "presets")]
        dir: PathBuf,
    },
}

/// Where a capture session writes its frames.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Directory for the processed frames
    #[arg(short, long, default_value = "lvncam-frames")]
    pub output_dir: PathBuf,

    /// Keep one frame out of every N
    #[arg(long, default_value = "1")]
    pub every: u64,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,

    /// JPEG quality of the written frames
    #[arg(long, default_value = "95", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,
}

impl Cli {
    /// The preset file (or defaults) with every `--set` applied.
    pub fn effective_preset(&self) -> CliResult<PresetFile> {
        let mut preset = match &self.preset {
            Some(path) => read_preset(path)?,
            None => PresetFile::default(),
        };
        for entry in &self.overrides {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected KEY=VALUE, got {entry:?}"))?;
            preset.config.set_param(key.trim(), value.trim())?;
        }
        Ok(preset)
    }
}

pub fn run(cli: Cli) -> CliResult<()> {
    let preset = cli.effective_preset()?;

    match &cli.command {
        Commands::Webcam { index, output } => {
            capture_with_ctrlc(&cli, &preset, SourceSpec::webcam(*index), output)
        }
        Commands::File {
            path,
            no_loop,
            output,
        } => {
            let spec = SourceSpec::file(path).with_looping(!no_loop);
            capture_with_ctrlc(&cli, &preset, spec, output)
        }
        Commands::Image { input, output } => process_image(input, output, &preset),
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&PresetFile::default())?);
            Ok(())
        }
        Commands::SavePreset { name, dir } => {
            let path = PresetStore::new(dir).save(name, &preset)?;
            println!("Preset saved: {}", path.display());
            Ok(())
        }
        Commands::ListPresets { dir } => {
            let names = PresetStore::new(dir).list()?;
            if names.is_empty() {
                println!("No presets in {}.", dir.display());
            }
            for name in names {
                println!("  {name}");
            }
            Ok(())
        }
    }
}

fn capture_with_ctrlc(
    cli: &Cli,
    preset: &PresetFile,
    spec: SourceSpec,
    output: &OutputArgs,
) -> CliResult<()> {
    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.cancel())?;

    let watch = if cli.watch { cli.preset.as_deref() } else { None };
    println!("Capturing {spec} into {} (press Ctrl+C to stop)", output.output_dir.display());
    let opener = Arc::new(lvncam::source::DefaultOpener::new());
    run_capture(opener, preset, &spec, output, watch, cancel)
}

/// Run one capture session to completion and print its statistics.
pub fn run_capture(
    opener: Arc<dyn SourceOpener>,
    preset: &PresetFile,
    spec: &SourceSpec,
    output: &OutputArgs,
    watch: Option<&Path>,
    cancel: CancelFlag,
) -> CliResult<()> {
    let config = SharedConfig::new(preset.config)?;

    let sink_output = output.clone();
    let factory: SinkFactory = Arc::new(move |geometry: &Geometry| {
        tracing::debug!(
            "snapshot sink for {}x{} frames",
            geometry.width,
            geometry.height
        );
        Box::new(
            SnapshotSink::new(&sink_output.output_dir, cancel.clone())
                .every(sink_output.every)
                .limit(sink_output.frames)
                .quality(sink_output.quality),
        ) as Box<dyn PreviewSink>
    });

    let _watcher = match watch {
        Some(path) => Some(PresetWatcher::spawn(
            path,
            config.clone(),
            PresetWatcher::DEFAULT_INTERVAL,
        )?),
        None => None,
    };

    let manager = CaptureManager::new(opener, config, factory);
    manager.start(spec)?;
    manager.wait();

    println!("{}", serde_json::to_string_pretty(&manager.diagnostics())?);
    Ok(())
}

/// Filter one still image and write the result. JPEG outputs go through the
/// pipeline's encoder so frames with alpha still encode.
pub fn process_image(input: &Path, output: &Path, preset: &PresetFile) -> CliResult<()> {
    preset.validate()?;
    let frame = Frame::from_image(image::open(input)?)?;
    let processed = FrameProcessor::new().process(&frame, &preset.config);

    let is_jpeg = output
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg"));
    if is_jpeg {
        std::fs::write(output, encode_jpeg(&processed, 95)?)?;
    } else {
        processed.to_image().save(output)?;
    }
    tracing::info!("wrote {}", output.display());
    Ok(())
}
