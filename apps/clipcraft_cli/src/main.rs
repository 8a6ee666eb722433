//! clipcraft: run edit scripts against the timeline model and export them
//! with ffmpeg.
//!
//! Usage:
//!   clipcraft inspect <SCRIPT>                 Print the built composition
//!   clipcraft export <SCRIPT> --out <PATH>     Render to a video file
//!   clipcraft strip <SCRIPT> --out-dir <DIR>   Extract clip strip frames

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clipcraft_core::{AspectRatio, EditSession};
use clipcraft_render::{
    apply_reframe, auto_reframe, clip_strip, CenterCropService, ExportCancel, ExportCoordinator,
    ExportFormat, ExportOptions, ExportQuality, ExportState, FfmpegBackend, FfmpegFrameGenerator,
    FfprobeAccessor, FrameRate, PlatformPreset, ReframeRequest,
};

mod script;

use script::{build_session, EditScript, ProbedSources};

#[derive(Parser)]
#[command(name = "clipcraft", about = "Mobile-style video timeline editing", version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the script's composition and print it as JSON
    Inspect {
        /// Path to the edit script
        script: PathBuf,
    },

    /// Export the script's composition to a video file
    Export {
        /// Path to the edit script
        script: PathBuf,

        /// Output file path
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long, value_enum, default_value = "1080p")]
        quality: QualityArg,

        #[arg(long, value_enum, default_value = "mp4")]
        format: FormatArg,

        #[arg(long, value_enum, default_value = "30")]
        fps: FpsArg,

        /// Override the timeline framing
        #[arg(long, value_enum)]
        aspect: Option<AspectArg>,

        /// Platform preset; replaces quality, aspect and fps
        #[arg(long, value_enum)]
        preset: Option<PresetArg>,

        /// Centre-crop every clip to the export framing first
        #[arg(long)]
        reframe: bool,

        /// Directory for in-progress renders
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },

    /// Extract evenly spaced frames for every clip
    Strip {
        /// Path to the edit script
        script: PathBuf,

        /// Directory the frames are written to
        #[arg(long)]
        out_dir: PathBuf,

        /// Frames per clip
        #[arg(long, default_value = "8")]
        count: usize,

        /// Frame width in pixels
        #[arg(long, default_value = "160")]
        width: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum QualityArg {
    #[value(name = "480p")]
    Sd480p,
    #[value(name = "720p")]
    Hd720p,
    #[value(name = "1080p")]
    Hd1080p,
    #[value(name = "4k")]
    Uhd4k,
}

impl From<QualityArg> for ExportQuality {
    fn from(q: QualityArg) -> Self {
        match q {
            QualityArg::Sd480p => ExportQuality::Sd480p,
            QualityArg::Hd720p => ExportQuality::Hd720p,
            QualityArg::Hd1080p => ExportQuality::Hd1080p,
            QualityArg::Uhd4k => ExportQuality::Uhd4k,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Mp4,
    Hevc,
    Mov,
}

impl From<FormatArg> for ExportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Mp4 => ExportFormat::Mp4,
            FormatArg::Hevc => ExportFormat::Hevc,
            FormatArg::Mov => ExportFormat::Mov,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FpsArg {
    #[value(name = "24")]
    Fps24,
    #[value(name = "30")]
    Fps30,
    #[value(name = "60")]
    Fps60,
}

impl From<FpsArg> for FrameRate {
    fn from(f: FpsArg) -> Self {
        match f {
            FpsArg::Fps24 => FrameRate::Fps24,
            FpsArg::Fps30 => FrameRate::Fps30,
            FpsArg::Fps60 => FrameRate::Fps60,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AspectArg {
    Horizontal,
    Vertical,
    Square,
}

impl From<AspectArg> for AspectRatio {
    fn from(a: AspectArg) -> Self {
        match a {
            AspectArg::Horizontal => AspectRatio::Horizontal,
            AspectArg::Vertical => AspectRatio::Vertical,
            AspectArg::Square => AspectRatio::Square,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Tiktok,
    InstagramReels,
    InstagramPost,
    Youtube,
    YoutubeShorts,
    Twitter,
}

impl From<PresetArg> for PlatformPreset {
    fn from(p: PresetArg) -> Self {
        match p {
            PresetArg::Tiktok => PlatformPreset::TikTok,
            PresetArg::InstagramReels => PlatformPreset::InstagramReels,
            PresetArg::InstagramPost => PlatformPreset::InstagramPost,
            PresetArg::Youtube => PlatformPreset::YouTube,
            PresetArg::YoutubeShorts => PlatformPreset::YouTubeShorts,
            PresetArg::Twitter => PlatformPreset::Twitter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    check_dependencies()?;

    match cli.command {
        Commands::Inspect { script } => inspect(script),
        Commands::Export {
            script,
            out,
            quality,
            format,
            fps,
            aspect,
            preset,
            reframe,
            scratch_dir,
        } => {
            let options = match preset {
                Some(p) => {
                    let preset = PlatformPreset::from(p);
                    tracing::info!(preset = preset.display_name(), "using platform preset");
                    ExportOptions {
                        format: format.into(),
                        ..preset.options()
                    }
                }
                None => ExportOptions {
                    quality: quality.into(),
                    format: format.into(),
                    aspect_ratio: aspect.map(Into::into),
                    frame_rate: fps.into(),
                },
            };
            export(script, out, options, reframe, scratch_dir).await
        }
        Commands::Strip {
            script,
            out_dir,
            count,
            width,
        } => strip(script, out_dir, count, width),
    }
}

fn check_dependencies() -> Result<()> {
    let deps = [
        ("ffmpeg", "video rendering/export"),
        ("ffprobe", "media file analysis"),
    ];

    let missing: Vec<_> = deps
        .iter()
        .filter(|(bin, _)| {
            std::process::Command::new(bin)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .is_err()
        })
        .collect();

    if !missing.is_empty() {
        for (bin, purpose) in &missing {
            tracing::error!(bin, purpose, "required binary not found on PATH");
        }
        bail!("missing required dependencies; install ffmpeg");
    }
    Ok(())
}

fn load(script: &Path) -> Result<(EditSession, ProbedSources)> {
    let script = EditScript::load(script)?;
    let sources = ProbedSources::probe_all(&FfprobeAccessor, &script)?;
    let session = build_session(&script, &sources)?;
    tracing::info!(
        clips = session.timeline().clips().len(),
        revision = session.timeline().revision(),
        "script applied"
    );
    Ok((session, sources))
}

fn inspect(script: PathBuf) -> Result<()> {
    let (mut session, _) = load(&script)?;
    let composition = session.composition()?;
    println!("{}", serde_json::to_string_pretty(&*composition)?);
    Ok(())
}

async fn export(
    script: PathBuf,
    out: PathBuf,
    options: ExportOptions,
    reframe: bool,
    scratch_dir: Option<PathBuf>,
) -> Result<()> {
    let (mut session, sources) = load(&script)?;

    if reframe {
        let target = options
            .aspect_ratio
            .unwrap_or(session.timeline().aspect_ratio());
        let requests: Vec<_> = session
            .timeline()
            .clips()
            .iter()
            .filter_map(|clip| {
                let info = sources.get(clip.source())?;
                Some(ReframeRequest::for_clip(clip, (info.width, info.height), target))
            })
            .collect();
        let cancel = ExportCancel::new();
        for request in &requests {
            let crop = auto_reframe(&CenterCropService, request, &cancel).await?;
            apply_reframe(&mut session, request.clip, crop)?;
        }
        tracing::info!(clips = requests.len(), ?target, "clips reframed");
    }

    let scratch_dir = scratch_dir.unwrap_or_else(std::env::temp_dir);
    let mut coordinator = ExportCoordinator::new(FfmpegBackend, scratch_dir);
    for source in sources.silent() {
        coordinator.mark_silent(source.clone());
    }

    let cancel = ExportCancel::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling export");
            canceller.cancel();
        }
    });

    let mut state_rx = coordinator.subscribe();
    tokio::spawn(async move {
        let mut last_logged = -10.0;
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            match state {
                ExportState::Exporting { percent } if percent - last_logged >= 10.0 => {
                    tracing::info!("export {:.0}%", percent);
                    last_logged = percent;
                }
                ExportState::Completed | ExportState::Failed(_) => break,
                _ => {}
            }
        }
    });

    let result = coordinator.export(&mut session, options, cancel).await?;
    let (width, height) = result.resolution;
    let duration = result.duration;
    let file_size = result.file_size;
    let saved = result
        .artifact
        .persist(&out)
        .with_context(|| format!("saving export to {}", out.display()))?;

    tracing::info!(
        path = %saved.display(),
        width,
        height,
        duration = %duration,
        file_size,
        "export saved"
    );
    Ok(())
}

fn strip(script: PathBuf, out_dir: PathBuf, count: usize, width: u32) -> Result<()> {
    let (session, _) = load(&script)?;
    let generator = FfmpegFrameGenerator::new(&out_dir);
    for clip in session.timeline().clips() {
        let frames = clip_strip(&generator, clip, count, width)
            .with_context(|| format!("extracting frames for clip {}", clip.id()))?;
        for (t, path) in frames {
            println!("{}\t{}\t{}", clip.id(), t, path.display());
        }
    }
    Ok(())
}
