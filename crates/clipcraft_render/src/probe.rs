use std::path::Path;

use clipcraft_core::{SourceRef, TimeUs, VideoClip};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// What the editor needs to know about a source before it can be clipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub duration: TimeUs,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
}

/// Resolves a [`SourceRef`] into playable media metadata.
pub trait MediaSourceAccessor {
    fn probe(&self, source: &SourceRef) -> Result<SourceInfo>;
}

/// Accessor backed by `ffprobe` on `PATH`. Source references are file paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeAccessor;

impl MediaSourceAccessor for FfprobeAccessor {
    fn probe(&self, source: &SourceRef) -> Result<SourceInfo> {
        let path = Path::new(source.as_str());
        if !path.exists() {
            return Err(RenderError::MissingSource(source.to_string()));
        }

        let output = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::FfprobeFailed(stderr.into_owned()));
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        let info = parse_probe_output(&probe)
            .ok_or_else(|| RenderError::MissingSource(format!("{source}: no video stream")))?;
        tracing::debug!(%source, duration = %info.duration, "probed source");
        Ok(info)
    }
}

/// Probe a source and build a clip covering all of it.
pub fn clip_from_source(
    accessor: &impl MediaSourceAccessor,
    source: SourceRef,
) -> Result<VideoClip> {
    let info = accessor.probe(&source)?;
    if info.duration <= TimeUs::ZERO {
        return Err(RenderError::MissingSource(format!(
            "{source}: no playable duration"
        )));
    }
    Ok(VideoClip::new(source, info.duration)?)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `None` when the file has no video stream.
fn parse_probe_output(probe: &FfprobeOutput) -> Option<SourceInfo> {
    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video")?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_deref()
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .map(TimeUs::from_seconds)
        .unwrap_or(TimeUs::ZERO);

    let fps = video_stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Some(SourceInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        has_audio,
    })
}

/// Parse ffprobe frame rate string like "30000/1001" or "30/1" into f64.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d == 0.0 {
            return None;
        }
        Some(n / d)
    } else {
        rate.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
