use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use clipcraft_core::{SourceRef, TimeUs, VideoClip};

use crate::error::{RenderError, Result};

/// Produces still frames for clip strips and scrubbing.
pub trait FrameGenerator {
    /// Path to an image of `source` at source time `at`, `width` pixels wide.
    fn frame(&self, source: &SourceRef, at: TimeUs, width: u32) -> Result<PathBuf>;
}

/// Extracts frames with `ffmpeg` and caches them under `cache_dir`.
#[derive(Debug, Clone)]
pub struct FfmpegFrameGenerator {
    cache_dir: PathBuf,
}

impl FfmpegFrameGenerator {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn cache_path(&self, source: &SourceRef, at: TimeUs, width: u32) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        self.cache_dir
            .join(format!("{:016x}", hasher.finish()))
            .join(format!("{}_{width}.jpg", at.0))
    }
}

impl FrameGenerator for FfmpegFrameGenerator {
    fn frame(&self, source: &SourceRef, at: TimeUs, width: u32) -> Result<PathBuf> {
        let source_path = Path::new(source.as_str());
        if !source_path.exists() {
            return Err(RenderError::MissingSource(source.to_string()));
        }
        let output_path = self.cache_path(source, at, width);
        if !output_path.exists() {
            extract_thumbnail(source_path, &output_path, at.as_seconds(), width)?;
        }
        Ok(output_path)
    }
}

/// Extract a single thumbnail at a specific time from a video file.
pub fn extract_thumbnail(
    source_path: &Path,
    output_path: &Path,
    time_seconds: f64,
    width: u32,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let status = std::process::Command::new("ffmpeg")
        .args([
            "-y",
            "-ss",
            &format!("{time_seconds:.3}"),
            "-i",
            &source_path.to_string_lossy(),
            "-vframes",
            "1",
            "-vf",
            &format!("scale={width}:-2"),
            "-q:v",
            "5",
            &output_path.to_string_lossy(),
        ])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    if !status.success() {
        return Err(RenderError::ExportFailed(format!(
            "frame extraction at {time_seconds:.3}s failed with {status}"
        )));
    }
    Ok(())
}

/// `count` evenly spaced source timestamps across a clip's trimmed range,
/// each at the centre of its slot, listed in playback order.
pub fn clip_strip_times(clip: &VideoClip, count: usize) -> Vec<TimeUs> {
    if count == 0 {
        return Vec::new();
    }
    let start = clip.trim_start().0 as i128;
    let dur = clip.duration().0 as i128;
    let n = count as i128;
    let mut times: Vec<TimeUs> = (0..n)
        .map(|i| TimeUs((start + dur * (2 * i + 1) / (2 * n)) as i64))
        .collect();
    if clip.is_reversed() {
        times.reverse();
    }
    times
}

/// Generate the frames for a clip strip.
pub fn clip_strip(
    generator: &impl FrameGenerator,
    clip: &VideoClip,
    count: usize,
    width: u32,
) -> Result<Vec<(TimeUs, PathBuf)>> {
    clip_strip_times(clip, count)
        .into_iter()
        .map(|t| generator.frame(clip.source(), t, width).map(|p| (t, p)))
        .collect()
}
