use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipcraft_core::{Composition, SourceRef, TimeUs};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use crate::error::{RenderError, Result};
use crate::options::ExportParams;
use crate::plan::{build_ffmpeg_args, compile};

/// Everything a backend needs to render one export.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub composition: Arc<Composition>,
    pub params: ExportParams,
    pub output: PathBuf,
    /// Sources known to carry no audio stream; their segments get silence.
    pub silent_sources: HashSet<SourceRef>,
}

/// Progress update during rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderProgress {
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

/// Handle for cancelling a running export or service call.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a [`RenderJob`] into an encoded file at `job.output`.
///
/// Implementations report progress on `progress` and must give up with
/// [`RenderError::Cancelled`] once `cancel` fires.
pub trait RenderBackend: Send + Sync {
    fn render(
        &self,
        job: &RenderJob,
        progress: watch::Sender<RenderProgress>,
        cancel: ExportCancel,
    ) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// ffmpeg
// ---------------------------------------------------------------------------

const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Renders by spawning `ffmpeg` from `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl RenderBackend for FfmpegBackend {
    async fn render(
        &self,
        job: &RenderJob,
        progress: watch::Sender<RenderProgress>,
        cancel: ExportCancel,
    ) -> Result<()> {
        let pip_segments = job.composition.pip.iter().map(|layer| &layer.segment);
        for segment in job.composition.segments.iter().chain(pip_segments) {
            if !Path::new(segment.source.as_str()).exists() {
                return Err(RenderError::MissingSource(segment.source.to_string()));
            }
        }

        let plan = compile(job)?;
        let args = build_ffmpeg_args(&plan);
        tracing::debug!(inputs = plan.inputs.len(), output = %plan.output_path.display(), "spawning ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::FfmpegNotFound
                } else {
                    RenderError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::ExportFailed("ffmpeg stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::ExportFailed("ffmpeg stderr unavailable".into()))?;
        let mut progress_lines = BufReader::new(stdout).lines();
        let mut log_lines = BufReader::new(stderr).lines();
        let (mut progress_open, mut log_open) = (true, true);
        let mut stream = ProgressStream::new(job.composition.duration);
        let mut last_message = String::new();
        let mut ticker = tokio::time::interval(CANCEL_POLL);

        while progress_open || log_open {
            tokio::select! {
                line = progress_lines.next_line(), if progress_open => match line? {
                    Some(line) => {
                        if let Some(p) = stream.feed(&line) {
                            let _ = progress.send(p);
                        }
                    }
                    None => progress_open = false,
                },
                line = log_lines.next_line(), if log_open => match line? {
                    Some(line) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            last_message = line.to_string();
                        }
                    }
                    None => log_open = false,
                },
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        tracing::info!("cancelling ffmpeg");
                        let _ = child.kill().await;
                        return Err(RenderError::Cancelled);
                    }
                }
            }
        }

        let status = child.wait().await?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        if !status.success() {
            return Err(RenderError::ExportFailed(format!(
                "ffmpeg exited with {status}: {last_message}"
            )));
        }
        Ok(())
    }
}

/// Folds ffmpeg's `-progress` output into [`RenderProgress`] updates.
///
/// ffmpeg writes one `key=value` per line and closes each block with
/// `progress=continue`, or `progress=end` once encoding finishes. Values
/// are `N/A` until the first frame is out.
#[derive(Debug, Clone)]
pub struct ProgressStream {
    total: TimeUs,
    frame: u64,
    fps: f64,
    out_time: TimeUs,
    speed: String,
}

impl ProgressStream {
    pub fn new(total: TimeUs) -> Self {
        Self {
            total,
            frame: 0,
            fps: 0.0,
            out_time: TimeUs::ZERO,
            speed: String::new(),
        }
    }

    /// Take one line; returns an update when it closes a block.
    pub fn feed(&mut self, line: &str) -> Option<RenderProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            "frame" => self.frame = value.parse().unwrap_or(self.frame),
            "fps" => self.fps = value.parse().unwrap_or(self.fps),
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time = TimeUs(us.max(0));
                }
            }
            "speed" => self.speed = value.to_string(),
            "progress" => return Some(self.snapshot(value == "end")),
            _ => {}
        }
        None
    }

    fn snapshot(&self, finished: bool) -> RenderProgress {
        let total_secs = self.total.as_seconds();
        let done_secs = self.out_time.as_seconds();
        let percent = if finished {
            100.0
        } else if total_secs > 0.0 {
            (done_secs / total_secs * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let factor = self
            .speed
            .trim_end_matches('x')
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0);
        let eta_seconds = if finished {
            Some(0.0)
        } else if factor > 0.0 && total_secs > done_secs {
            Some((total_secs - done_secs) / factor)
        } else {
            None
        };

        RenderProgress {
            percent,
            frame: self.frame,
            fps: self.fps,
            speed: self.speed.clone(),
            eta_seconds,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clipcraft_core::{CompositionBuilder, Timeline, VideoClip};

    use crate::options::preset_1080p;

    fn job_with_missing_source() -> RenderJob {
        let mut tl = Timeline::new();
        tl.add_clip(
            VideoClip::new(
                SourceRef::new("/tmp/clipcraft_backend_missing.mp4"),
                TimeUs::from_seconds(2.0),
            )
            .unwrap(),
        )
        .unwrap();
        RenderJob {
            composition: Arc::new(CompositionBuilder::build(&tl).unwrap()),
            params: preset_1080p().resolve(tl.aspect_ratio()),
            output: PathBuf::from("/tmp/clipcraft_backend_out.mp4"),
            silent_sources: HashSet::new(),
        }
    }

    #[test]
    fn cancel_flag() {
        let cancel = ExportCancel::new();
        let other = cancel.clone();
        assert!(!cancel.is_cancelled());
        other.cancel();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn ffmpeg_backend_reports_missing_source() {
        let (tx, _rx) = watch::channel(RenderProgress::default());
        let result = FfmpegBackend
            .render(&job_with_missing_source(), tx, ExportCancel::new())
            .await;
        assert!(matches!(result, Err(RenderError::MissingSource(_))));
    }

    fn feed_all(stream: &mut ProgressStream, block: &str) -> Vec<RenderProgress> {
        block.lines().filter_map(|l| stream.feed(l)).collect()
    }

    #[test]
    fn progress_block_reports_percent_and_eta() {
        let mut stream = ProgressStream::new(TimeUs::from_seconds(10.0));
        let updates = feed_all(
            &mut stream,
            "frame=150\nfps=30.00\nbitrate= 200.0kbits/s\nout_time_us=5000000\n\
             out_time=00:00:05.000000\nspeed=1.5x\nprogress=continue",
        );
        assert_eq!(updates.len(), 1);
        let p = &updates[0];
        assert_eq!(p.frame, 150);
        assert!((p.fps - 30.0).abs() < 0.01);
        assert!((p.percent - 50.0).abs() < 0.1);
        assert_eq!(p.speed, "1.5x");
        // (10 - 5) / 1.5
        assert!((p.eta_seconds.unwrap() - 3.33).abs() < 0.1);
    }

    #[test]
    fn values_carry_until_the_next_block() {
        let mut stream = ProgressStream::new(TimeUs::from_seconds(4.0));
        assert!(stream.feed("frame=10").is_none());
        assert!(stream.feed("out_time_us=1000000").is_none());
        let first = stream.feed("progress=continue").unwrap();
        assert!((first.percent - 25.0).abs() < 0.1);

        stream.feed("frame=20");
        let second = stream.feed("progress=continue").unwrap();
        assert_eq!(second.frame, 20);
        assert!((second.percent - 25.0).abs() < 0.1);
    }

    #[test]
    fn block_before_first_frame_has_no_eta() {
        let mut stream = ProgressStream::new(TimeUs::from_seconds(10.0));
        let updates = feed_all(
            &mut stream,
            "frame=0\nfps=0.00\nout_time_us=N/A\nspeed=N/A\nprogress=continue",
        );
        assert_eq!(updates[0].percent, 0.0);
        assert!(updates[0].eta_seconds.is_none());
    }

    #[test]
    fn end_block_completes() {
        let mut stream = ProgressStream::new(TimeUs::from_seconds(10.0));
        let updates = feed_all(
            &mut stream,
            "out_time_us=9966667\nspeed=2.01x\nprogress=end",
        );
        assert_eq!(updates[0].percent, 100.0);
        assert_eq!(updates[0].eta_seconds, Some(0.0));
    }

    #[test]
    fn zero_total_duration_stays_at_zero() {
        let mut stream = ProgressStream::new(TimeUs::ZERO);
        let updates = feed_all(&mut stream, "out_time_us=1000000\nprogress=continue");
        assert_eq!(updates[0].percent, 0.0);
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let mut stream = ProgressStream::new(TimeUs::from_seconds(10.0));
        assert!(stream.feed("").is_none());
        assert!(stream.feed("Input #0, mov,mp4").is_none());
        assert!(stream.feed("stream_0_0_q=28.0").is_none());
    }
}
