use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clipcraft_core::{Composition, CoreError, EditSession, SourceRef, TimeUs};
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tokio::sync::watch;

use crate::backend::{ExportCancel, RenderBackend, RenderJob, RenderProgress};
use crate::error::{RenderError, Result};
use crate::options::{ExportFormat, ExportOptions};
use crate::share::{ShareSink, ShareTarget};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportState {
    Idle,
    Building,
    Exporting { percent: f64 },
    Completed,
    Failed(String),
}

// ---------------------------------------------------------------------------
// Scratch artifacts
// ---------------------------------------------------------------------------

/// A rendered file in the scratch directory. Deleted on drop unless
/// [`ExportArtifact::persist`] moved it somewhere permanent.
#[derive(Debug)]
pub struct ExportArtifact {
    path: TempPath,
}

impl ExportArtifact {
    pub fn create_in(dir: &Path, format: ExportFormat) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = tempfile::Builder::new()
            .prefix("clipcraft-export-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(dir)?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Move the file to `dest`, falling back to copy-and-delete when `dest`
    /// is on another filesystem.
    pub fn persist(self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match self.path.persist(dest) {
            Ok(()) => {}
            Err(e) => {
                std::fs::copy(&e.path, dest)?;
                e.path.close()?;
            }
        }
        tracing::debug!(dest = %dest.display(), "export artifact persisted");
        Ok(dest.to_path_buf())
    }

    /// Delete the file now and report any error.
    pub fn release(self) -> Result<()> {
        self.path.close()?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct ExportResult {
    pub artifact: ExportArtifact,
    pub duration: TimeUs,
    pub file_size: u64,
    pub resolution: (u32, u32),
}

impl ExportResult {
    pub fn output_location(&self) -> &Path {
        self.artifact.path()
    }
}

// ---------------------------------------------------------------------------
// ExportCoordinator
// ---------------------------------------------------------------------------

/// Maps export options onto a render backend and shapes the result.
///
/// One export runs at a time; a second request while one is in flight fails
/// with [`RenderError::ExportInProgress`]. State changes are published on a
/// watch channel.
pub struct ExportCoordinator<B> {
    backend: B,
    scratch_dir: PathBuf,
    silent_sources: HashSet<SourceRef>,
    state: watch::Sender<ExportState>,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: RenderBackend> ExportCoordinator<B> {
    pub fn new(backend: B, scratch_dir: impl Into<PathBuf>) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        Self {
            backend,
            scratch_dir: scratch_dir.into(),
            silent_sources: HashSet::new(),
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Record a source with no audio stream so its segments render silence.
    pub fn mark_silent(&mut self, source: SourceRef) {
        self.silent_sources.insert(source);
    }

    pub fn subscribe(&self) -> watch::Receiver<ExportState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ExportState {
        self.state.borrow().clone()
    }

    pub fn is_exporting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Export the session's current composition, building it first if the
    /// timeline changed since the last build.
    ///
    /// The build happens before this returns; the returned future holds no
    /// borrow of `session`, so editing can continue while it renders.
    pub fn export<'a>(
        &'a self,
        session: &mut EditSession,
        options: ExportOptions,
        cancel: ExportCancel,
    ) -> impl Future<Output = Result<ExportResult>> + 'a {
        let prepared = self.prepare(session);
        async move {
            let (guard, composition) = prepared?;
            self.run(guard, composition, options, cancel).await
        }
    }

    /// Export an already built composition.
    pub async fn export_composition(
        &self,
        composition: Arc<Composition>,
        options: ExportOptions,
        cancel: ExportCancel,
    ) -> Result<ExportResult> {
        let guard = self.begin()?;
        self.run(guard, composition, options, cancel).await
    }

    /// Hand a finished export to a sink. The scratch file is gone afterwards
    /// whether or not delivery succeeded.
    pub fn share(
        &self,
        result: ExportResult,
        sink: &impl ShareSink,
        target: ShareTarget,
    ) -> Result<PathBuf> {
        let delivered = sink.deliver(result.artifact, target)?;
        tracing::info!(?target, location = %delivered.display(), "export shared");
        Ok(delivered)
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("export rejected: another export is in flight");
            return Err(RenderError::ExportInProgress);
        }
        Ok(InFlight(&self.in_flight))
    }

    fn prepare(&self, session: &mut EditSession) -> Result<(InFlight<'_>, Arc<Composition>)> {
        let guard = self.begin()?;
        self.state.send_replace(ExportState::Building);
        match session.composition() {
            Ok(composition) => Ok((guard, composition)),
            Err(e) => {
                let e = match e {
                    CoreError::EmptyTimeline => RenderError::NoComposition,
                    other => RenderError::Core(other),
                };
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        _guard: InFlight<'_>,
        composition: Arc<Composition>,
        options: ExportOptions,
        cancel: ExportCancel,
    ) -> Result<ExportResult> {
        let result = self.render(composition, options, cancel).await;
        match &result {
            Ok(r) => {
                tracing::info!(
                    file_size = r.file_size,
                    width = r.resolution.0,
                    height = r.resolution.1,
                    "export completed"
                );
                self.state.send_replace(ExportState::Completed);
            }
            Err(e) => self.fail(e),
        }
        result
    }

    async fn render(
        &self,
        composition: Arc<Composition>,
        options: ExportOptions,
        cancel: ExportCancel,
    ) -> Result<ExportResult> {
        let params = options.resolve(composition.aspect_ratio);
        let artifact = ExportArtifact::create_in(&self.scratch_dir, params.format)?;
        let job = RenderJob {
            composition: Arc::clone(&composition),
            params,
            output: artifact.path().to_path_buf(),
            silent_sources: self.silent_sources.clone(),
        };

        tracing::info!(
            width = params.width,
            height = params.height,
            fps = params.fps,
            duration = %composition.duration,
            revision = composition.revision,
            "export started"
        );
        self.state
            .send_replace(ExportState::Exporting { percent: 0.0 });

        let (progress_tx, mut progress_rx) = watch::channel(RenderProgress::default());
        let forward = async {
            while progress_rx.changed().await.is_ok() {
                let percent = progress_rx.borrow_and_update().percent;
                self.state.send_replace(ExportState::Exporting { percent });
            }
        };
        let (rendered, ()) = tokio::join!(self.backend.render(&job, progress_tx, cancel), forward);
        rendered.map_err(|e| match e {
            RenderError::Cancelled | RenderError::MissingSource(_) | RenderError::ExportFailed(_) => e,
            other => RenderError::ExportFailed(other.to_string()),
        })?;

        let file_size = artifact.file_size()?;
        if file_size == 0 {
            return Err(RenderError::ExportFailed(
                "render produced an empty file".into(),
            ));
        }

        Ok(ExportResult {
            artifact,
            duration: composition.duration,
            file_size,
            resolution: (params.width, params.height),
        })
    }

    fn fail(&self, e: &RenderError) {
        tracing::warn!(error = %e, "export failed");
        self.state.send_replace(ExportState::Failed(e.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
