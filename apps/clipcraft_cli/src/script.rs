//! Edit scripts: a JSON file naming the clips to load and the operations to
//! run on them.
//!
//! ```json
//! {
//!   "aspect_ratio": "vertical",
//!   "clips": [
//!     { "id": "6f1c1f5e-0000-4000-8000-000000000001", "source": "intro.mp4" },
//!     { "source": "broll.mp4", "pip": { "frame": {...}, "start": 0, "duration": 2000000 } }
//!   ],
//!   "operations": [
//!     { "op": "split", "at": 1500000 }
//!   ]
//! }
//! ```
//!
//! Clips are probed and appended in order; entries with `pip` become
//! picture-in-picture layers. Operations refer to clips by the ids given
//! here.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use clipcraft_core::{AspectRatio, ClipId, EditOperation, EditSession, PipPlacement, SourceRef};
use clipcraft_render::{clip_from_source, MediaSourceAccessor, RenderError, SourceInfo};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EditScript {
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    pub clips: Vec<ScriptClip>,
    #[serde(default)]
    pub operations: Vec<EditOperation>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptClip {
    #[serde(default)]
    pub id: Option<ClipId>,
    pub source: String,
    #[serde(default)]
    pub pip: Option<PipPlacement>,
}

impl EditScript {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))
    }

    /// Distinct sources in first-use order.
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut seen = Vec::new();
        for clip in &self.clips {
            let source = SourceRef::new(clip.source.as_str());
            if !seen.contains(&source) {
                seen.push(source);
            }
        }
        seen
    }
}

/// Probe results for every source a script uses, so each file is probed
/// once.
#[derive(Debug, Default)]
pub struct ProbedSources {
    infos: HashMap<SourceRef, SourceInfo>,
}

impl ProbedSources {
    pub fn probe_all(accessor: &impl MediaSourceAccessor, script: &EditScript) -> Result<Self> {
        let mut infos = HashMap::new();
        for source in script.sources() {
            let info = accessor
                .probe(&source)
                .with_context(|| format!("probing {source}"))?;
            tracing::info!(
                %source,
                duration = %info.duration,
                width = info.width,
                height = info.height,
                has_audio = info.has_audio,
                "probed source"
            );
            infos.insert(source, info);
        }
        Ok(Self { infos })
    }

    pub fn get(&self, source: &SourceRef) -> Option<&SourceInfo> {
        self.infos.get(source)
    }

    pub fn silent(&self) -> impl Iterator<Item = &SourceRef> {
        self.infos
            .iter()
            .filter(|(_, info)| !info.has_audio)
            .map(|(source, _)| source)
    }
}

impl MediaSourceAccessor for ProbedSources {
    fn probe(&self, source: &SourceRef) -> clipcraft_render::Result<SourceInfo> {
        self.infos
            .get(source)
            .cloned()
            .ok_or_else(|| RenderError::MissingSource(source.to_string()))
    }
}

/// Load the script's clips into a fresh session and run its operations.
/// Every step goes through undo history.
pub fn build_session(script: &EditScript, sources: &ProbedSources) -> Result<EditSession> {
    let mut session = EditSession::new(script.aspect_ratio);
    for entry in &script.clips {
        let mut clip = clip_from_source(sources, SourceRef::new(entry.source.as_str()))?;
        if let Some(id) = entry.id {
            clip = clip.with_id(id);
        }
        let op = match entry.pip {
            Some(placement) => EditOperation::AddPip { clip, placement },
            None => EditOperation::AddClip { clip },
        };
        session
            .apply(&op)
            .with_context(|| format!("adding clip {}", entry.source))?;
    }
    for (i, op) in script.operations.iter().enumerate() {
        session
            .apply(op)
            .with_context(|| format!("operation {i} ({})", op.description()))?;
        tracing::debug!(index = i, op = op.description(), "applied");
    }
    Ok(session)
}
