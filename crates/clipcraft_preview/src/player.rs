use std::sync::Arc;

use clipcraft_core::{
    ClipId, Composition, Overlay, PipLayer, SourceRef, TimeUs, TransitionKind,
};
use serde::Serialize;

use crate::error::{PreviewError, Result};

/// Everything a renderer needs to draw the output at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewFrame {
    pub playhead: TimeUs,
    pub segment_index: usize,
    pub clip_id: ClipId,
    pub source: SourceRef,
    pub source_time: TimeUs,
    /// Transition covering the playhead and its progress in `[0, 1]`.
    pub transition: Option<(TransitionKind, f64)>,
    pub overlays: Vec<Overlay>,
    pub pip: Vec<PipLayer>,
}

/// Playhead over an immutable composition.
///
/// The composition is shared with the editor; edits produce a new one which
/// is swapped in with [`PreviewPlayer::replace_composition`].
#[derive(Debug, Clone)]
pub struct PreviewPlayer {
    composition: Arc<Composition>,
    playhead: TimeUs,
    playing: bool,
}

impl PreviewPlayer {
    pub fn new(composition: Arc<Composition>) -> Self {
        Self {
            composition,
            playhead: TimeUs::ZERO,
            playing: false,
        }
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    pub fn playhead(&self) -> TimeUs {
        self.playhead
    }

    pub fn duration(&self) -> TimeUs {
        self.composition.duration
    }

    pub fn is_finished(&self) -> bool {
        self.playhead >= self.composition.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start playback, rewinding first if the playhead sits at the end.
    pub fn play(&mut self) {
        if self.is_finished() {
            self.playhead = TimeUs::ZERO;
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Negative times are rejected; times past the end clamp to the end.
    pub fn seek(&mut self, t: TimeUs) -> Result<()> {
        if t < TimeUs::ZERO {
            return Err(PreviewError::OutOfRange(t));
        }
        self.playhead = t.min(self.composition.duration);
        Ok(())
    }

    /// Move the playhead by `delta`, clamped to the composition.
    pub fn advance(&mut self, delta: TimeUs) -> TimeUs {
        self.playhead = (self.playhead + delta)
            .max(TimeUs::ZERO)
            .min(self.composition.duration);
        self.playhead
    }

    /// Advance by wall-clock `elapsed` while playing. Playback stops at the
    /// end of the composition.
    pub fn tick(&mut self, elapsed: TimeUs) -> TimeUs {
        if !self.playing {
            return self.playhead;
        }
        self.advance(elapsed);
        if self.is_finished() {
            self.playing = false;
            tracing::debug!(playhead = %self.playhead, "preview reached end");
        }
        self.playhead
    }

    pub fn frame(&self) -> Result<PreviewFrame> {
        self.frame_at(self.playhead)
    }

    pub fn frame_at(&self, t: TimeUs) -> Result<PreviewFrame> {
        let comp = &self.composition;
        let (segment_index, segment) = comp.segment_at(t).ok_or(PreviewError::OutOfRange(t))?;
        Ok(PreviewFrame {
            playhead: t,
            segment_index,
            clip_id: segment.clip_id,
            source: segment.source.clone(),
            source_time: segment.source_time_at(t),
            transition: comp.transition_at(t).map(|(tr, p)| (tr.kind, p)),
            overlays: comp.overlays_at(t).cloned().collect(),
            pip: comp.pip_at(t).cloned().collect(),
        })
    }

    /// Swap in a rebuilt composition, keeping the playhead where it was
    /// unless the new composition is shorter.
    pub fn replace_composition(&mut self, composition: Arc<Composition>) {
        tracing::debug!(
            old_revision = self.composition.revision,
            new_revision = composition.revision,
            "preview composition replaced"
        );
        self.playhead = self.playhead.min(composition.duration);
        self.composition = composition;
        if self.is_finished() {
            self.playing = false;
        }
    }
}
