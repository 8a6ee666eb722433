use serde::{Deserialize, Serialize};

use crate::clip::VideoClip;
use crate::overlay::Overlay;
use crate::transition::Transition;
use crate::types::*;

/// One editing session's sequence: clips in edit order, transitions between
/// neighbouring clips, overlays and picture-in-picture layers on the output
/// axis, and the output framing.
///
/// The timeline owns every clip. Callers address clips by [`ClipId`] and go
/// through the mutation methods in `editing.rs`, which keep trim ranges
/// valid and transitions bound to adjacent pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub(crate) clips: Vec<VideoClip>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) overlays: Vec<Overlay>,
    pub(crate) pip_clips: Vec<VideoClip>,
    pub(crate) aspect_ratio: AspectRatio,
    #[serde(skip)]
    pub(crate) revision: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aspect_ratio(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            ..Self::default()
        }
    }

    pub fn clips(&self) -> &[VideoClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clip(&self, id: ClipId) -> Option<&VideoClip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    pub fn index_of(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id() == id)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition_between(&self, from: ClipId, to: ClipId) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    pub fn pip_clips(&self) -> &[VideoClip] {
        &self.pip_clips
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// Bumped by every successful mutation. Compositions record the revision
    /// they were built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Sum of trimmed clip durations. Always recomputed.
    pub fn total_duration(&self) -> TimeUs {
        self.clips.iter().map(|c| c.duration()).sum()
    }

    /// Locate the clip covering `time` on the edit axis (trimmed source
    /// durations laid end to end). Returns the clip index and the offset
    /// into that clip. A time on a boundary belongs to the later clip.
    pub fn clip_at(&self, time: TimeUs) -> Option<(usize, TimeUs)> {
        if time < TimeUs::ZERO {
            return None;
        }
        let mut start = TimeUs::ZERO;
        for (i, clip) in self.clips.iter().enumerate() {
            let end = start + clip.duration();
            if time < end {
                return Some((i, time - start));
            }
            start = end;
        }
        None
    }

    /// Edit-axis start of a clip.
    pub fn clip_start(&self, id: ClipId) -> Option<TimeUs> {
        let idx = self.index_of(id)?;
        Some(self.clips[..idx].iter().map(|c| c.duration()).sum())
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
