//! The edit vocabulary shared by the UI, scripted edits, and any external
//! command interpreter. Every operation maps onto exactly one `Timeline`
//! mutation.

use serde::{Deserialize, Serialize};

use crate::clip::{PipPlacement, VideoClip};
use crate::error::Result;
use crate::look::{BlendMode, ColorAdjustments, Filter};
use crate::overlay::Overlay;
use crate::timeline::Timeline;
use crate::transition::TransitionKind;
use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    AddClip {
        clip: VideoClip,
    },
    InsertClip {
        index: usize,
        clip: VideoClip,
    },
    AddPip {
        clip: VideoClip,
        placement: PipPlacement,
    },
    RemovePip {
        clip: ClipId,
    },
    Trim {
        start: Option<TimeUs>,
        end: Option<TimeUs>,
    },
    TrimClip {
        clip: ClipId,
        start: TimeUs,
        end: TimeUs,
    },
    Split {
        at: TimeUs,
    },
    SplitClip {
        clip: ClipId,
        offset: TimeUs,
    },
    Delete {
        clip: ClipId,
    },
    Move {
        from: usize,
        to: usize,
    },
    SetSpeed {
        clip: ClipId,
        speed: f64,
    },
    SetReversed {
        clip: ClipId,
        reversed: bool,
    },
    SetCrop {
        clip: ClipId,
        crop: Option<Rect>,
    },
    SetTransform {
        clip: ClipId,
        transform: Transform,
    },
    SetFilter {
        clip: ClipId,
        filter: Filter,
    },
    Adjust {
        clip: ClipId,
        adjustments: ColorAdjustments,
    },
    SetBlendMode {
        clip: ClipId,
        blend_mode: BlendMode,
    },
    SetVolume {
        clip: ClipId,
        volume: f64,
    },
    TrimAudio {
        clip: ClipId,
        range: Option<(TimeUs, TimeUs)>,
    },
    DeleteAudio {
        clip: ClipId,
    },
    AddTransition {
        from: ClipId,
        to: ClipId,
        kind: TransitionKind,
        duration: TimeUs,
    },
    RemoveTransition {
        transition: TransitionId,
    },
    AddOverlay {
        overlay: Overlay,
    },
    RemoveOverlay {
        overlay: OverlayId,
    },
    SetAspectRatio {
        aspect_ratio: AspectRatio,
    },
}

impl EditOperation {
    /// Short label for undo menus and logs.
    pub fn description(&self) -> &'static str {
        match self {
            EditOperation::AddClip { .. } | EditOperation::InsertClip { .. } => "Add clip",
            EditOperation::AddPip { .. } => "Add picture-in-picture",
            EditOperation::RemovePip { .. } => "Remove picture-in-picture",
            EditOperation::Trim { .. } => "Trim timeline",
            EditOperation::TrimClip { .. } => "Trim clip",
            EditOperation::Split { .. } | EditOperation::SplitClip { .. } => "Split clip",
            EditOperation::Delete { .. } => "Delete clip",
            EditOperation::Move { .. } => "Move clip",
            EditOperation::SetSpeed { .. } => "Change speed",
            EditOperation::SetReversed { .. } => "Reverse clip",
            EditOperation::SetCrop { .. } => "Crop clip",
            EditOperation::SetTransform { .. } => "Rotate clip",
            EditOperation::SetFilter { .. } => "Apply filter",
            EditOperation::Adjust { .. } => "Adjust color",
            EditOperation::SetBlendMode { .. } => "Change blend mode",
            EditOperation::SetVolume { .. } => "Change volume",
            EditOperation::TrimAudio { .. } => "Trim audio",
            EditOperation::DeleteAudio { .. } => "Delete audio",
            EditOperation::AddTransition { .. } => "Add transition",
            EditOperation::RemoveTransition { .. } => "Remove transition",
            EditOperation::AddOverlay { .. } => "Add overlay",
            EditOperation::RemoveOverlay { .. } => "Remove overlay",
            EditOperation::SetAspectRatio { .. } => "Change aspect ratio",
        }
    }
}

impl Timeline {
    pub fn apply(&mut self, op: &EditOperation) -> Result<()> {
        match op {
            EditOperation::AddClip { clip } => self.add_clip(clip.clone()).map(|_| ()),
            EditOperation::InsertClip { index, clip } => {
                self.insert_clip(*index, clip.clone()).map(|_| ())
            }
            EditOperation::AddPip { clip, placement } => {
                self.add_pip(clip.clone(), *placement).map(|_| ())
            }
            EditOperation::RemovePip { clip } => self.remove_pip(*clip).map(|_| ()),
            EditOperation::Trim { start, end } => self.trim(*start, *end),
            EditOperation::TrimClip { clip, start, end } => self.trim_clip(*clip, *start, *end),
            EditOperation::Split { at } => self.split(*at).map(|_| ()),
            EditOperation::SplitClip { clip, offset } => {
                self.split_clip(*clip, *offset).map(|_| ())
            }
            EditOperation::Delete { clip } => self.delete(*clip).map(|_| ()),
            EditOperation::Move { from, to } => self.move_clip(*from, *to),
            EditOperation::SetSpeed { clip, speed } => self.set_speed(*clip, *speed),
            EditOperation::SetReversed { clip, reversed } => self.set_reversed(*clip, *reversed),
            EditOperation::SetCrop { clip, crop } => self.set_crop(*clip, *crop),
            EditOperation::SetTransform { clip, transform } => {
                self.set_transform(*clip, *transform)
            }
            EditOperation::SetFilter { clip, filter } => self.set_filter(*clip, *filter),
            EditOperation::Adjust { clip, adjustments } => {
                self.set_adjustments(*clip, *adjustments)
            }
            EditOperation::SetBlendMode { clip, blend_mode } => {
                self.set_blend_mode(*clip, *blend_mode)
            }
            EditOperation::SetVolume { clip, volume } => self.set_volume(*clip, *volume),
            EditOperation::TrimAudio { clip, range } => self.trim_audio(*clip, *range),
            EditOperation::DeleteAudio { clip } => self.delete_audio(*clip),
            EditOperation::AddTransition {
                from,
                to,
                kind,
                duration,
            } => self.add_transition(*kind, *from, *to, *duration).map(|_| ()),
            EditOperation::RemoveTransition { transition } => {
                self.remove_transition(*transition).map(|_| ())
            }
            EditOperation::AddOverlay { overlay } => self.add_overlay(overlay.clone()).map(|_| ()),
            EditOperation::RemoveOverlay { overlay } => self.remove_overlay(*overlay).map(|_| ()),
            EditOperation::SetAspectRatio { aspect_ratio } => {
                self.set_aspect_ratio(*aspect_ratio);
                Ok(())
            }
        }
    }

    /// Apply operations in order. If any fails the timeline is left exactly
    /// as it was and the error of the failing operation is returned.
    pub fn apply_batch(&mut self, ops: &[EditOperation]) -> Result<()> {
        let mut draft = self.clone();
        for (i, op) in ops.iter().enumerate() {
            if let Err(e) = draft.apply(op) {
                tracing::warn!(index = i, op = op.description(), error = %e, "batch rejected");
                return Err(e);
            }
        }
        *self = draft;
        Ok(())
    }
}
