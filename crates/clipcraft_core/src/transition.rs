use serde::{Deserialize, Serialize};

use crate::error::{invalid_range, Result};
use crate::types::{ClipId, TimeUs, TransitionId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    Wipe,
    Zoom,
}

/// An effect bound to the boundary between two clips.
///
/// Keyed by the ids of both clips rather than by position, so reordering
/// cannot silently re-target it. The timeline drops or re-keys it whenever
/// `from` and `to` stop being neighbours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    pub kind: TransitionKind,
    pub duration: TimeUs,
    pub from: ClipId,
    pub to: ClipId,
}

impl Transition {
    pub fn new(kind: TransitionKind, from: ClipId, to: ClipId, duration: TimeUs) -> Result<Self> {
        if duration <= TimeUs::ZERO {
            return Err(invalid_range(format!(
                "transition duration {duration} must be positive"
            )));
        }
        Ok(Self {
            id: TransitionId::new(),
            kind,
            duration,
            from,
            to,
        })
    }

    pub fn touches(&self, clip: ClipId) -> bool {
        self.from == clip || self.to == clip
    }
}
