use thiserror::Error;

use crate::types::{ClipId, OverlayId, TransitionId};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(ClipId),

    #[error("Transition not found: {0}")]
    TransitionNotFound(TransitionId),

    #[error("Overlay not found: {0}")]
    OverlayNotFound(OverlayId),

    #[error("Clips {0} and {1} are not adjacent")]
    NotAdjacent(ClipId, ClipId),

    #[error("Timeline has no clips")]
    EmptyTimeline,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Shorthand for building an `InvalidRange` error.
pub(crate) fn invalid_range(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidRange(msg.into())
}
