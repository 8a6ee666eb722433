use thiserror::Error;

use clipcraft_core::CoreError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no composition: timeline has no clips")]
    NoComposition,

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("missing source: {0}")]
    MissingSource(String),

    #[error("an export is already in progress")]
    ExportInProgress,

    #[error("export cancelled")]
    Cancelled,

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("failed to execute ffprobe: {0}")]
    FfprobeExec(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
