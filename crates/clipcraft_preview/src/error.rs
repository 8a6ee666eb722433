use clipcraft_core::TimeUs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Playhead {0} is outside the composition")]
    OutOfRange(TimeUs),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
