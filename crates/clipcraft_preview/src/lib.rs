pub mod error;
pub mod player;

pub use error::{PreviewError, Result};
pub use player::{PreviewFrame, PreviewPlayer};
