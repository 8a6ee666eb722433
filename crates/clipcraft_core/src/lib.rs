pub mod clip;
pub mod composition;
pub mod edit;
pub mod editing;
pub mod error;
pub mod history;
pub mod look;
pub mod overlay;
pub mod session;
pub mod snapping;
pub mod timeline;
pub mod transition;
pub mod types;

pub use clip::{AudioSettings, PipPlacement, VideoClip, MAX_SPEED, MAX_VOLUME, MIN_SPEED};
pub use composition::{
    Composition, CompositionBuilder, CompositionCache, CompositionTransition, PipLayer, Segment,
};
pub use edit::EditOperation;
pub use error::{CoreError, Result};
pub use history::History;
pub use look::{BlendMode, ColorAdjustments, Filter, Look};
pub use overlay::{Overlay, OverlayAnimation, OverlayContent, OverlayPosition};
pub use session::EditSession;
pub use timeline::Timeline;
pub use transition::{Transition, TransitionKind};
pub use types::*;
