use serde::{Deserialize, Serialize};

use crate::error::{invalid_range, Result};
use crate::types::{OverlayId, Point, SourceRef, TimeUs};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayContent {
    Text {
        text: String,
        font_size: u32,
        /// `#rrggbb`
        color: String,
    },
    Sticker {
        source: SourceRef,
        /// Fraction of the output frame width the sticker occupies.
        scale: f64,
    },
    Emoji {
        glyph: String,
        font_size: u32,
    },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    Top,
    #[default]
    Center,
    Bottom,
    Custom(Point),
}

impl OverlayPosition {
    /// Anchor point in normalized frame coordinates.
    pub fn anchor(&self) -> Point {
        match self {
            OverlayPosition::Top => Point { x: 0.5, y: 0.1 },
            OverlayPosition::Center => Point { x: 0.5, y: 0.5 },
            OverlayPosition::Bottom => Point { x: 0.5, y: 0.9 },
            OverlayPosition::Custom(p) => *p,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OverlayAnimation {
    #[default]
    None,
    FadeIn,
    FadeOut,
    FadeInOut,
    SlideUp,
    Pop,
    Bounce,
}

/// A time-scoped annotation on the output time axis, independent of clip
/// boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Overlay {
    pub id: OverlayId,
    pub content: OverlayContent,
    pub position: OverlayPosition,
    pub start: TimeUs,
    pub duration: TimeUs,
    pub animation: OverlayAnimation,
}

impl Overlay {
    pub fn new(content: OverlayContent, start: TimeUs, duration: TimeUs) -> Result<Self> {
        let overlay = Self {
            id: OverlayId::new(),
            content,
            position: OverlayPosition::default(),
            start,
            duration,
            animation: OverlayAnimation::default(),
        };
        overlay.validate()?;
        Ok(overlay)
    }

    pub fn text(text: impl Into<String>, start: TimeUs, duration: TimeUs) -> Result<Self> {
        Self::new(
            OverlayContent::Text {
                text: text.into(),
                font_size: 48,
                color: "#ffffff".to_string(),
            },
            start,
            duration,
        )
    }

    pub fn with_position(mut self, position: OverlayPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_animation(mut self, animation: OverlayAnimation) -> Self {
        self.animation = animation;
        self
    }

    pub fn end(&self) -> TimeUs {
        self.start + self.duration
    }

    pub fn is_active_at(&self, t: TimeUs) -> bool {
        t >= self.start && t < self.end()
    }

    pub fn validate(&self) -> Result<()> {
        if self.start < TimeUs::ZERO {
            return Err(invalid_range(format!(
                "overlay start {} is negative",
                self.start
            )));
        }
        if self.duration <= TimeUs::ZERO {
            return Err(invalid_range(format!(
                "overlay duration {} must be positive",
                self.duration
            )));
        }
        if let OverlayPosition::Custom(p) = &self.position {
            p.validate()?;
        }
        match &self.content {
            OverlayContent::Text { font_size, .. } | OverlayContent::Emoji { font_size, .. }
                if *font_size == 0 =>
            {
                Err(invalid_range("overlay font size must be positive"))
            }
            OverlayContent::Sticker { scale, .. } if !(*scale > 0.0 && *scale <= 1.0) => Err(
                invalid_range(format!("sticker scale {scale} outside (0, 1]")),
            ),
            _ => Ok(()),
        }
    }
}
