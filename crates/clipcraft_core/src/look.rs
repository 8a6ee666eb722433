use serde::{Deserialize, Serialize};

use crate::error::{invalid_range, Result};

/// Named colour look applied to a clip.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    None,
    Mono,
    Sepia,
    Noir,
    Vivid,
    Fade,
    Chrome,
    Warm,
    Cool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Add,
}

/// Per-clip colour corrections. Neutral values leave the image untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ColorAdjustments {
    /// `-1.0..=1.0`, neutral `0.0`
    pub brightness: f64,
    /// `0.0..=2.0`, neutral `1.0`
    pub contrast: f64,
    /// `0.0..=2.0`, neutral `1.0`
    pub saturation: f64,
    /// `-1.0..=1.0` from cool to warm, neutral `0.0`
    pub temperature: f64,
}

impl ColorAdjustments {
    pub const BRIGHTNESS_RANGE: (f64, f64) = (-1.0, 1.0);
    pub const CONTRAST_RANGE: (f64, f64) = (0.0, 2.0);
    pub const SATURATION_RANGE: (f64, f64) = (0.0, 2.0);
    pub const TEMPERATURE_RANGE: (f64, f64) = (-1.0, 1.0);

    pub fn validate(&self) -> Result<()> {
        check("brightness", self.brightness, Self::BRIGHTNESS_RANGE)?;
        check("contrast", self.contrast, Self::CONTRAST_RANGE)?;
        check("saturation", self.saturation, Self::SATURATION_RANGE)?;
        check("temperature", self.temperature, Self::TEMPERATURE_RANGE)?;
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for ColorAdjustments {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            temperature: 0.0,
        }
    }
}

fn check(name: &str, value: f64, (lo, hi): (f64, f64)) -> Result<()> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(())
    } else {
        Err(invalid_range(format!(
            "{name} {value} outside [{lo}, {hi}]"
        )))
    }
}

/// Everything that determines how a segment's pixels are graded and
/// composited. Built fresh for every composition; renderers treat it as a
/// plain parameter set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Look {
    pub filter: Filter,
    pub adjustments: ColorAdjustments,
    pub blend_mode: BlendMode,
}

impl Look {
    pub fn is_neutral(&self) -> bool {
        self.filter == Filter::None && self.adjustments.is_identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn default_adjustments_are_identity() {
        let adj = ColorAdjustments::default();
        assert!(adj.is_identity());
        assert!(adj.validate().is_ok());
    }

    #[test]
    fn out_of_range_adjustment_rejected() {
        let adj = ColorAdjustments {
            saturation: 2.5,
            ..Default::default()
        };
        assert!(matches!(adj.validate(), Err(CoreError::InvalidRange(_))));

        let adj = ColorAdjustments {
            brightness: f64::NAN,
            ..Default::default()
        };
        assert!(adj.validate().is_err());
    }

    #[test]
    fn boundary_values_accepted() {
        let adj = ColorAdjustments {
            brightness: -1.0,
            contrast: 2.0,
            saturation: 0.0,
            temperature: 1.0,
        };
        assert!(adj.validate().is_ok());
        assert!(!adj.is_identity());
    }

    #[test]
    fn look_neutrality_ignores_blend_mode() {
        let look = Look {
            blend_mode: BlendMode::Screen,
            ..Default::default()
        };
        assert!(look.is_neutral());
        let look = Look {
            filter: Filter::Sepia,
            ..Default::default()
        };
        assert!(!look.is_neutral());
    }
}
