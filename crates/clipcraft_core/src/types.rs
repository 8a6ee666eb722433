use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use uuid::Uuid;

use crate::error::{invalid_range, Result};

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Duration this span occupies when played back at `speed`.
    /// Rounded to the nearest microsecond.
    pub fn scale_by_speed(self, speed: f64) -> Self {
        Self((self.0 as f64 / speed).round() as i64)
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl std::iter::Sum for TimeUs {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TimeUs::ZERO, |acc, t| acc + t)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_id!(
    /// Stable identity of a clip for as long as it lives in a timeline.
    ClipId
);
define_id!(TransitionId);
define_id!(OverlayId);

/// Opaque reference into the media library. The core never interprets it;
/// accessors and render backends resolve it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TrimRange
// ---------------------------------------------------------------------------

/// A `[start, end)` window of source time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrimRange {
    pub start: TimeUs,
    pub end: TimeUs,
}

impl TrimRange {
    /// Validates `0 <= start < end <= source_duration`.
    pub fn new(start: TimeUs, end: TimeUs, source_duration: TimeUs) -> Result<Self> {
        if start < TimeUs::ZERO {
            return Err(invalid_range(format!("trim start {start} is negative")));
        }
        if start >= end {
            return Err(invalid_range(format!(
                "trim start {start} must be before trim end {end}"
            )));
        }
        if end > source_duration {
            return Err(invalid_range(format!(
                "trim end {end} exceeds source duration {source_duration}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn full(source_duration: TimeUs) -> Self {
        Self {
            start: TimeUs::ZERO,
            end: source_duration,
        }
    }

    pub fn duration(&self) -> TimeUs {
        self.end - self.start
    }

    pub fn contains(&self, t: TimeUs) -> bool {
        t >= self.start && t < self.end
    }

    /// Overlap of two ranges, or `None` if they do not overlap.
    pub fn intersect(&self, other: &TrimRange) -> Option<TrimRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TrimRange { start, end })
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in normalized frame coordinates (`0.0..=1.0` on both axes).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn validate(&self) -> Result<()> {
        let ok = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if ok(self.x) && ok(self.y) {
            Ok(())
        } else {
            Err(invalid_range(format!(
                "point ({}, {}) is outside the unit square",
                self.x, self.y
            )))
        }
    }
}

/// A rectangle in normalized frame coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const FULL: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn validate(&self) -> Result<()> {
        const EPS: f64 = 1e-9;
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite
            || self.x < 0.0
            || self.y < 0.0
            || self.width <= 0.0
            || self.height <= 0.0
            || self.x + self.width > 1.0 + EPS
            || self.y + self.height > 1.0 + EPS
        {
            return Err(invalid_range(format!(
                "rect {{x: {}, y: {}, w: {}, h: {}}} is outside the unit square",
                self.x, self.y, self.width, self.height
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transform {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        *self == Transform::default()
    }
}

// ---------------------------------------------------------------------------
// AspectRatio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 16:9
    #[default]
    Horizontal,
    /// 9:16
    Vertical,
    /// 1:1
    Square,
}

impl AspectRatio {
    /// Width divided by height.
    pub fn ratio(self) -> f64 {
        match self {
            AspectRatio::Horizontal => 16.0 / 9.0,
            AspectRatio::Vertical => 9.0 / 16.0,
            AspectRatio::Square => 1.0,
        }
    }

    /// Frame size whose shorter side is `short_side`, rounded to even
    /// dimensions for encoders.
    pub fn frame_size(self, short_side: u32) -> (u32, u32) {
        let long = even((short_side as f64 * 16.0 / 9.0).round() as u32);
        let short = even(short_side);
        match self {
            AspectRatio::Horizontal => (long, short),
            AspectRatio::Vertical => (short, long),
            AspectRatio::Square => (short, short),
        }
    }
}

fn even(v: u32) -> u32 {
    v + (v % 2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn time_us_add_sub() {
        let a = TimeUs(5_000_000);
        let b = TimeUs(3_000_000);
        assert_eq!(a + b, TimeUs(8_000_000));
        assert_eq!(a - b, TimeUs(2_000_000));
    }

    #[test]
    fn time_us_from_seconds_as_seconds() {
        let t = TimeUs::from_seconds(2.5);
        assert_eq!(t, TimeUs(2_500_000));
        assert!((t.as_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn time_us_display() {
        assert_eq!(TimeUs(0).to_string(), "00:00:00.000");
        assert_eq!(TimeUs(1_500_000).to_string(), "00:00:01.500");
        assert_eq!(TimeUs::from_seconds(3661.5).to_string(), "01:01:01.500");
        assert_eq!(TimeUs(-2_000_000).to_string(), "-00:00:02.000");
    }

    #[test]
    fn time_us_scale_by_speed() {
        assert_eq!(TimeUs(6_000_000).scale_by_speed(2.0), TimeUs(3_000_000));
        assert_eq!(TimeUs(3_000_000).scale_by_speed(0.5), TimeUs(6_000_000));
        assert_eq!(TimeUs(1_000_000).scale_by_speed(3.0), TimeUs(333_333));
    }

    #[test]
    fn time_us_sum() {
        let total: TimeUs = [TimeUs(1), TimeUs(2), TimeUs(3)].into_iter().sum();
        assert_eq!(total, TimeUs(6));
    }

    #[test]
    fn trim_range_validation() {
        let src = TimeUs(10_000_000);
        assert!(TrimRange::new(TimeUs(0), TimeUs(10_000_000), src).is_ok());
        assert!(matches!(
            TrimRange::new(TimeUs(5), TimeUs(5), src),
            Err(CoreError::InvalidRange(_))
        ));
        assert!(TrimRange::new(TimeUs(-1), TimeUs(5), src).is_err());
        assert!(TrimRange::new(TimeUs(0), TimeUs(10_000_001), src).is_err());
    }

    #[test]
    fn trim_range_intersect() {
        let a = TrimRange { start: TimeUs(0), end: TimeUs(10) };
        let b = TrimRange { start: TimeUs(5), end: TimeUs(20) };
        assert_eq!(a.intersect(&b), Some(TrimRange { start: TimeUs(5), end: TimeUs(10) }));
        let c = TrimRange { start: TimeUs(10), end: TimeUs(12) };
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn rect_validation() {
        assert!(Rect::FULL.validate().is_ok());
        let r = Rect { x: 0.5, y: 0.0, width: 0.6, height: 1.0 };
        assert!(r.validate().is_err());
        let r = Rect { x: 0.1, y: 0.1, width: 0.0, height: 0.5 };
        assert!(r.validate().is_err());
        let r = Rect { x: f64::NAN, y: 0.0, width: 0.5, height: 0.5 };
        assert!(r.validate().is_err());
    }

    #[test]
    fn aspect_ratio_frame_sizes() {
        assert_eq!(AspectRatio::Horizontal.frame_size(1080), (1920, 1080));
        assert_eq!(AspectRatio::Vertical.frame_size(1080), (1080, 1920));
        assert_eq!(AspectRatio::Square.frame_size(1080), (1080, 1080));
        assert_eq!(AspectRatio::Horizontal.frame_size(720), (1280, 720));
        assert_eq!(AspectRatio::Horizontal.frame_size(2160), (3840, 2160));
        assert_eq!(AspectRatio::Horizontal.frame_size(480), (854, 480));
    }

    #[test]
    fn ids_are_unique_and_serialize_transparently() {
        let a = ClipId::new();
        let b = ClipId::new();
        assert_ne!(a, b);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a.0));
    }

    #[test]
    fn serde_roundtrip_aspect_ratio() {
        let json = serde_json::to_string(&AspectRatio::Vertical).unwrap();
        assert_eq!(json, "\"vertical\"");
        let back: AspectRatio = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AspectRatio::Vertical);
    }
}
