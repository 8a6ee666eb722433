use serde::{Deserialize, Serialize};

use crate::error::{invalid_range, Result};
use crate::look::{BlendMode, ColorAdjustments, Filter, Look};
use crate::types::*;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;
pub const MAX_VOLUME: f64 = 2.0;

// ---------------------------------------------------------------------------
// AudioSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSettings {
    pub volume: f64,
    /// Audible window in source time. `None` follows the video trim.
    pub trim: Option<TrimRange>,
    pub deleted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            trim: None,
            deleted: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PipPlacement
// ---------------------------------------------------------------------------

/// Where and when a picture-in-picture clip is composited over the main
/// sequence. `start` is on the output time axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PipPlacement {
    pub frame: Rect,
    pub start: TimeUs,
    pub duration: TimeUs,
}

impl PipPlacement {
    pub fn validate(&self) -> Result<()> {
        self.frame.validate()?;
        if self.start < TimeUs::ZERO {
            return Err(invalid_range(format!(
                "pip start {} is negative",
                self.start
            )));
        }
        if self.duration <= TimeUs::ZERO {
            return Err(invalid_range(format!(
                "pip duration {} must be positive",
                self.duration
            )));
        }
        Ok(())
    }

    pub fn end(&self) -> TimeUs {
        self.start + self.duration
    }
}

// ---------------------------------------------------------------------------
// VideoClip
// ---------------------------------------------------------------------------

/// A trimmed window into one source plus its edit parameters.
///
/// Every setter validates before it writes, so a clip can never hold a trim
/// range outside `0 <= start < end <= source_duration`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoClip {
    id: ClipId,
    source: SourceRef,
    source_duration: TimeUs,
    trim: TrimRange,
    speed: f64,
    reversed: bool,
    crop: Option<Rect>,
    transform: Transform,
    filter: Filter,
    adjustments: ColorAdjustments,
    blend_mode: BlendMode,
    audio: AudioSettings,
    pip: Option<PipPlacement>,
}

impl VideoClip {
    /// A clip covering the whole source.
    pub fn new(source: SourceRef, source_duration: TimeUs) -> Result<Self> {
        if source_duration <= TimeUs::ZERO {
            return Err(invalid_range(format!(
                "source {source} has non-positive duration {source_duration}"
            )));
        }
        Ok(Self {
            id: ClipId::new(),
            source,
            source_duration,
            trim: TrimRange::full(source_duration),
            speed: 1.0,
            reversed: false,
            crop: None,
            transform: Transform::default(),
            filter: Filter::None,
            adjustments: ColorAdjustments::default(),
            blend_mode: BlendMode::Normal,
            audio: AudioSettings::default(),
            pip: None,
        })
    }

    /// Builder-style trim for constructing clips.
    pub fn with_trim(mut self, start: TimeUs, end: TimeUs) -> Result<Self> {
        self.set_trim(start, end)?;
        Ok(self)
    }

    /// Builder-style identity, for clips whose id is chosen up front.
    pub fn with_id(mut self, id: ClipId) -> Self {
        self.id = id;
        self
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn source_duration(&self) -> TimeUs {
        self.source_duration
    }

    pub fn trim(&self) -> TrimRange {
        self.trim
    }

    pub fn trim_start(&self) -> TimeUs {
        self.trim.start
    }

    pub fn trim_end(&self) -> TimeUs {
        self.trim.end
    }

    /// Trimmed source duration, `trim_end - trim_start`.
    pub fn duration(&self) -> TimeUs {
        self.trim.duration()
    }

    /// Time the clip occupies in the rendered output: `duration / speed`,
    /// never shorter than one microsecond.
    pub fn output_duration(&self) -> TimeUs {
        self.duration().scale_by_speed(self.speed).max(TimeUs(1))
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn crop(&self) -> Option<Rect> {
        self.crop
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn adjustments(&self) -> ColorAdjustments {
        self.adjustments
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn look(&self) -> Look {
        Look {
            filter: self.filter,
            adjustments: self.adjustments,
            blend_mode: self.blend_mode,
        }
    }

    pub fn audio(&self) -> &AudioSettings {
        &self.audio
    }

    pub fn is_audio_deleted(&self) -> bool {
        self.audio.deleted
    }

    /// Source window that is actually heard: the video trim intersected with
    /// the audio trim. `None` when audio is deleted, muted by an empty
    /// intersection, or the volume is zero.
    pub fn audible_range(&self) -> Option<TrimRange> {
        if self.audio.deleted || self.audio.volume == 0.0 {
            return None;
        }
        match &self.audio.trim {
            Some(audio) => self.trim.intersect(audio),
            None => Some(self.trim),
        }
    }

    pub fn pip(&self) -> Option<&PipPlacement> {
        self.pip.as_ref()
    }

    pub fn is_pip(&self) -> bool {
        self.pip.is_some()
    }

    /// Re-check every invariant. Setters already enforce these; this guards
    /// clips that arrive through deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.source_duration <= TimeUs::ZERO {
            return Err(invalid_range(format!(
                "source {} has non-positive duration {}",
                self.source, self.source_duration
            )));
        }
        TrimRange::new(self.trim.start, self.trim.end, self.source_duration)?;
        if !self.speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(invalid_range(format!("speed {} out of range", self.speed)));
        }
        if let Some(rect) = &self.crop {
            rect.validate()?;
        }
        self.adjustments.validate()?;
        if !self.audio.volume.is_finite() || !(0.0..=MAX_VOLUME).contains(&self.audio.volume) {
            return Err(invalid_range(format!("volume {} out of range", self.audio.volume)));
        }
        if let Some(range) = &self.audio.trim {
            TrimRange::new(range.start, range.end, self.source_duration)?;
        }
        if let Some(p) = &self.pip {
            p.validate()?;
        }
        Ok(())
    }

    // -- setters ------------------------------------------------------------

    pub fn set_trim(&mut self, start: TimeUs, end: TimeUs) -> Result<()> {
        self.trim = TrimRange::new(start, end, self.source_duration)?;
        Ok(())
    }

    pub fn set_trim_start(&mut self, start: TimeUs) -> Result<()> {
        self.set_trim(start, self.trim.end)
    }

    pub fn set_trim_end(&mut self, end: TimeUs) -> Result<()> {
        self.set_trim(self.trim.start, end)
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(invalid_range(format!(
                "speed {speed} outside [{MIN_SPEED}, {MAX_SPEED}]"
            )));
        }
        self.speed = speed;
        Ok(())
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    pub fn set_crop(&mut self, crop: Option<Rect>) -> Result<()> {
        if let Some(rect) = &crop {
            rect.validate()?;
        }
        self.crop = crop;
        Ok(())
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn set_adjustments(&mut self, adjustments: ColorAdjustments) -> Result<()> {
        adjustments.validate()?;
        self.adjustments = adjustments;
        Ok(())
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.blend_mode = blend_mode;
    }

    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        if !volume.is_finite() || !(0.0..=MAX_VOLUME).contains(&volume) {
            return Err(invalid_range(format!(
                "volume {volume} outside [0, {MAX_VOLUME}]"
            )));
        }
        self.audio.volume = volume;
        Ok(())
    }

    /// Sets the audible window in source time, or `None` to follow the video
    /// trim again.
    pub fn set_audio_trim(&mut self, range: Option<(TimeUs, TimeUs)>) -> Result<()> {
        self.audio.trim = match range {
            Some((start, end)) => Some(TrimRange::new(start, end, self.source_duration)?),
            None => None,
        };
        Ok(())
    }

    pub fn delete_audio(&mut self) {
        self.audio.deleted = true;
    }

    pub fn restore_audio(&mut self) {
        self.audio.deleted = false;
    }

    pub fn set_pip(&mut self, placement: Option<PipPlacement>) -> Result<()> {
        if let Some(p) = &placement {
            p.validate()?;
        }
        self.pip = placement;
        Ok(())
    }

    // -- split --------------------------------------------------------------

    /// Split at `offset` into the clip's trimmed duration. Both halves share
    /// the source and every edit parameter; the left half keeps this clip's
    /// id and the right half gets a fresh one.
    ///
    /// Offsets are in playback order, so on a reversed clip the left half
    /// covers the upper part of the source window.
    pub fn split(&self, offset: TimeUs) -> Result<(VideoClip, VideoClip)> {
        if offset <= TimeUs::ZERO || offset >= self.duration() {
            return Err(invalid_range(format!(
                "split offset {offset} must be strictly inside clip duration {}",
                self.duration()
            )));
        }

        let (first, second) = if self.reversed {
            let cut = self.trim.end - offset;
            (
                TrimRange { start: cut, end: self.trim.end },
                TrimRange { start: self.trim.start, end: cut },
            )
        } else {
            let cut = self.trim.start + offset;
            (
                TrimRange { start: self.trim.start, end: cut },
                TrimRange { start: cut, end: self.trim.end },
            )
        };

        let mut left = self.clone();
        left.trim = first;

        let mut right = self.clone();
        right.id = ClipId::new();
        right.trim = second;

        Ok((left, right))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn clip(secs: f64) -> VideoClip {
        VideoClip::new(SourceRef::new("/media/a.mov"), TimeUs::from_seconds(secs)).unwrap()
    }

    #[test]
    fn new_clip_covers_whole_source() {
        let c = clip(10.0);
        assert_eq!(c.trim_start(), TimeUs::ZERO);
        assert_eq!(c.trim_end(), TimeUs::from_seconds(10.0));
        assert_eq!(c.duration(), TimeUs::from_seconds(10.0));
        assert_eq!(c.speed(), 1.0);
    }

    #[test]
    fn zero_length_source_rejected() {
        let result = VideoClip::new(SourceRef::new("x"), TimeUs::ZERO);
        assert!(matches!(result, Err(CoreError::InvalidRange(_))));
    }

    #[test]
    fn set_trim_rejects_inverted_range_and_keeps_state() {
        let mut c = clip(10.0);
        c.set_trim(TimeUs::from_seconds(2.0), TimeUs::from_seconds(8.0)).unwrap();
        let err = c.set_trim(TimeUs::from_seconds(5.0), TimeUs::from_seconds(3.0));
        assert!(matches!(err, Err(CoreError::InvalidRange(_))));
        assert_eq!(c.trim_start(), TimeUs::from_seconds(2.0));
        assert_eq!(c.trim_end(), TimeUs::from_seconds(8.0));
    }

    #[test]
    fn set_trim_end_past_source_rejected() {
        let mut c = clip(10.0);
        assert!(c.set_trim_end(TimeUs::from_seconds(10.5)).is_err());
        assert_eq!(c.duration(), TimeUs::from_seconds(10.0));
    }

    #[test]
    fn speed_outside_domain_rejected() {
        let mut c = clip(6.0);
        assert!(c.set_speed(0.1).is_err());
        assert!(c.set_speed(5.0).is_err());
        assert!(c.set_speed(f64::INFINITY).is_err());
        assert!(c.set_speed(0.0).is_err());
        assert_eq!(c.speed(), 1.0);
    }

    #[test]
    fn speed_changes_output_duration_not_trim() {
        let mut c = clip(6.0);
        c.set_speed(2.0).unwrap();
        assert_eq!(c.output_duration(), TimeUs::from_seconds(3.0));
        assert_eq!(c.duration(), TimeUs::from_seconds(6.0));
        assert_eq!(c.trim_start(), TimeUs::ZERO);
    }

    #[test]
    fn fast_tiny_clip_keeps_nonzero_output() {
        let mut c = VideoClip::new(SourceRef::new("/media/tiny.mp4"), TimeUs(1)).unwrap();
        c.set_speed(4.0).unwrap();
        assert_eq!(c.output_duration(), TimeUs(1));
    }

    #[test]
    fn split_partitions_trim_range() {
        let c = clip(10.0)
            .with_trim(TimeUs::from_seconds(1.0), TimeUs::from_seconds(9.0))
            .unwrap();
        let (left, right) = c.split(TimeUs::from_seconds(3.0)).unwrap();

        assert_eq!(left.id(), c.id());
        assert_ne!(right.id(), c.id());
        assert_eq!(left.trim_start(), TimeUs::from_seconds(1.0));
        assert_eq!(left.trim_end(), TimeUs::from_seconds(4.0));
        assert_eq!(right.trim_start(), TimeUs::from_seconds(4.0));
        assert_eq!(right.trim_end(), TimeUs::from_seconds(9.0));
        assert_eq!(left.duration() + right.duration(), c.duration());
        assert_eq!(right.source(), c.source());
    }

    #[test]
    fn split_reversed_clip_in_playback_order() {
        let mut c = clip(10.0);
        c.set_reversed(true);
        let (left, right) = c.split(TimeUs::from_seconds(4.0)).unwrap();
        assert_eq!(left.trim(), TrimRange { start: TimeUs::from_seconds(6.0), end: TimeUs::from_seconds(10.0) });
        assert_eq!(right.trim(), TrimRange { start: TimeUs::ZERO, end: TimeUs::from_seconds(6.0) });
        assert!(left.is_reversed() && right.is_reversed());
    }

    #[test]
    fn split_at_edges_rejected() {
        let c = clip(10.0);
        assert!(c.split(TimeUs::ZERO).is_err());
        assert!(c.split(TimeUs::from_seconds(10.0)).is_err());
        assert!(c.split(TimeUs::from_seconds(-1.0)).is_err());
    }

    #[test]
    fn split_halves_are_independent() {
        let c = clip(10.0);
        let (mut left, right) = c.split(TimeUs::from_seconds(5.0)).unwrap();
        left.set_filter(Filter::Noir);
        assert_eq!(right.filter(), Filter::None);
    }

    #[test]
    fn audible_range_intersects_audio_trim() {
        let mut c = clip(10.0)
            .with_trim(TimeUs::from_seconds(2.0), TimeUs::from_seconds(8.0))
            .unwrap();
        assert_eq!(c.audible_range(), Some(c.trim()));

        c.set_audio_trim(Some((TimeUs::from_seconds(5.0), TimeUs::from_seconds(10.0))))
            .unwrap();
        assert_eq!(
            c.audible_range(),
            Some(TrimRange { start: TimeUs::from_seconds(5.0), end: TimeUs::from_seconds(8.0) })
        );

        c.delete_audio();
        assert_eq!(c.audible_range(), None);
        c.restore_audio();
        assert!(c.audible_range().is_some());
    }

    #[test]
    fn audio_trim_validated_against_source() {
        let mut c = clip(10.0);
        assert!(c
            .set_audio_trim(Some((TimeUs::from_seconds(4.0), TimeUs::from_seconds(11.0))))
            .is_err());
        assert!(c.audio().trim.is_none());
    }

    #[test]
    fn volume_bounds() {
        let mut c = clip(3.0);
        assert!(c.set_volume(2.0).is_ok());
        assert!(c.set_volume(2.01).is_err());
        assert!(c.set_volume(-0.1).is_err());
        c.set_volume(0.0).unwrap();
        assert_eq!(c.audible_range(), None);
    }

    #[test]
    fn crop_must_be_inside_frame() {
        let mut c = clip(3.0);
        let bad = Rect { x: 0.5, y: 0.5, width: 0.6, height: 0.2 };
        assert!(c.set_crop(Some(bad)).is_err());
        assert_eq!(c.crop(), None);
        let good = Rect { x: 0.25, y: 0.0, width: 0.5, height: 1.0 };
        c.set_crop(Some(good)).unwrap();
        assert_eq!(c.crop(), Some(good));
    }

    #[test]
    fn validate_catches_deserialized_bad_trim() {
        let c = clip(10.0);
        let mut json = serde_json::to_value(&c).unwrap();
        json["trim"]["end"] = serde_json::json!(20_000_000);
        let bad: VideoClip = serde_json::from_value(json).unwrap();
        assert!(matches!(bad.validate(), Err(CoreError::InvalidRange(_))));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn pip_placement_validated() {
        let mut c = clip(3.0);
        let placement = PipPlacement {
            frame: Rect { x: 0.6, y: 0.6, width: 0.35, height: 0.35 },
            start: TimeUs::from_seconds(1.0),
            duration: TimeUs::ZERO,
        };
        assert!(c.set_pip(Some(placement)).is_err());
        assert!(!c.is_pip());
    }
}
