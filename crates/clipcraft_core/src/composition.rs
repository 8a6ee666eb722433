//! Renderable view of a timeline.
//!
//! A [`Composition`] is an immutable snapshot: clips laid out on the output
//! time axis (trimmed duration divided by speed), transitions resolved to
//! neighbouring segments, overlays and picture-in-picture layers clipped to
//! the output length. Preview and export both read compositions; neither
//! reads the timeline directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::VideoClip;
use crate::error::{CoreError, Result};
use crate::look::{BlendMode, Look};
use crate::overlay::Overlay;
use crate::timeline::Timeline;
use crate::transition::TransitionKind;
use crate::types::*;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub clip_id: ClipId,
    pub source: SourceRef,
    /// Video window in source time.
    pub source_range: TrimRange,
    /// Audible window in source time, `None` when silent.
    pub audio_range: Option<TrimRange>,
    pub volume: f64,
    pub speed: f64,
    pub reversed: bool,
    pub output_start: TimeUs,
    pub output_duration: TimeUs,
    pub look: Look,
    pub crop: Option<Rect>,
    pub transform: Transform,
}

impl Segment {
    fn from_clip(clip: &VideoClip, output_start: TimeUs, output_duration: TimeUs) -> Self {
        Self {
            clip_id: clip.id(),
            source: clip.source().clone(),
            source_range: clip.trim(),
            audio_range: clip.audible_range(),
            volume: clip.audio().volume,
            speed: clip.speed(),
            reversed: clip.is_reversed(),
            output_start,
            output_duration,
            look: clip.look(),
            crop: clip.crop(),
            transform: clip.transform(),
        }
    }

    pub fn output_end(&self) -> TimeUs {
        self.output_start + self.output_duration
    }

    /// Source time shown at output time `t`. Playback runs `speed` times
    /// faster than source time and, for reversed segments, from the end of
    /// the source range backwards. The result stays inside `source_range`.
    pub fn source_time_at(&self, t: TimeUs) -> TimeUs {
        let local = (t - self.output_start).max(TimeUs::ZERO);
        let offset = TimeUs((local.0 as f64 * self.speed).round() as i64)
            .min(self.source_range.duration());
        let time = if self.reversed {
            self.source_range.end - offset
        } else {
            self.source_range.start + offset
        };
        time.clamp(self.source_range.start, self.source_range.end)
    }
}

// ---------------------------------------------------------------------------
// Transitions, overlays, PiP
// ---------------------------------------------------------------------------

/// A transition resolved onto the output axis. The effect window is
/// centred on the cut at `at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionTransition {
    pub kind: TransitionKind,
    pub from_segment: usize,
    pub to_segment: usize,
    pub at: TimeUs,
    pub duration: TimeUs,
}

impl CompositionTransition {
    pub fn window_start(&self) -> TimeUs {
        self.at - self.duration / 2
    }

    pub fn window_end(&self) -> TimeUs {
        self.window_start() + self.duration
    }

    /// Progress through the effect in `[0, 1)`, or `None` outside the window.
    pub fn progress_at(&self, t: TimeUs) -> Option<f64> {
        if t < self.window_start() || t >= self.window_end() {
            return None;
        }
        Some((t - self.window_start()).0 as f64 / self.duration.0 as f64)
    }
}

/// A picture-in-picture clip placed on the output axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipLayer {
    pub segment: Segment,
    pub frame: Rect,
    pub blend_mode: BlendMode,
}

impl PipLayer {
    pub fn is_active_at(&self, t: TimeUs) -> bool {
        t >= self.segment.output_start && t < self.segment.output_end()
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Composition {
    /// Timeline revision this snapshot was built from.
    pub revision: u64,
    pub aspect_ratio: AspectRatio,
    pub duration: TimeUs,
    pub segments: Vec<Segment>,
    pub transitions: Vec<CompositionTransition>,
    pub overlays: Vec<Overlay>,
    pub pip: Vec<PipLayer>,
}

impl Composition {
    /// The segment playing at output time `t`. A time on a cut belongs to
    /// the later segment; `t == duration` maps to the last segment.
    pub fn segment_at(&self, t: TimeUs) -> Option<(usize, &Segment)> {
        if t < TimeUs::ZERO || t > self.duration {
            return None;
        }
        self.segments
            .iter()
            .enumerate()
            .find(|(_, s)| t < s.output_end())
            .or_else(|| self.segments.iter().enumerate().last())
    }

    /// Source reference and source time shown at output time `t`.
    pub fn source_time_at(&self, t: TimeUs) -> Option<(&SourceRef, TimeUs)> {
        let (_, seg) = self.segment_at(t)?;
        Some((&seg.source, seg.source_time_at(t)))
    }

    pub fn overlays_at(&self, t: TimeUs) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter().filter(move |o| o.is_active_at(t))
    }

    pub fn pip_at(&self, t: TimeUs) -> impl Iterator<Item = &PipLayer> {
        self.pip.iter().filter(move |p| p.is_active_at(t))
    }

    /// The transition whose window covers `t`, with its progress.
    pub fn transition_at(&self, t: TimeUs) -> Option<(&CompositionTransition, f64)> {
        self.transitions
            .iter()
            .find_map(|tr| tr.progress_at(t).map(|p| (tr, p)))
    }
}

// ---------------------------------------------------------------------------
// CompositionBuilder
// ---------------------------------------------------------------------------

pub struct CompositionBuilder;

impl CompositionBuilder {
    pub fn build(timeline: &Timeline) -> Result<Composition> {
        if timeline.is_empty() {
            return Err(CoreError::EmptyTimeline);
        }

        let mut cursor = TimeUs::ZERO;
        let segments: Vec<Segment> = timeline
            .clips()
            .iter()
            .map(|clip| {
                let out = clip.output_duration();
                let seg = Segment::from_clip(clip, cursor, out);
                cursor = cursor + out;
                seg
            })
            .collect();
        let duration = cursor;

        let mut transitions = Vec::with_capacity(timeline.transitions().len());
        for t in timeline.transitions() {
            let (Some(from), Some(to)) = (timeline.index_of(t.from), timeline.index_of(t.to))
            else {
                continue;
            };
            if to != from + 1 {
                tracing::warn!(transition = %t.id, "skipping transition between non-adjacent clips");
                continue;
            }
            let limit = segments[from]
                .output_duration
                .min(segments[to].output_duration);
            let duration = t.duration.min(limit);
            if duration < t.duration {
                tracing::debug!(transition = %t.id, requested = %t.duration, clamped = %duration, "transition clamped");
            }
            transitions.push(CompositionTransition {
                kind: t.kind,
                from_segment: from,
                to_segment: to,
                at: segments[to].output_start,
                duration,
            });
        }
        transitions.sort_by_key(|t| t.from_segment);

        let mut overlays: Vec<Overlay> = timeline
            .overlays()
            .iter()
            .filter(|o| o.start < duration)
            .map(|o| {
                let mut o = o.clone();
                if o.end() > duration {
                    o.duration = duration - o.start;
                }
                o
            })
            .collect();
        overlays.sort_by_key(|o| o.start);

        let pip = timeline
            .pip_clips()
            .iter()
            .filter_map(|clip| {
                let placement = clip.pip()?;
                if placement.start >= duration {
                    return None;
                }
                let out = placement
                    .duration
                    .min(clip.output_duration())
                    .min(duration - placement.start);
                Some(PipLayer {
                    segment: Segment::from_clip(clip, placement.start, out),
                    frame: placement.frame,
                    blend_mode: clip.blend_mode(),
                })
            })
            .collect();

        tracing::debug!(
            revision = timeline.revision(),
            segments = segments.len(),
            duration = %duration,
            "composition built"
        );

        Ok(Composition {
            revision: timeline.revision(),
            aspect_ratio: timeline.aspect_ratio(),
            duration,
            segments,
            transitions,
            overlays,
            pip,
        })
    }
}

// ---------------------------------------------------------------------------
// CompositionCache
// ---------------------------------------------------------------------------

/// Last built composition, rebuilt only when the timeline revision moves.
#[derive(Debug, Default)]
pub struct CompositionCache {
    current: Option<Arc<Composition>>,
}

impl CompositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, timeline: &Timeline) -> Result<Arc<Composition>> {
        if let Some(c) = &self.current {
            if c.revision == timeline.revision() {
                return Ok(Arc::clone(c));
            }
        }
        match CompositionBuilder::build(timeline) {
            Ok(built) => {
                let built = Arc::new(built);
                self.current = Some(Arc::clone(&built));
                Ok(built)
            }
            Err(e) => {
                self.current = None;
                Err(e)
            }
        }
    }

    /// Last successful build, which may be stale.
    pub fn last(&self) -> Option<&Arc<Composition>> {
        self.current.as_ref()
    }

    pub fn is_fresh(&self, timeline: &Timeline) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.revision == timeline.revision())
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }
}
