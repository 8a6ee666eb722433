use crate::clip::{PipPlacement, VideoClip};
use crate::error::{invalid_range, CoreError, Result};
use crate::look::{BlendMode, ColorAdjustments, Filter};
use crate::overlay::{Overlay, OverlayAnimation, OverlayPosition};
use crate::timeline::Timeline;
use crate::transition::{Transition, TransitionKind};
use crate::types::*;

impl Timeline {
    // -----------------------------------------------------------------------
    // Clips
    // -----------------------------------------------------------------------

    /// Append a clip. The clip's own constructor already enforced its trim
    /// range; the timeline only refuses picture-in-picture clips and
    /// duplicate ids.
    pub fn add_clip(&mut self, clip: VideoClip) -> Result<ClipId> {
        self.check_insertable(&clip)?;
        let id = clip.id();
        tracing::debug!(clip = %id, duration = %clip.duration(), "add clip");
        self.clips.push(clip);
        self.touch();
        Ok(id)
    }

    /// Append several clips. Nothing is added if any clip is rejected.
    pub fn add_clips(&mut self, clips: impl IntoIterator<Item = VideoClip>) -> Result<Vec<ClipId>> {
        let clips: Vec<VideoClip> = clips.into_iter().collect();
        for (i, clip) in clips.iter().enumerate() {
            self.check_insertable(clip)?;
            if clips[..i].iter().any(|c| c.id() == clip.id()) {
                return Err(CoreError::InvalidOperation(format!(
                    "clip {} appears twice in batch",
                    clip.id()
                )));
            }
        }
        let ids = clips.iter().map(|c| c.id()).collect();
        self.clips.extend(clips);
        self.touch();
        Ok(ids)
    }

    /// Insert a clip at `index` (`0..=len`). A transition spanning the
    /// insertion point no longer joins neighbours and is dropped.
    pub fn insert_clip(&mut self, index: usize, clip: VideoClip) -> Result<ClipId> {
        self.check_insertable(&clip)?;
        if index > self.clips.len() {
            return Err(CoreError::InvalidOperation(format!(
                "insert index {} out of bounds (timeline has {} clips)",
                index,
                self.clips.len()
            )));
        }
        let id = clip.id();
        self.clips.insert(index, clip);
        self.prune_transitions();
        self.touch();
        Ok(id)
    }

    /// Remove a clip by id and drop every transition that touched it.
    pub fn delete(&mut self, id: ClipId) -> Result<VideoClip> {
        let idx = self.index_of(id).ok_or(CoreError::ClipNotFound(id))?;
        self.delete_at(idx)
    }

    /// Remove the clip at `index` and drop every transition that touched it.
    pub fn delete_at(&mut self, index: usize) -> Result<VideoClip> {
        if index >= self.clips.len() {
            return Err(CoreError::InvalidOperation(format!(
                "index {} out of bounds (timeline has {} clips)",
                index,
                self.clips.len()
            )));
        }
        let removed = self.clips.remove(index);
        let before = self.transitions.len();
        self.transitions.retain(|t| !t.touches(removed.id()));
        tracing::debug!(
            clip = %removed.id(),
            dropped_transitions = before - self.transitions.len(),
            "delete clip"
        );
        self.touch();
        Ok(removed)
    }

    /// Move the clip at `from` so it ends up at index `to`.
    pub fn move_clip(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.clips.len();
        if from >= len || to >= len {
            return Err(CoreError::InvalidOperation(format!(
                "move {from} -> {to} out of bounds (timeline has {len} clips)"
            )));
        }
        if from == to {
            return Ok(());
        }
        let clip = self.clips.remove(from);
        self.clips.insert(to, clip);
        self.prune_transitions();
        self.touch();
        Ok(())
    }

    pub fn move_clip_by_id(&mut self, id: ClipId, to: usize) -> Result<()> {
        let from = self.index_of(id).ok_or(CoreError::ClipNotFound(id))?;
        self.move_clip(from, to)
    }

    /// Apply `f` to a copy of the clip and commit the copy only when `f`
    /// succeeds. Readers never observe a half-applied edit. Works on both
    /// main and picture-in-picture clips, but the edit may not move a clip
    /// between the two or change its id.
    pub fn edit_clip<T>(
        &mut self,
        id: ClipId,
        f: impl FnOnce(&mut VideoClip) -> Result<T>,
    ) -> Result<T> {
        let slot = self
            .clips
            .iter_mut()
            .chain(self.pip_clips.iter_mut())
            .find(|c| c.id() == id)
            .ok_or(CoreError::ClipNotFound(id))?;

        let mut draft = slot.clone();
        let out = f(&mut draft)?;
        if draft.id() != id {
            return Err(CoreError::InvalidOperation(format!(
                "edit changed clip id {id} to {}",
                draft.id()
            )));
        }
        if draft.is_pip() != slot.is_pip() {
            return Err(CoreError::InvalidOperation(format!(
                "edit cannot move clip {id} between the main sequence and picture-in-picture"
            )));
        }
        *slot = draft;
        self.touch();
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Trim
    // -----------------------------------------------------------------------

    /// Whole-sequence trim: `start` becomes the first clip's trim start and
    /// `end` the last clip's trim end. Inner clips are untouched. On a
    /// single-clip timeline both apply to the same clip. Either both bounds
    /// apply or neither does.
    pub fn trim(&mut self, start: Option<TimeUs>, end: Option<TimeUs>) -> Result<()> {
        if self.clips.is_empty() {
            return Err(CoreError::EmptyTimeline);
        }
        let last_idx = self.clips.len() - 1;

        let mut first = self.clips[0].clone();
        if last_idx == 0 {
            let s = start.unwrap_or(first.trim_start());
            let e = end.unwrap_or(first.trim_end());
            first.set_trim(s, e)?;
            self.clips[0] = first;
        } else {
            let mut last = self.clips[last_idx].clone();
            if let Some(s) = start {
                first.set_trim_start(s)?;
            }
            if let Some(e) = end {
                last.set_trim_end(e)?;
            }
            self.clips[0] = first;
            self.clips[last_idx] = last;
        }

        tracing::debug!(?start, ?end, total = %self.total_duration(), "trim timeline");
        self.touch();
        Ok(())
    }

    /// Per-clip trim in source time.
    pub fn trim_clip(&mut self, id: ClipId, start: TimeUs, end: TimeUs) -> Result<()> {
        self.edit_clip(id, |c| c.set_trim(start, end))
    }

    // -----------------------------------------------------------------------
    // Split
    // -----------------------------------------------------------------------

    /// Split whichever clip covers `at` on the edit axis. Returns the ids of
    /// the (left, right) halves; the left half keeps the original id.
    pub fn split(&mut self, at: TimeUs) -> Result<(ClipId, ClipId)> {
        let (idx, offset) = self.clip_at(at).ok_or_else(|| {
            invalid_range(format!(
                "split time {at} outside timeline duration {}",
                self.total_duration()
            ))
        })?;
        if offset == TimeUs::ZERO {
            return Err(invalid_range(format!(
                "split time {at} falls on a clip boundary"
            )));
        }
        self.split_index(idx, offset)
    }

    /// Split a specific clip `offset` into its trimmed duration.
    pub fn split_clip(&mut self, id: ClipId, offset: TimeUs) -> Result<(ClipId, ClipId)> {
        let idx = self.index_of(id).ok_or(CoreError::ClipNotFound(id))?;
        self.split_index(idx, offset)
    }

    fn split_index(&mut self, idx: usize, offset: TimeUs) -> Result<(ClipId, ClipId)> {
        let (left, right) = self.clips[idx].split(offset)?;
        let (left_id, right_id) = (left.id(), right.id());

        self.clips[idx] = left;
        self.clips.insert(idx + 1, right);

        // The outgoing transition now leaves from the right half.
        for t in self.transitions.iter_mut().filter(|t| t.from == left_id) {
            t.from = right_id;
        }

        tracing::debug!(left = %left_id, right = %right_id, %offset, "split clip");
        self.touch();
        Ok((left_id, right_id))
    }

    // -----------------------------------------------------------------------
    // Per-clip parameters
    // -----------------------------------------------------------------------

    pub fn set_speed(&mut self, id: ClipId, speed: f64) -> Result<()> {
        self.edit_clip(id, |c| c.set_speed(speed))
    }

    pub fn set_reversed(&mut self, id: ClipId, reversed: bool) -> Result<()> {
        self.edit_clip(id, |c| {
            c.set_reversed(reversed);
            Ok(())
        })
    }

    pub fn set_crop(&mut self, id: ClipId, crop: Option<Rect>) -> Result<()> {
        self.edit_clip(id, |c| c.set_crop(crop))
    }

    pub fn set_transform(&mut self, id: ClipId, transform: Transform) -> Result<()> {
        self.edit_clip(id, |c| {
            c.set_transform(transform);
            Ok(())
        })
    }

    pub fn set_filter(&mut self, id: ClipId, filter: Filter) -> Result<()> {
        self.edit_clip(id, |c| {
            c.set_filter(filter);
            Ok(())
        })
    }

    pub fn set_adjustments(&mut self, id: ClipId, adjustments: ColorAdjustments) -> Result<()> {
        self.edit_clip(id, |c| c.set_adjustments(adjustments))
    }

    pub fn set_blend_mode(&mut self, id: ClipId, blend_mode: BlendMode) -> Result<()> {
        self.edit_clip(id, |c| {
            c.set_blend_mode(blend_mode);
            Ok(())
        })
    }

    pub fn set_volume(&mut self, id: ClipId, volume: f64) -> Result<()> {
        self.edit_clip(id, |c| c.set_volume(volume))
    }

    pub fn trim_audio(&mut self, id: ClipId, range: Option<(TimeUs, TimeUs)>) -> Result<()> {
        self.edit_clip(id, |c| c.set_audio_trim(range))
    }

    pub fn delete_audio(&mut self, id: ClipId) -> Result<()> {
        self.edit_clip(id, |c| {
            c.delete_audio();
            Ok(())
        })
    }

    pub fn restore_audio(&mut self, id: ClipId) -> Result<()> {
        self.edit_clip(id, |c| {
            c.restore_audio();
            Ok(())
        })
    }

    /// Output framing only; no clip's trim range changes.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        if self.aspect_ratio != aspect_ratio {
            self.aspect_ratio = aspect_ratio;
            self.touch();
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Bind a transition to the boundary between `from` and the clip right
    /// after it. Replaces any transition already on that boundary.
    pub fn add_transition(
        &mut self,
        kind: TransitionKind,
        from: ClipId,
        to: ClipId,
        duration: TimeUs,
    ) -> Result<TransitionId> {
        let from_idx = self.index_of(from).ok_or(CoreError::ClipNotFound(from))?;
        let to_idx = self.index_of(to).ok_or(CoreError::ClipNotFound(to))?;
        if to_idx != from_idx + 1 {
            return Err(CoreError::NotAdjacent(from, to));
        }

        let transition = Transition::new(kind, from, to, duration)?;
        let id = transition.id;
        self.transitions.retain(|t| !(t.from == from && t.to == to));
        self.transitions.push(transition);
        tracing::debug!(transition = %id, ?kind, %duration, "add transition");
        self.touch();
        Ok(id)
    }

    pub fn remove_transition(&mut self, id: TransitionId) -> Result<Transition> {
        let pos = self
            .transitions
            .iter()
            .position(|t| t.id == id)
            .ok_or(CoreError::TransitionNotFound(id))?;
        let removed = self.transitions.remove(pos);
        self.touch();
        Ok(removed)
    }

    /// Drop transitions whose endpoints are no longer direct neighbours.
    fn prune_transitions(&mut self) {
        let order: Vec<ClipId> = self.clips.iter().map(|c| c.id()).collect();
        let before = self.transitions.len();
        self.transitions.retain(|t| {
            order
                .windows(2)
                .any(|pair| pair[0] == t.from && pair[1] == t.to)
        });
        let dropped = before - self.transitions.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped transitions between non-adjacent clips");
        }
    }

    // -----------------------------------------------------------------------
    // Overlays
    // -----------------------------------------------------------------------

    pub fn add_overlay(&mut self, overlay: Overlay) -> Result<OverlayId> {
        overlay.validate()?;
        if self.overlay(overlay.id).is_some() {
            return Err(CoreError::InvalidOperation(format!(
                "overlay {} already on timeline",
                overlay.id
            )));
        }
        let id = overlay.id;
        self.overlays.push(overlay);
        self.touch();
        Ok(id)
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> Result<Overlay> {
        let pos = self
            .overlays
            .iter()
            .position(|o| o.id == id)
            .ok_or(CoreError::OverlayNotFound(id))?;
        let removed = self.overlays.remove(pos);
        self.touch();
        Ok(removed)
    }

    pub fn retime_overlay(&mut self, id: OverlayId, start: TimeUs, duration: TimeUs) -> Result<()> {
        self.edit_overlay(id, |o| {
            o.start = start;
            o.duration = duration;
        })
    }

    pub fn reposition_overlay(&mut self, id: OverlayId, position: OverlayPosition) -> Result<()> {
        self.edit_overlay(id, |o| o.position = position)
    }

    pub fn set_overlay_animation(&mut self, id: OverlayId, animation: OverlayAnimation) -> Result<()> {
        self.edit_overlay(id, |o| o.animation = animation)
    }

    fn edit_overlay(&mut self, id: OverlayId, f: impl FnOnce(&mut Overlay)) -> Result<()> {
        let slot = self
            .overlays
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(CoreError::OverlayNotFound(id))?;
        let mut draft = slot.clone();
        f(&mut draft);
        draft.validate()?;
        *slot = draft;
        self.touch();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Picture-in-picture
    // -----------------------------------------------------------------------

    pub fn add_pip(&mut self, mut clip: VideoClip, placement: PipPlacement) -> Result<ClipId> {
        clip.validate()?;
        clip.set_pip(Some(placement))?;
        if self.contains_clip(clip.id()) {
            return Err(CoreError::InvalidOperation(format!(
                "clip {} already on timeline",
                clip.id()
            )));
        }
        let id = clip.id();
        self.pip_clips.push(clip);
        self.touch();
        Ok(id)
    }

    pub fn remove_pip(&mut self, id: ClipId) -> Result<VideoClip> {
        let pos = self
            .pip_clips
            .iter()
            .position(|c| c.id() == id)
            .ok_or(CoreError::ClipNotFound(id))?;
        let removed = self.pip_clips.remove(pos);
        self.touch();
        Ok(removed)
    }

    pub fn set_pip_frame(&mut self, id: ClipId, frame: Rect) -> Result<()> {
        if !self.pip_clips.iter().any(|c| c.id() == id) {
            return Err(CoreError::ClipNotFound(id));
        }
        self.edit_clip(id, |c| {
            let placement = c
                .pip()
                .copied()
                .ok_or_else(|| CoreError::InvalidOperation("clip has no pip placement".into()))?;
            c.set_pip(Some(PipPlacement { frame, ..placement }))
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn contains_clip(&self, id: ClipId) -> bool {
        self.clips.iter().chain(self.pip_clips.iter()).any(|c| c.id() == id)
    }

    fn check_insertable(&self, clip: &VideoClip) -> Result<()> {
        clip.validate()?;
        if clip.is_pip() {
            return Err(CoreError::InvalidOperation(
                "picture-in-picture clips are added with add_pip".into(),
            ));
        }
        if self.contains_clip(clip.id()) {
            return Err(CoreError::InvalidOperation(format!(
                "clip {} already on timeline",
                clip.id()
            )));
        }
        Ok(())
    }
}
