use std::sync::Arc;

use crate::composition::{Composition, CompositionCache};
use crate::edit::EditOperation;
use crate::error::Result;
use crate::history::History;
use crate::timeline::Timeline;
use crate::types::AspectRatio;

/// One user's editing session: the timeline, its undo history and the
/// composition last built from it.
///
/// All mutation goes through `&mut self`, so a session has exactly one
/// writer. Readers take `Arc<Composition>` snapshots from
/// [`EditSession::composition`] and keep them across later edits.
#[derive(Debug, Default)]
pub struct EditSession {
    timeline: Timeline,
    history: History,
    cache: CompositionCache,
}

impl EditSession {
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self::from_timeline(Timeline::with_aspect_ratio(aspect_ratio))
    }

    pub fn from_timeline(timeline: Timeline) -> Self {
        Self {
            timeline,
            history: History::default(),
            cache: CompositionCache::new(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn apply(&mut self, op: &EditOperation) -> Result<()> {
        self.history.execute(op, &mut self.timeline)
    }

    /// Apply a batch as a single undo step. Nothing changes if any operation
    /// fails.
    pub fn apply_batch(&mut self, description: impl Into<String>, ops: &[EditOperation]) -> Result<()> {
        self.history.execute_batch(description, ops, &mut self.timeline)
    }

    pub fn undo(&mut self) -> Result<()> {
        self.history.undo(&mut self.timeline)
    }

    pub fn redo(&mut self) -> Result<()> {
        self.history.redo(&mut self.timeline)
    }

    /// The composition for the current timeline, rebuilt if any edit landed
    /// since the last call.
    pub fn composition(&mut self) -> Result<Arc<Composition>> {
        self.cache.get(&self.timeline)
    }

    /// Whether [`EditSession::composition`] would return without rebuilding.
    pub fn is_composition_fresh(&self) -> bool {
        self.cache.is_fresh(&self.timeline)
    }

    pub fn invalidate_composition(&mut self) {
        self.cache.invalidate();
    }

    /// Run a direct timeline mutation outside the undo history, e.g. a crop
    /// delivered by a background service. The cache notices through the
    /// revision counter.
    pub fn edit_untracked<T>(&mut self, f: impl FnOnce(&mut Timeline) -> Result<T>) -> Result<T> {
        f(&mut self.timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::VideoClip;
    use crate::error::CoreError;
    use crate::types::*;

    fn session_with(durations: &[f64]) -> (EditSession, Vec<ClipId>) {
        let mut session = EditSession::new(AspectRatio::Horizontal);
        let mut ids = Vec::new();
        for d in durations {
            let clip = VideoClip::new(SourceRef::new("/media/a.mp4"), TimeUs::from_seconds(*d)).unwrap();
            ids.push(clip.id());
            session.apply(&EditOperation::AddClip { clip }).unwrap();
        }
        (session, ids)
    }

    #[test]
    fn composition_tracks_edits() {
        let (mut session, ids) = session_with(&[6.0, 4.0]);
        let before = session.composition().unwrap();
        assert!(session.is_composition_fresh());

        session
            .apply(&EditOperation::SetSpeed { clip: ids[0], speed: 2.0 })
            .unwrap();
        assert!(!session.is_composition_fresh());
        let after = session.composition().unwrap();
        assert_eq!(before.duration, TimeUs::from_seconds(10.0));
        assert_eq!(after.duration, TimeUs::from_seconds(7.0));
    }

    #[test]
    fn undo_rebuilds_composition() {
        let (mut session, _) = session_with(&[5.0]);
        session
            .apply(&EditOperation::Split { at: TimeUs::from_seconds(2.0) })
            .unwrap();
        assert_eq!(session.composition().unwrap().segments.len(), 2);
        session.undo().unwrap();
        assert_eq!(session.composition().unwrap().segments.len(), 1);
        session.redo().unwrap();
        assert_eq!(session.composition().unwrap().segments.len(), 2);
    }

    #[test]
    fn failed_batch_leaves_session_untouched() {
        let (mut session, ids) = session_with(&[5.0, 5.0]);
        let rev = session.timeline().revision();
        let result = session.apply_batch(
            "bad",
            &[
                EditOperation::Delete { clip: ids[0] },
                EditOperation::Delete { clip: ids[0] },
            ],
        );
        assert!(matches!(result, Err(CoreError::ClipNotFound(_))));
        assert_eq!(session.timeline().len(), 2);
        assert_eq!(session.timeline().revision(), rev);
        assert_eq!(session.history().undo_description(), Some("Add clip"));
    }

    #[test]
    fn empty_session_has_no_composition() {
        let mut session = EditSession::default();
        assert!(matches!(session.composition(), Err(CoreError::EmptyTimeline)));
    }

    #[test]
    fn untracked_edit_is_not_undoable_but_rebuilds() {
        let (mut session, ids) = session_with(&[5.0]);
        session.composition().unwrap();
        session
            .edit_untracked(|tl| tl.set_crop(ids[0], Some(Rect { x: 0.25, y: 0.0, width: 0.5, height: 1.0 })))
            .unwrap();
        assert!(!session.is_composition_fresh());
        assert!(session.composition().unwrap().segments[0].crop.is_some());
        assert_eq!(session.history().undo_description(), Some("Add clip"));
    }
}
