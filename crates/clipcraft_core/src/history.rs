use crate::edit::EditOperation;
use crate::error::{CoreError, Result};
use crate::timeline::Timeline;

/// One undoable step: the timeline as it was before the step ran.
#[derive(Debug, Clone)]
struct Entry {
    description: String,
    snapshot: Timeline,
}

/// Undo/redo history stack.
///
/// Each entry keeps the full timeline state on the other side of the step.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Entry>,
    redo_stack: Vec<Entry>,
    max_size: usize,
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Apply an operation and push it onto the undo stack. Clears redo stack.
    pub fn execute(&mut self, op: &EditOperation, timeline: &mut Timeline) -> Result<()> {
        self.execute_batch(op.description(), std::slice::from_ref(op), timeline)
    }

    /// Apply a batch as a single undo step.
    pub fn execute_batch(
        &mut self,
        description: impl Into<String>,
        ops: &[EditOperation],
        timeline: &mut Timeline,
    ) -> Result<()> {
        let snapshot = timeline.clone();
        timeline.apply_batch(ops)?;
        self.redo_stack.clear();
        self.undo_stack.push(Entry {
            description: description.into(),
            snapshot,
        });
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    /// Undo the last step.
    pub fn undo(&mut self, timeline: &mut Timeline) -> Result<()> {
        let entry = self.undo_stack.pop().ok_or(CoreError::NothingToUndo)?;
        let current = restore(timeline, entry.snapshot);
        self.redo_stack.push(Entry {
            description: entry.description,
            snapshot: current,
        });
        Ok(())
    }

    /// Redo the last undone step.
    pub fn redo(&mut self, timeline: &mut Timeline) -> Result<()> {
        let entry = self.redo_stack.pop().ok_or(CoreError::NothingToRedo)?;
        let current = restore(timeline, entry.snapshot);
        self.undo_stack.push(Entry {
            description: entry.description,
            snapshot: current,
        });
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Swap `snapshot` into `timeline` and return what was there. The revision
/// keeps counting forward so cached compositions never match stale state.
fn restore(timeline: &mut Timeline, mut snapshot: Timeline) -> Timeline {
    snapshot.revision = timeline.revision;
    snapshot.touch();
    std::mem::replace(timeline, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::VideoClip;
    use crate::look::Filter;
    use crate::types::*;

    fn make_test_timeline() -> (Timeline, ClipId) {
        let mut tl = Timeline::new();
        let id = tl
            .add_clip(VideoClip::new(SourceRef::new("/media/a.mp4"), TimeUs(5_000_000)).unwrap())
            .unwrap();
        (tl, id)
    }

    // -----------------------------------------------------------------------
    // execute -> undo -> redo
    // -----------------------------------------------------------------------

    #[test]
    fn split_undo_restores_original() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(100);

        history
            .execute(&EditOperation::Split { at: TimeUs(2_000_000) }, &mut tl)
            .unwrap();
        assert_eq!(tl.len(), 2);

        history.undo(&mut tl).unwrap();
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.clips()[0].id(), clip_id);
        assert_eq!(tl.clips()[0].duration(), TimeUs(5_000_000));
    }

    #[test]
    fn redo_reapplies() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(100);

        let op = EditOperation::SetFilter { clip: clip_id, filter: Filter::Mono };
        history.execute(&op, &mut tl).unwrap();
        history.undo(&mut tl).unwrap();
        assert_eq!(tl.clips()[0].filter(), Filter::None);

        history.redo(&mut tl).unwrap();
        assert_eq!(tl.clips()[0].filter(), Filter::Mono);
    }

    #[test]
    fn failed_operation_is_not_recorded() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(100);

        let op = EditOperation::SetSpeed { clip: clip_id, speed: 10.0 };
        assert!(history.execute(&op, &mut tl).is_err());
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_and_redo_advance_revision() {
        let (mut tl, _) = make_test_timeline();
        let mut history = History::new(100);

        history
            .execute(&EditOperation::Trim { start: Some(TimeUs(1_000_000)), end: None }, &mut tl)
            .unwrap();
        let after_edit = tl.revision();
        history.undo(&mut tl).unwrap();
        assert!(tl.revision() > after_edit);
        let after_undo = tl.revision();
        history.redo(&mut tl).unwrap();
        assert!(tl.revision() > after_undo);
    }

    // -----------------------------------------------------------------------
    // max_size limits undo stack
    // -----------------------------------------------------------------------

    #[test]
    fn max_size_limits_undo_stack() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(3);

        for i in 0..5 {
            let op = EditOperation::TrimClip {
                clip: clip_id,
                start: TimeUs(i * 100_000),
                end: TimeUs(5_000_000),
            };
            history.execute(&op, &mut tl).unwrap();
        }

        assert!(history.undo(&mut tl).is_ok());
        assert!(history.undo(&mut tl).is_ok());
        assert!(history.undo(&mut tl).is_ok());
        assert!(matches!(history.undo(&mut tl), Err(CoreError::NothingToUndo)));
        assert_eq!(tl.clips()[0].trim_start(), TimeUs(100_000));
    }

    // -----------------------------------------------------------------------
    // can_undo / can_redo flags
    // -----------------------------------------------------------------------

    #[test]
    fn can_undo_can_redo_flags() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(100);

        assert!(!history.can_undo());
        assert!(!history.can_redo());

        history
            .execute(&EditOperation::DeleteAudio { clip: clip_id }, &mut tl)
            .unwrap();
        assert!(history.can_undo());
        assert!(!history.can_redo());

        history.undo(&mut tl).unwrap();
        assert!(!history.can_undo());
        assert!(history.can_redo());

        history.redo(&mut tl).unwrap();
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn new_edit_clears_redo() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(100);
        history
            .execute(&EditOperation::DeleteAudio { clip: clip_id }, &mut tl)
            .unwrap();
        history.undo(&mut tl).unwrap();
        history
            .execute(&EditOperation::SetVolume { clip: clip_id, volume: 0.5 }, &mut tl)
            .unwrap();
        assert!(!history.can_redo());
        assert!(matches!(history.redo(&mut tl), Err(CoreError::NothingToRedo)));
    }

    // -----------------------------------------------------------------------
    // description methods
    // -----------------------------------------------------------------------

    #[test]
    fn description_methods() {
        let (mut tl, clip_id) = make_test_timeline();
        let mut history = History::new(100);

        assert_eq!(history.undo_description(), None);
        history
            .execute(&EditOperation::SetSpeed { clip: clip_id, speed: 2.0 }, &mut tl)
            .unwrap();
        assert_eq!(history.undo_description(), Some("Change speed"));

        history
            .execute_batch("Auto edit", &[EditOperation::DeleteAudio { clip: clip_id }], &mut tl)
            .unwrap();
        assert_eq!(history.undo_description(), Some("Auto edit"));

        history.undo(&mut tl).unwrap();
        assert_eq!(history.redo_description(), Some("Auto edit"));
        assert_eq!(history.undo_description(), Some("Change speed"));
    }
}
