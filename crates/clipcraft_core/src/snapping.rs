use crate::timeline::Timeline;
use crate::types::*;

/// Find the nearest snap point within the threshold.
/// Returns the snapped position if within threshold, otherwise the original position.
pub fn find_snap_point(
    position_us: TimeUs,
    snap_points: &[TimeUs],
    threshold_us: TimeUs,
) -> TimeUs {
    let mut best = position_us;
    let mut best_dist = threshold_us.0 + 1; // start beyond threshold

    for &point in snap_points {
        let dist = (position_us.0 - point.0).abs();
        if dist < best_dist {
            best = point;
            best_dist = dist;
        }
    }

    if best_dist <= threshold_us.0 {
        best
    } else {
        position_us
    }
}

/// Collect snap points on the edit axis: zero, every clip boundary, and
/// overlay edges. Boundaries of `exclude_clip` are skipped so a dragged edge
/// does not snap to itself.
pub fn collect_snap_points(timeline: &Timeline, exclude_clip: Option<ClipId>) -> Vec<TimeUs> {
    let mut points = vec![TimeUs::ZERO];

    let mut cursor = TimeUs::ZERO;
    for clip in timeline.clips() {
        let start = cursor;
        cursor = cursor + clip.duration();
        if Some(clip.id()) == exclude_clip {
            continue;
        }
        points.push(start);
        points.push(cursor);
    }

    for overlay in timeline.overlays() {
        points.push(overlay.start);
        points.push(overlay.end());
    }

    points.sort();
    points.dedup();
    points
}

impl Timeline {
    /// Snap a dragged position to the nearest boundary within `threshold`.
    pub fn snap(&self, position: TimeUs, exclude_clip: Option<ClipId>, threshold: TimeUs) -> TimeUs {
        let points = collect_snap_points(self, exclude_clip);
        find_snap_point(position, &points, threshold)
    }
}
