use std::future::Future;
use std::time::Duration;

use clipcraft_core::{
    AspectRatio, ClipId, EditOperation, EditSession, Rect, SourceRef, TimeUs, VideoClip,
};

use crate::backend::ExportCancel;
use crate::error::{RenderError, Result};

const CANCEL_POLL: Duration = Duration::from_millis(50);

/// What a crop service needs to suggest a reframe for one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ReframeRequest {
    pub clip: ClipId,
    pub source: SourceRef,
    pub source_size: (u32, u32),
    pub target: AspectRatio,
    /// Source time at the middle of the clip's trimmed range.
    pub at: TimeUs,
}

impl ReframeRequest {
    pub fn for_clip(clip: &VideoClip, source_size: (u32, u32), target: AspectRatio) -> Self {
        let trim = clip.trim();
        Self {
            clip: clip.id(),
            source: clip.source().clone(),
            source_size,
            target,
            at: trim.start + trim.duration() / 2,
        }
    }
}

/// Suggests a normalized crop rectangle for a clip.
///
/// Calls may be slow (model inference, network); callers await them off the
/// editing path and apply the result afterwards.
pub trait CropService: Send + Sync {
    fn suggest_crop(&self, request: &ReframeRequest) -> impl Future<Output = Result<Rect>> + Send;
}

/// Largest centred crop with the target aspect ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterCropService;

impl CropService for CenterCropService {
    async fn suggest_crop(&self, request: &ReframeRequest) -> Result<Rect> {
        Ok(center_crop(request.source_size, request.target))
    }
}

pub fn center_crop(source_size: (u32, u32), target: AspectRatio) -> Rect {
    let (w, h) = source_size;
    if w == 0 || h == 0 {
        return Rect::FULL;
    }
    let source_aspect = w as f64 / h as f64;
    let target_aspect = target.ratio();
    if source_aspect > target_aspect {
        let width = target_aspect / source_aspect;
        Rect {
            x: (1.0 - width) / 2.0,
            y: 0.0,
            width,
            height: 1.0,
        }
    } else {
        let height = source_aspect / target_aspect;
        Rect {
            x: 0.0,
            y: (1.0 - height) / 2.0,
            width: 1.0,
            height,
        }
    }
}

/// Await a crop suggestion, giving up once `cancel` fires.
pub async fn auto_reframe<S: CropService>(
    service: &S,
    request: &ReframeRequest,
    cancel: &ExportCancel,
) -> Result<Rect> {
    if cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }
    let suggestion = service.suggest_crop(request);
    tokio::pin!(suggestion);
    let rect = loop {
        tokio::select! {
            rect = &mut suggestion => break rect?,
            _ = tokio::time::sleep(CANCEL_POLL) => {
                if cancel.is_cancelled() {
                    tracing::debug!(clip = %request.clip, "reframe cancelled");
                    return Err(RenderError::Cancelled);
                }
            }
        }
    };
    rect.validate()?;
    tracing::debug!(clip = %request.clip, ?rect, "reframe suggested");
    Ok(rect)
}

/// Apply a suggested crop as an undoable edit. Fails if the clip was
/// removed while the suggestion was pending.
pub fn apply_reframe(session: &mut EditSession, clip: ClipId, crop: Rect) -> Result<()> {
    session.apply(&EditOperation::SetCrop {
        clip,
        crop: Some(crop),
    })?;
    Ok(())
}
