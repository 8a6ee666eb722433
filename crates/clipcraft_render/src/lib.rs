pub mod backend;
pub mod error;
pub mod export;
pub mod options;
pub mod plan;
pub mod probe;
pub mod reframe;
pub mod share;
pub mod thumbnails;

pub use backend::{
    ExportCancel, FfmpegBackend, ProgressStream, RenderBackend, RenderJob, RenderProgress,
};
pub use error::{RenderError, Result};
pub use export::{ExportArtifact, ExportCoordinator, ExportResult, ExportState};
pub use options::{
    preset_1080p, preset_4k, preset_720p, preset_vertical, ExportFormat, ExportOptions,
    ExportParams, ExportQuality, FrameRate, PlatformPreset,
};
pub use plan::{build_ffmpeg_args, compile, RenderPlan};
pub use probe::{clip_from_source, FfprobeAccessor, MediaSourceAccessor, SourceInfo};
pub use reframe::{apply_reframe, auto_reframe, center_crop, CenterCropService, CropService, ReframeRequest};
pub use share::{DirectorySink, ShareSink, ShareTarget};
pub use thumbnails::{clip_strip, clip_strip_times, FfmpegFrameGenerator, FrameGenerator};
