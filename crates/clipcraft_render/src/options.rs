use clipcraft_core::AspectRatio;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Quality / format / frame rate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExportQuality {
    Sd480p,
    Hd720p,
    #[default]
    Hd1080p,
    Uhd4k,
}

impl ExportQuality {
    /// Length of the shorter frame edge in pixels.
    pub fn short_side(self) -> u32 {
        match self {
            ExportQuality::Sd480p => 480,
            ExportQuality::Hd720p => 720,
            ExportQuality::Hd1080p => 1080,
            ExportQuality::Uhd4k => 2160,
        }
    }

    pub fn crf(self) -> u8 {
        match self {
            ExportQuality::Sd480p => 26,
            ExportQuality::Hd720p => 23,
            ExportQuality::Hd1080p => 21,
            ExportQuality::Uhd4k => 20,
        }
    }

    /// Peak video bitrate in kbit/s.
    pub fn video_bitrate(self) -> u32 {
        match self {
            ExportQuality::Sd480p => 2_500,
            ExportQuality::Hd720p => 5_000,
            ExportQuality::Hd1080p => 8_000,
            ExportQuality::Uhd4k => 35_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Mp4,
    Hevc,
    Mov,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Mp4 | ExportFormat::Hevc => "mp4",
            ExportFormat::Mov => "mov",
        }
    }

    pub fn video_encoder(self) -> &'static str {
        match self {
            ExportFormat::Mp4 | ExportFormat::Mov => "libx264",
            ExportFormat::Hevc => "libx265",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Fps24,
    #[default]
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn fps(self) -> u32 {
        match self {
            FrameRate::Fps24 => 24,
            FrameRate::Fps30 => 30,
            FrameRate::Fps60 => 60,
        }
    }
}

// ---------------------------------------------------------------------------
// ExportOptions / ExportParams
// ---------------------------------------------------------------------------

/// What the user picked. `aspect_ratio: None` keeps the timeline's framing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportOptions {
    pub quality: ExportQuality,
    pub format: ExportFormat,
    pub aspect_ratio: Option<AspectRatio>,
    pub frame_rate: FrameRate,
}

impl ExportOptions {
    pub fn resolve(&self, timeline_aspect: AspectRatio) -> ExportParams {
        let aspect = self.aspect_ratio.unwrap_or(timeline_aspect);
        let (width, height) = aspect.frame_size(self.quality.short_side());
        ExportParams {
            width,
            height,
            fps: self.frame_rate.fps(),
            format: self.format,
            crf: self.quality.crf(),
            video_bitrate: self.quality.video_bitrate(),
        }
    }
}

/// Concrete encoder parameters handed to the render backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: ExportFormat,
    pub crf: u8,
    /// kbit/s
    pub video_bitrate: u32,
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlatformPreset {
    TikTok,
    InstagramReels,
    InstagramPost,
    YouTube,
    YouTubeShorts,
    Twitter,
}

impl PlatformPreset {
    pub const ALL: [PlatformPreset; 6] = [
        PlatformPreset::TikTok,
        PlatformPreset::InstagramReels,
        PlatformPreset::InstagramPost,
        PlatformPreset::YouTube,
        PlatformPreset::YouTubeShorts,
        PlatformPreset::Twitter,
    ];

    pub fn options(self) -> ExportOptions {
        let (aspect, frame_rate) = match self {
            PlatformPreset::TikTok | PlatformPreset::InstagramReels => {
                (AspectRatio::Vertical, FrameRate::Fps30)
            }
            PlatformPreset::InstagramPost => (AspectRatio::Square, FrameRate::Fps30),
            PlatformPreset::YouTube => (AspectRatio::Horizontal, FrameRate::Fps60),
            PlatformPreset::YouTubeShorts => (AspectRatio::Vertical, FrameRate::Fps60),
            PlatformPreset::Twitter => (AspectRatio::Horizontal, FrameRate::Fps30),
        };
        ExportOptions {
            quality: ExportQuality::Hd1080p,
            format: ExportFormat::Mp4,
            aspect_ratio: Some(aspect),
            frame_rate,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PlatformPreset::TikTok => "TikTok",
            PlatformPreset::InstagramReels => "Instagram Reels",
            PlatformPreset::InstagramPost => "Instagram Post",
            PlatformPreset::YouTube => "YouTube",
            PlatformPreset::YouTubeShorts => "YouTube Shorts",
            PlatformPreset::Twitter => "Twitter",
        }
    }
}

/// 1080p, timeline framing, 30fps.
pub fn preset_1080p() -> ExportOptions {
    ExportOptions::default()
}

/// 720p, timeline framing, 30fps.
pub fn preset_720p() -> ExportOptions {
    ExportOptions {
        quality: ExportQuality::Hd720p,
        ..ExportOptions::default()
    }
}

/// 4K HEVC, timeline framing, 30fps.
pub fn preset_4k() -> ExportOptions {
    ExportOptions {
        quality: ExportQuality::Uhd4k,
        format: ExportFormat::Hevc,
        ..ExportOptions::default()
    }
}

/// 1080x1920 vertical at 30fps.
pub fn preset_vertical() -> ExportOptions {
    ExportOptions {
        aspect_ratio: Some(AspectRatio::Vertical),
        ..ExportOptions::default()
    }
}
