use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::export::ExportArtifact;
use crate::options::PlatformPreset;

/// Where a finished export should end up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShareTarget {
    Gallery,
    Platform(PlatformPreset),
}

impl ShareTarget {
    fn folder(self) -> &'static str {
        match self {
            ShareTarget::Gallery => "gallery",
            ShareTarget::Platform(PlatformPreset::TikTok) => "tiktok",
            ShareTarget::Platform(PlatformPreset::InstagramReels) => "instagram_reels",
            ShareTarget::Platform(PlatformPreset::InstagramPost) => "instagram_post",
            ShareTarget::Platform(PlatformPreset::YouTube) => "youtube",
            ShareTarget::Platform(PlatformPreset::YouTubeShorts) => "youtube_shorts",
            ShareTarget::Platform(PlatformPreset::Twitter) => "twitter",
        }
    }
}

/// Takes ownership of an exported file and delivers it.
///
/// Returns the location the file was delivered to. The artifact is consumed
/// either way, so a failed delivery still removes the scratch file.
pub trait ShareSink {
    fn deliver(&self, artifact: ExportArtifact, target: ShareTarget) -> Result<PathBuf>;
}

/// Delivers exports into `<root>/<target>/` on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShareSink for DirectorySink {
    fn deliver(&self, artifact: ExportArtifact, target: ShareTarget) -> Result<PathBuf> {
        let ext = artifact
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let dest = self
            .root
            .join(target.folder())
            .join(format!("clipcraft-{}.{ext}", Uuid::new_v4()));
        artifact.persist(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExportFormat;

    fn artifact_in(dir: &Path, format: ExportFormat) -> ExportArtifact {
        let artifact = ExportArtifact::create_in(dir, format).unwrap();
        std::fs::write(artifact.path(), b"video").unwrap();
        artifact
    }

    #[test]
    fn gallery_delivery_lands_under_gallery() {
        let scratch = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(shared.path());

        let dest = sink
            .deliver(artifact_in(scratch.path(), ExportFormat::Mp4), ShareTarget::Gallery)
            .unwrap();
        assert!(dest.starts_with(shared.path().join("gallery")));
        assert_eq!(dest.extension().unwrap(), "mp4");
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[test]
    fn platform_delivery_keeps_container_extension() {
        let scratch = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(shared.path());

        let dest = sink
            .deliver(
                artifact_in(scratch.path(), ExportFormat::Mov),
                ShareTarget::Platform(PlatformPreset::YouTubeShorts),
            )
            .unwrap();
        assert!(dest.starts_with(shared.path().join("youtube_shorts")));
        assert_eq!(dest.extension().unwrap(), "mov");
    }

    #[test]
    fn repeated_deliveries_do_not_collide() {
        let scratch = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(shared.path());

        let a = sink
            .deliver(artifact_in(scratch.path(), ExportFormat::Mp4), ShareTarget::Gallery)
            .unwrap();
        let b = sink
            .deliver(artifact_in(scratch.path(), ExportFormat::Mp4), ShareTarget::Gallery)
            .unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }
}
