use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Video,
    Audio,
    Subtitle,
    Thumbnail,
}

/// A file produced by one pipeline stage
#[derive(Debug, Clone, Serialize)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Container or format, taken from the file extension
    pub container: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MediaArtifact {
    pub fn new<P: Into<PathBuf>>(path: P, kind: ArtifactKind) -> Self {
        let path = path.into();
        let container = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase());

        Self {
            path,
            kind,
            container,
            created_at: Utc::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_from_extension() {
        let artifact = MediaArtifact::new("/tmp/clip_1.WAV", ArtifactKind::Audio);
        assert_eq!(artifact.container.as_deref(), Some("wav"));
        assert_eq!(artifact.kind, ArtifactKind::Audio);

        let bare = MediaArtifact::new("/tmp/noext", ArtifactKind::Subtitle);
        assert_eq!(bare.container, None);
    }
}
