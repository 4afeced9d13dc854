use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;

/// On-disk layout of working and persistent artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.uploads_dir().join("videos")
    }

    pub fn audios_dir(&self) -> PathBuf {
        self.uploads_dir().join("audios")
    }

    pub fn subtitles_dir(&self) -> PathBuf {
        self.uploads_dir().join("subtitles")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.uploads_dir().join("thumbnails")
    }

    /// Create every directory of the layout
    pub async fn ensure(&self) -> Result<()> {
        for dir in [
            self.videos_dir(),
            self.audios_dir(),
            self.subtitles_dir(),
            self.thumbnails_dir(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

/// Token that keeps filenames of concurrent jobs apart: a millisecond
/// timestamp followed by a short random suffix.
pub fn unique_token() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", millis, &random[..8])
}

/// File stem of `path` as an owned string, `"media"` when there is none.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "media".to_string())
}

/// Remove a file or directory, logging instead of failing.
///
/// Returns whether the path is gone afterwards.
pub async fn remove_quietly(path: &Path) -> bool {
    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
        Err(e) => {
            warn!("Cannot inspect {} for removal: {}", path.display(), e);
            return false;
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Blocking counterpart of [`remove_quietly`] for use in `Drop`.
pub fn remove_now(path: &Path) -> bool {
    let result = match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// A file that is removed when the guard drops, unless it was kept.
///
/// Covers the paths a stage writes before it knows whether it will succeed,
/// including when the stage's future is dropped part way through.
#[derive(Debug)]
pub struct ScratchPath {
    path: PathBuf,
    armed: bool,
}

impl ScratchPath {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm the guard and hand the path to the caller
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchPath {
    fn drop(&mut self) {
        if self.armed {
            remove_now(&self.path);
        }
    }
}

/// True when `path` is a regular file with at least one byte.
pub async fn is_non_empty_file(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/srv");
        assert_eq!(layout.videos_dir(), PathBuf::from("/srv/uploads/videos"));
        assert_eq!(layout.audios_dir(), PathBuf::from("/srv/uploads/audios"));
        assert_eq!(layout.subtitles_dir(), PathBuf::from("/srv/uploads/subtitles"));
        assert_eq!(layout.thumbnails_dir(), PathBuf::from("/srv/uploads/thumbnails"));
    }

    #[test]
    fn test_unique_tokens_differ() {
        let a = unique_token();
        let b = unique_token();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn test_stem_of() {
        assert_eq!(stem_of(Path::new("/a/b/clip.webm")), "clip");
        assert_eq!(stem_of(Path::new("/")), "media");
    }

    #[tokio::test]
    async fn test_ensure_and_remove_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.ensure().await.unwrap();
        assert!(layout.thumbnails_dir().is_dir());

        let file = layout.audios_dir().join("a.wav");
        std::fs::write(&file, b"RIFF").unwrap();
        assert!(is_non_empty_file(&file).await);
        assert!(remove_quietly(&file).await);
        assert!(!file.exists());

        // Already gone counts as removed
        assert!(remove_quietly(&file).await);
        assert!(remove_quietly(&layout.uploads_dir()).await);
        assert!(!layout.uploads_dir().exists());
    }

    #[test]
    fn test_scratch_path_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join("dropped.wav");
        let kept = dir.path().join("kept.wav");
        std::fs::write(&dropped, b"x").unwrap();
        std::fs::write(&kept, b"x").unwrap();

        drop(ScratchPath::new(&dropped));
        assert_eq!(ScratchPath::new(&kept).keep(), kept);

        assert!(!dropped.exists());
        assert!(kept.exists());
        assert!(remove_now(&dropped));
        assert!(remove_now(dir.path()));
        assert!(!dir.path().exists());
    }
}
