//! Video library: playable files in one directory
//!
//! Entries are ordered by file name so that ordinals shown by `/video list`
//! stay stable between calls. Ordinals are 1-based.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::debug;

use crate::{PlayerError, Result};

/// File extensions recognized as videos, compared case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// One playable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoEntry {
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    pub modified: SystemTime,
}

/// Directory of playable videos.
#[derive(Debug, Clone)]
pub struct VideoLibrary {
    root: PathBuf,
}

impl VideoLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the library directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PlayerError::file_error(self.root.clone(), e))
    }

    /// List videos ordered by file name. A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<VideoEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Video directory {} does not exist", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(PlayerError::file_error(self.root.clone(), e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) =
            dir.next_entry().await.map_err(|e| PlayerError::file_error(self.root.clone(), e))?
        {
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_video(&filename) {
                continue;
            }

            let metadata =
                entry.metadata().await.map_err(|e| PlayerError::file_error(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }

            entries.push(VideoEntry {
                filename,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    /// Entry at 1-based position `index` in [`VideoLibrary::list`] order.
    pub async fn by_index(&self, index: usize) -> Result<Option<VideoEntry>> {
        if index == 0 {
            return Ok(None);
        }
        Ok(self.list().await?.into_iter().nth(index - 1))
    }

    /// Path of an existing video inside the library.
    ///
    /// Names that would escape the library directory are rejected as not found.
    pub async fn resolve(&self, name: &str) -> Result<PathBuf> {
        let not_found = || PlayerError::VideoNotFound { name: name.to_string() };

        let relative = Path::new(name);
        let contained = !name.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(not_found());
        }

        let path = self.root.join(relative);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(not_found()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(PlayerError::file_error(path, e)),
        }
    }
}

/// Whether a file name carries one of [`VIDEO_EXTENSIONS`].
pub fn is_video(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
