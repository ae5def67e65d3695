//! Lyrics source readers.

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

const LOG_TARGET: &str = "lyrica::source";

/// Trait for readers that supply raw LRC text for a location.
///
/// The location is reader-specific: a filesystem path for [`FileSource`],
/// a URL for the HTTP reader. Reading is the only suspending step before a
/// timeline is built; a failure leaves any previously built timeline
/// untouched.
///
/// # Example
///
/// ```ignore
/// let text = FileSource::default().fetch_text("song.lrc").await?;
/// let timeline = Timeline::parse(&text, KaraokeMode::Disabled, None);
/// ```
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Returns a human-readable name for this reader.
    fn name(&self) -> &'static str;

    /// Fetch the full text at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SourceRead`] (or another source error) if the
    /// text cannot be read.
    async fn fetch_text(&self, location: &str) -> Result<String>;
}

/// Reads LRC files from the local filesystem, optionally relative to a
/// base directory.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    base_dir: Option<PathBuf>,
}

impl FileSource {
    /// Resolve relative locations against `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = PathBuf::from(location);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl SourceReader for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_text(&self, location: &str) -> Result<String> {
        let path = self.resolve(location);
        debug!(target: LOG_TARGET, "Reading lyrics from {}", path.display());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CoreError::SourceRead {
                location: location.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_file_relative_to_base() {
        let dir = std::env::temp_dir().join(format!("lyrica-source-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("song.lrc"), "[00:01.00]hi")
            .await
            .unwrap();

        let reader = FileSource::with_base_dir(&dir);
        let text = reader.fetch_text("song.lrc").await.unwrap();
        assert_eq!(text, "[00:01.00]hi");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_source_read_error() {
        let reader = FileSource::default();
        let err = reader
            .fetch_text("/definitely/not/here/song.lrc")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SourceRead { .. }));
        assert!(err.is_source_error());
    }
}
