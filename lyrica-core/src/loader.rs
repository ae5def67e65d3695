//! Resolve the configured lyric source into a [`Timeline`].

use crate::config::LyricsSettings;
use crate::error::Result;
use crate::source::SourceReader;
use crate::timeline::Timeline;
use std::sync::Arc;
use tracing::info;

const LOG_TARGET: &str = "lyrica::loader";

/// Loads timelines for one set of lyric settings through a [`SourceReader`].
pub struct LyricaLoader {
    settings: LyricsSettings,
    reader: Arc<dyn SourceReader>,
}

impl LyricaLoader {
    #[must_use]
    pub fn new(settings: LyricsSettings, reader: Arc<dyn SourceReader>) -> Self {
        Self { settings, reader }
    }

    #[must_use]
    pub const fn settings(&self) -> &LyricsSettings {
        &self.settings
    }

    /// Raw LRC text: `source` itself when `raw` is set, otherwise fetched.
    ///
    /// # Errors
    ///
    /// Returns the reader's source error if fetching fails.
    pub async fn source_text(&self) -> Result<String> {
        if self.settings.raw {
            return Ok(self.settings.source.clone());
        }
        info!(
            target: LOG_TARGET,
            "Fetching lyrics from {} via {} reader",
            self.settings.source,
            self.reader.name()
        );
        self.reader.fetch_text(&self.settings.source).await
    }

    /// Fetch (if needed), tokenize and build the timeline.
    ///
    /// # Errors
    ///
    /// Returns the reader's source error if fetching fails. Malformed lines
    /// are skipped, never errors.
    pub async fn load(&self) -> Result<Timeline> {
        let text = self.source_text().await?;
        Ok(self.parse(&text))
    }

    /// Build a timeline from already-available text using these settings.
    #[must_use]
    pub fn parse(&self, text: &str) -> Timeline {
        Timeline::parse(text, self.settings.karaoke, self.settings.offset_ms)
    }
}

impl std::fmt::Debug for LyricaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LyricaLoader")
            .field("settings", &self.settings)
            .field("reader", &self.reader.name())
            .finish()
    }
}
