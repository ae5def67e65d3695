use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please edit it and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Timing errors
    #[error("Invalid timestamp: {input:?}")]
    TimestampParse { input: String },

    // Source errors
    #[error("Failed to read lyrics source {location}: {source}")]
    SourceRead {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lyrics source {location} returned status {status}")]
    SourceStatus { location: String, status: u16 },

    #[error("Failed to fetch lyrics source {location}: {reason}")]
    SourceFetch { location: String, reason: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error came from reading the lyrics source rather than
    /// from configuration or parsing.
    #[must_use]
    pub const fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::SourceRead { .. } | Self::SourceStatus { .. } | Self::SourceFetch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_are_classified() {
        let err = CoreError::SourceRead {
            location: "song.lrc".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.is_source_error());
        assert!(err.to_string().contains("song.lrc"));

        let err = CoreError::ConfigMissingField {
            field: "mode.clock".into(),
        };
        assert!(!err.is_source_error());
    }
}
