use crate::error::{CoreError, Result};
use crate::lrc::KaraokeMode;
use crate::tracker::{TrackerSettings, DEFAULT_INCREMENTAL_THRESHOLD_MS, DEFAULT_SEEK_BIAS_MS};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default tick cadence in milliseconds, as written in the config file
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Default number of lines shown around the active one by the slide animation
pub const DEFAULT_SLIDE_WINDOW: usize = 2;

/// Required file suffix for non-raw lyric sources
pub const LRC_EXTENSION: &str = ".lrc";

/// Configuration file as written on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub lyrics: LyricsSettings,
    pub mode: ModeSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsSettings {
    /// Path or URL of the `.lrc` file, or the LRC text itself when `raw` is set
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub raw: bool,
    /// Overrides the `[offset:]` metadata tag when present
    #[serde(default)]
    pub offset_ms: Option<i64>,
    #[serde(default)]
    pub karaoke: KaraokeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeType {
    Sync,
    Print,
    Extract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeSection {
    #[serde(rename = "type")]
    pub kind: ModeType,
    /// Identifier of the media clock (required for sync)
    #[serde(default)]
    pub clock: Option<String>,
    /// Identifier of the render target (required for sync and print)
    #[serde(default)]
    pub container: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_incremental_threshold")]
    pub incremental_threshold_ms: u64,
    #[serde(default = "default_seek_bias")]
    pub seek_bias_ms: u64,
    #[serde(default)]
    pub animation: AnimationSection,
}

const fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

const fn default_incremental_threshold() -> u64 {
    DEFAULT_INCREMENTAL_THRESHOLD_MS
}

const fn default_seek_bias() -> u64 {
    DEFAULT_SEEK_BIAS_MS
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            incremental_threshold_ms: default_incremental_threshold(),
            seek_bias_ms: default_seek_bias(),
            animation: AnimationSection::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnimationType {
    #[default]
    Normal,
    Slide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSection {
    #[serde(rename = "type", default)]
    pub kind: AnimationType,
    #[serde(default)]
    pub auto_scroll: bool,
    #[serde(default = "default_slide_window")]
    pub window: usize,
}

const fn default_slide_window() -> usize {
    DEFAULT_SLIDE_WINDOW
}

impl Default for AnimationSection {
    fn default() -> Self {
        Self {
            kind: AnimationType::default(),
            auto_scroll: false,
            window: default_slide_window(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Also write logs to a file next to the config
    #[serde(default)]
    pub enabled: bool,
}

/// How the renderer presents the active lyric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationConfig {
    Normal,
    Slide { auto_scroll: bool, window: usize },
}

/// Validated run mode with the collaborators it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeConfig {
    Sync {
        clock: String,
        container: String,
        tracking: TrackerSettings,
        animation: AnimationConfig,
    },
    Print {
        container: String,
    },
    Extract,
}

impl ModeConfig {
    #[must_use]
    pub const fn kind(&self) -> ModeType {
        match self {
            Self::Sync { .. } => ModeType::Sync,
            Self::Print { .. } => ModeType::Print,
            Self::Extract => ModeType::Extract,
        }
    }
}

/// Validated configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricaConfig {
    pub lyrics: LyricsSettings,
    pub mode: ModeConfig,
    pub logging: LoggingConfig,
}

impl LyricaConfig {
    /// Load config from `path`, or write a template there on first run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, a closed-set value is
    /// unknown, or a required field for the chosen mode is missing.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::validate(file)
    }

    /// Check a parsed config file and fold it into typed settings.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid or missing field.
    pub fn validate(file: ConfigFile) -> Result<Self> {
        validate_source(&file.lyrics)?;

        let mode = match file.mode.kind {
            ModeType::Extract => ModeConfig::Extract,
            ModeType::Print => ModeConfig::Print {
                container: required_identifier(file.mode.container, "mode.container")?,
            },
            ModeType::Sync => ModeConfig::Sync {
                clock: required_identifier(file.mode.clock, "mode.clock")?,
                container: required_identifier(file.mode.container, "mode.container")?,
                tracking: tracker_settings(&file.sync)?,
                animation: match file.sync.animation.kind {
                    AnimationType::Normal => AnimationConfig::Normal,
                    AnimationType::Slide => AnimationConfig::Slide {
                        auto_scroll: file.sync.animation.auto_scroll,
                        window: file.sync.animation.window,
                    },
                },
            },
        };

        Ok(Self {
            lyrics: file.lyrics,
            mode,
            logging: file.logging,
        })
    }
}

fn validate_source(lyrics: &LyricsSettings) -> Result<()> {
    if lyrics.raw {
        return Ok(());
    }
    if lyrics.source.trim().is_empty() {
        return Err(CoreError::ConfigMissingField {
            field: "lyrics.source".into(),
        });
    }
    if !lyrics.source.ends_with(LRC_EXTENSION) {
        return Err(CoreError::ConfigInvalid {
            message: format!(
                "lyrics.source {:?} should have a valid '{LRC_EXTENSION}' format",
                lyrics.source
            ),
        });
    }
    Ok(())
}

fn required_identifier(value: Option<String>, field: &str) -> Result<String> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::ConfigMissingField {
            field: field.to_string(),
        })?;
    if !value.starts_with(['#', '.']) {
        return Err(CoreError::ConfigInvalid {
            message: format!("{field} {value:?} must start with \"#\" or \".\""),
        });
    }
    Ok(value)
}

fn tracker_settings(sync: &SyncSection) -> Result<TrackerSettings> {
    if sync.tick_interval_ms == 0 {
        return Err(CoreError::ConfigInvalid {
            message: "sync.tick_interval_ms must be greater than zero".into(),
        });
    }
    if sync.incremental_threshold_ms == 0 {
        return Err(CoreError::ConfigInvalid {
            message: "sync.incremental_threshold_ms must be greater than zero".into(),
        });
    }
    Ok(TrackerSettings {
        tick_interval: Duration::from_millis(sync.tick_interval_ms),
        incremental_threshold_ms: sync.incremental_threshold_ms,
        seek_bias_ms: sync.seek_bias_ms,
    })
}

pub const CONFIG_TEMPLATE: &str = concatcp!(
    r##"# Lyrica Configuration
# ~/.config/lyrica/config.toml

[lyrics]
# Path or URL of an .lrc file
source = "song.lrc"
# Set to true to put the LRC text itself in `source`
raw = false
# Optional: shift every lyric by this many milliseconds (overrides [offset:])
# offset_ms = 0
# Word-level <mm:ss.xx> tags: "disabled", "merged", "tracked"
karaoke = "disabled"

[mode]
# "sync", "print" or "extract"
type = "sync"
# Identifiers must start with "#" or "."
clock = "#audio"
container = "#lyrics"

[sync]
tick_interval_ms = "##,
    DEFAULT_TICK_INTERVAL_MS,
    "\nincremental_threshold_ms = ",
    DEFAULT_INCREMENTAL_THRESHOLD_MS,
    "\nseek_bias_ms = ",
    DEFAULT_SEEK_BIAS_MS,
    r##"

[sync.animation]
# "normal" or "slide"
type = "normal"
auto_scroll = false
# Lines shown before and after the active one (slide only)
window = "##,
    DEFAULT_SLIDE_WINDOW,
    r##"

[logging]
# Also write logs to ~/.config/lyrica/lyrica.log
enabled = false
"##
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid_config() {
        let config = LyricaConfig::from_toml_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.lyrics.source, "song.lrc");
        assert_eq!(config.lyrics.karaoke, KaraokeMode::Disabled);
        assert_eq!(
            config.mode,
            ModeConfig::Sync {
                clock: "#audio".into(),
                container: "#lyrics".into(),
                tracking: TrackerSettings::default(),
                animation: AnimationConfig::Normal,
            }
        );
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_extract_needs_no_collaborators() {
        let config = LyricaConfig::from_toml_str(
            r#"
            [lyrics]
            source = "https://example.com/song.lrc"
            [mode]
            type = "extract"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, ModeConfig::Extract);
    }

    #[test]
    fn test_print_requires_container() {
        let err = LyricaConfig::from_toml_str(
            r##"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "print"
            clock = "#audio"
            "##,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ConfigMissingField { field } if field == "mode.container"));
    }

    #[test]
    fn test_sync_requires_clock() {
        let err = LyricaConfig::from_toml_str(
            r##"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "sync"
            container = "#lyrics"
            "##,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ConfigMissingField { field } if field == "mode.clock"));
    }

    #[test]
    fn test_identifier_prefix_enforced() {
        let err = LyricaConfig::from_toml_str(
            r#"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "print"
            container = "lyrics"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));

        let config = LyricaConfig::from_toml_str(
            r#"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "print"
            container = ".lyrics"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.mode,
            ModeConfig::Print {
                container: ".lyrics".into()
            }
        );
    }

    #[test]
    fn test_source_suffix_unless_raw() {
        let err = LyricaConfig::from_toml_str(
            r#"
            [lyrics]
            source = "song.txt"
            [mode]
            type = "extract"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));

        let config = LyricaConfig::from_toml_str(
            r#"
            [lyrics]
            source = "[00:01.00]hello"
            raw = true
            offset_ms = -250
            [mode]
            type = "extract"
            "#,
        )
        .unwrap();
        assert!(config.lyrics.raw);
        assert_eq!(config.lyrics.offset_ms, Some(-250));
    }

    #[test]
    fn test_unknown_values_rejected() {
        let bad_mode = r#"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "karaoke"
            "#;
        assert!(matches!(
            LyricaConfig::from_toml_str(bad_mode),
            Err(CoreError::ConfigParseError(_))
        ));

        let bad_animation = r##"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "sync"
            clock = "#a"
            container = "#b"
            [sync.animation]
            type = "bounce"
            "##;
        assert!(matches!(
            LyricaConfig::from_toml_str(bad_animation),
            Err(CoreError::ConfigParseError(_))
        ));
    }

    #[test]
    fn test_slide_animation_and_tracking() {
        let config = LyricaConfig::from_toml_str(
            r##"
            [lyrics]
            source = "song.lrc"
            karaoke = "tracked"
            [mode]
            type = "sync"
            clock = "#audio"
            container = ".lyrics"
            [sync]
            tick_interval_ms = 25
            [sync.animation]
            type = "slide"
            auto_scroll = true
            window = 4
            "##,
        )
        .unwrap();
        let ModeConfig::Sync {
            tracking,
            animation,
            ..
        } = config.mode
        else {
            panic!("expected sync mode");
        };
        assert_eq!(tracking.tick_interval, Duration::from_millis(25));
        assert_eq!(tracking.incremental_threshold_ms, DEFAULT_INCREMENTAL_THRESHOLD_MS);
        assert_eq!(
            animation,
            AnimationConfig::Slide {
                auto_scroll: true,
                window: 4
            }
        );
        assert_eq!(config.lyrics.karaoke, KaraokeMode::Tracked);
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let err = LyricaConfig::from_toml_str(
            r##"
            [lyrics]
            source = "song.lrc"
            [mode]
            type = "sync"
            clock = "#audio"
            container = "#lyrics"
            [sync]
            tick_interval_ms = 0
            "##,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_load_or_create_writes_template() {
        let dir = std::env::temp_dir().join(format!("lyrica-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = fs::remove_dir_all(&dir);

        let err = LyricaConfig::load_or_create(&path).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);

        let config = LyricaConfig::load_or_create(&path).unwrap();
        assert_eq!(config.mode.kind(), ModeType::Sync);

        fs::remove_dir_all(&dir).unwrap();
    }
}
