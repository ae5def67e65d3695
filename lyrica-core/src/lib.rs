pub mod clock;
pub mod config;
pub mod error;
pub mod loader;
pub mod lrc;
pub mod metadata;
pub mod navigator;
pub mod paths;
pub mod source;
pub mod sync;
pub mod time;
pub mod timeline;
pub mod tracker;

pub use clock::{ClockEvent, MediaClock, SimulatedClock};
pub use config::{
    AnimationConfig, ConfigFile, LoggingConfig, LyricaConfig, LyricsSettings, ModeConfig,
    ModeType, CONFIG_TEMPLATE,
};

pub use error::{CoreError, Result};
pub use loader::LyricaLoader;
pub use lrc::{tokenize_line, KaraokeMode, LineToken, LyricText, SubSegment};
pub use metadata::Metadata;
pub use navigator::{GoTo, LyricHit, TimeQuery};
pub use paths::{config_dir, config_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use source::{FileSource, SourceReader};
pub use sync::{SyncEngine, SyncEvent};
pub use time::{DurationExt, Precision, Timestamp};
pub use timeline::{KaraokePosition, SegmentCount, Timeline, TimelineBuilder, TimelineData};
pub use tracker::{
    ActiveChange, ChangeKind, LyricRef, PlaybackCursor, PlaybackTracker, TrackerSettings,
    TrackerState, TrackerUpdate,
};
