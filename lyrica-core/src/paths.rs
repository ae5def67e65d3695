//! Path constants for configuration and log files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "lyrica";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the log file written when `logging.enabled` is set
pub const LOG_FILE_NAME: &str = "lyrica.log";

/// Get the configuration directory path (~/.config/lyrica/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/lyrica/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the log file path (~/.config/lyrica/lyrica.log)
#[must_use]
pub fn log_file_path() -> PathBuf {
    config_dir().join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_config_dir() {
        let dir = config_dir();
        assert!(dir.ends_with(".config/lyrica"));
        assert_eq!(config_path().parent(), Some(dir.as_path()));
        assert_eq!(log_file_path().file_name().and_then(|n| n.to_str()), Some(LOG_FILE_NAME));
    }
}
