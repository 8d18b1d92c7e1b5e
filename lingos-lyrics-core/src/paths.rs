//! Path constants for configuration, cache and log files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "lingos-lyrics";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the lyrics cache database file
pub const LYRICS_CACHE_DB_FILE_NAME: &str = "lyrics_cache.db";

/// The name of the log file written when file logging is enabled
pub const LOG_FILE_NAME: &str = "lingos-lyrics.log";

/// Get the configuration directory path (~/.config/lingos-lyrics/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/lingos-lyrics/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the lyrics cache database path (`~/.config/lingos-lyrics/lyrics_cache.db`)
#[must_use]
pub fn lyrics_cache_db_path() -> PathBuf {
    config_dir().join(LYRICS_CACHE_DB_FILE_NAME)
}

/// Get the log file path (`~/.cache/lingos-lyrics/lingos-lyrics.log`)
#[must_use]
pub fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(config_dir)
        .join(CONFIG_DIR_NAME)
        .join(LOG_FILE_NAME)
}
