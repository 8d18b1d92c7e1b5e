use crate::error::{CoreError, Result};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default quiet window for coalescing metadata updates
pub const DEFAULT_METADATA_DEBOUNCE_MS: u64 = 80;

/// Default clock tick of the mock playback source
pub const DEFAULT_MOCK_TICK_MS: u64 = 100;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LingosConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where playback events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// JSON-lines host events on stdin
    #[default]
    Stdin,
    /// Built-in looping mock song
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub mode: SourceMode,
    #[serde(default = "default_mock_tick")]
    pub mock_tick_ms: u64,
}

const fn default_mock_tick() -> u64 {
    DEFAULT_MOCK_TICK_MS
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::default(),
            mock_tick_ms: default_mock_tick(),
        }
    }
}

impl SourceConfig {
    #[must_use]
    pub const fn mock_tick(&self) -> Duration {
        Duration::from_millis(self.mock_tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_metadata_debounce")]
    pub metadata_debounce_ms: u64,
}

const fn default_metadata_debounce() -> u64 {
    DEFAULT_METADATA_DEBOUNCE_MS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            metadata_debounce_ms: default_metadata_debounce(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn metadata_debounce(&self) -> Duration {
        Duration::from_millis(self.metadata_debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Provider priority: providers are tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<LyricsProviderType>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_days: u32,
}

fn default_providers() -> Vec<LyricsProviderType> {
    vec![LyricsProviderType::QqMusic]
}

const fn default_true() -> bool {
    true
}

const fn default_cache_ttl() -> u32 {
    30
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            cache_enabled: default_true(),
            cache_ttl_days: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsProviderType {
    QqMusic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Print relayed messages as JSON lines on stdout
    #[serde(default = "default_true")]
    pub stdout: bool,
    /// POST relayed messages to this URL
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stdout: default_true(),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file in the cache directory
    #[serde(default)]
    pub enabled: bool,
}

impl LingosConfig {
    /// Get the configuration directory path (~/.config/lingos-lyrics/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/lingos-lyrics/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location or create a template on first run
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the
    /// file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `path` or create a template there on first run
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the
    /// file cannot be read, parsed or validated.
    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::write_template(path)?;
            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        Self::load_from(path)
    }

    /// Load and validate config from `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config template to `path`, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, CONFIG_TEMPLATE)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        // --mock can switch modes after loading, so check the tick in every mode
        if self.source.mock_tick_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "source.mock_tick_ms must be greater than 0".into(),
            });
        }
        if let Some(url) = &self.relay.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("relay.webhook_url must be an http(s) URL, got {url:?}"),
                });
            }
        }
        Ok(())
    }
}

/// Config file written on first run
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# Lingos Lyrics Configuration
# ~/.config/lingos-lyrics/config.toml

[source]
# Where playback events come from: "stdin" (JSON-lines host events) or "mock"
mode = "stdin"
mock_tick_ms = "#,
    DEFAULT_MOCK_TICK_MS,
    r#"

[sync]
# Song name, artist, album and cover updates within this window are sent once
metadata_debounce_ms = "#,
    DEFAULT_METADATA_DEBOUNCE_MS,
    r#"

[lyrics]
# Providers are tried in order; first result with timed lines wins
providers = ["qq_music"]
cache_enabled = true
cache_ttl_days = 30

[relay]
# Print lyric and metadata messages as JSON lines
stdout = true
# Optional: POST the same messages to a local endpoint
# webhook_url = "http://127.0.0.1:8080/lyrics"

[logging]
# Write logs to ~/.cache/lingos-lyrics/lingos-lyrics.log as well as stderr
enabled = false
"#
);
