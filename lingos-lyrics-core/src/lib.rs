pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fetcher;
pub mod host;
pub mod lrc;
pub mod paths;
pub mod playback;
pub mod provider;
pub mod relay;
pub mod source;
pub mod sync;
pub mod time;

pub use cache::{CachedLyrics, LyricsCache};
pub use config::{
    LingosConfig, LoggingConfig, LyricsConfig, LyricsProviderType, RelayConfig, SourceConfig,
    SourceMode, SyncConfig, CONFIG_TEMPLATE,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use debounce::Debouncer;
pub use error::CoreError;
pub use fetcher::LyricsFetcher;
pub use host::HostEvent;
pub use lrc::{LrcMetadata, LyricEntry, LyricTrack};
pub use paths::{
    config_dir, config_path, log_file_path, lyrics_cache_db_path, CONFIG_DIR_NAME,
    CONFIG_FILE_NAME, LOG_FILE_NAME, LYRICS_CACHE_DB_FILE_NAME,
};
pub use playback::{MetadataField, PlaybackState, SongInfo, SongMetadata};
pub use provider::{FetchedLyrics, LyricsProvider, LyricsQuery};
pub use relay::{LyricsInfo, MetadataInfo, Relay, RelayMessage, RelaySink};
pub use source::PlaybackSource;
pub use sync::{NowPlaying, SyncEngine, SyncEvent};
pub use time::{epoch_millis, DurationExt};
