mod cli;
mod local;
mod sinks;
mod sources;

use crate::cli::Args;
use crate::local::LrcFileProvider;
use crate::sinks::{JsonLinesSink, WebhookSink};
use crate::sources::{mock_track, HostEventSource, MockSource};
use clap::Parser;
use lingos_lyrics_core::{
    CoreError, LingosConfig, LyricsCache, LyricsFetcher, LyricsProvider,
    LyricsProviderType, PlaybackSource, Relay, RelaySink, SourceMode, SyncEngine, SyncEvent,
    CONFIG_TEMPLATE,
};
use lingos_lyrics_qqmusic::QqMusicProvider;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let args = Args::parse();

    if args.generate_config {
        print!("{CONFIG_TEMPLATE}");
        return;
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(LingosConfig::config_path);

    // Check config for logging.enabled before full config load
    init_tracing(check_file_logging_enabled(&config_path));

    let mut config = match LingosConfig::load_or_create_at(&config_path) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created a configuration file at {}. Review it and run again.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!("Failed to load config {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };
    if args.mock {
        config.source.mode = SourceMode::Mock;
    }

    let local_lyrics = match args.lrc.as_deref().map(LrcFileProvider::open).transpose() {
        Ok(local) => local,
        Err(e) => {
            error!("Failed to load lyric file: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(run(config, local_lyrics));

    // A blocking stdin read may still be pending
    runtime.shutdown_timeout(Duration::from_secs(1));
}

async fn run(config: LingosConfig, local_lyrics: Option<LrcFileProvider>) {
    let sync_engine = SyncEngine::with_metadata_debounce(config.sync.metadata_debounce());

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let relay = Arc::new(Relay::new(
        Arc::clone(&sync_engine),
        create_sinks(&config),
        Some(cancel_token.clone()),
    ));
    let mut handles = vec![
        Arc::clone(&relay).start(),
        tokio::spawn(log_sync_events(Arc::clone(&sync_engine), cancel_token.clone())),
    ];

    let mut cache = None;
    let source: Box<dyn PlaybackSource> = match config.source.mode {
        SourceMode::Mock => {
            let track = local_lyrics.map_or_else(mock_track, |local| local.track().clone());
            Box::new(MockSource::new(
                Arc::clone(&sync_engine),
                track,
                config.source.mock_tick(),
                cancel_token.clone(),
            ))
        }
        SourceMode::Stdin => {
            let providers: Vec<Box<dyn LyricsProvider>> = match local_lyrics {
                Some(local) => vec![Box::new(local)],
                None => {
                    cache = open_cache(&config).await;
                    create_providers(&config)
                }
            };

            let provider_names: Vec<_> = providers.iter().map(|p| p.name()).collect();
            info!(
                "Initialized {} lyrics provider(s): {:?}",
                providers.len(),
                provider_names
            );

            let lyrics_fetcher = Arc::new(LyricsFetcher::new(
                Arc::clone(&sync_engine),
                cache.clone(),
                providers,
                Some(cancel_token.clone()),
            ));
            handles.push(lyrics_fetcher.start());

            Box::new(HostEventSource::stdin(
                Arc::clone(&sync_engine),
                cancel_token.clone(),
            ))
        }
    };

    info!("Starting playback source: {}", source.name());
    if let Err(e) = source.run().await {
        error!("Playback source {} failed: {}", source.name(), e);
    }
    cancel_token.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    if let Some(cache) = cache {
        if let Err(e) = cache.checkpoint().await {
            warn!("Failed to checkpoint lyrics cache: {}", e);
        }
    }
    info!("Shut down");
}

/// Open the lyrics cache and drop expired entries
async fn open_cache(config: &LingosConfig) -> Option<Arc<LyricsCache>> {
    if !config.lyrics.cache_enabled {
        return None;
    }

    match LyricsCache::new().await {
        Ok(cache) => {
            match cache.cleanup(config.lyrics.cache_ttl_days).await {
                Ok(0) => {}
                Ok(deleted) => info!("Removed {} expired lyrics from cache", deleted),
                Err(e) => warn!("Failed to clean up lyrics cache: {}", e),
            }
            Some(Arc::new(cache))
        }
        Err(e) => {
            error!("Failed to initialize lyrics cache, continuing without it: {}", e);
            None
        }
    }
}

fn create_providers(config: &LingosConfig) -> Vec<Box<dyn LyricsProvider>> {
    config
        .lyrics
        .providers
        .iter()
        .filter_map(|provider_type| -> Option<Box<dyn LyricsProvider>> {
            match provider_type {
                LyricsProviderType::QqMusic => {
                    info!("Initializing QQ Music provider");
                    match QqMusicProvider::new() {
                        Ok(provider) => Some(Box::new(provider)),
                        Err(e) => {
                            error!("Failed to create QQ Music provider: {}", e);
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

fn create_sinks(config: &LingosConfig) -> Vec<Box<dyn RelaySink>> {
    let mut sinks: Vec<Box<dyn RelaySink>> = Vec::new();

    if config.relay.stdout {
        sinks.push(Box::new(JsonLinesSink::stdout()));
    }
    if let Some(url) = &config.relay.webhook_url {
        match WebhookSink::new(url.as_str()) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(e) => error!("Failed to create webhook sink: {}", e),
        }
    }

    sinks
}

/// Log sync events to the console
async fn log_sync_events(sync_engine: Arc<SyncEngine>, cancel_token: CancellationToken) {
    let mut rx = sync_engine.subscribe();

    loop {
        let event = tokio::select! {
            () = cancel_token.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(event) => match &event {
                SyncEvent::SongChanged { song } => {
                    info!("Song changed: {}", song.label());
                }
                SyncEvent::LyricsLoaded { track } => {
                    info!("Lyrics loaded: {} entries", track.len());
                }
                SyncEvent::LyricsNotFound => {
                    info!("No lyrics found for current song");
                }
                SyncEvent::LyricChanged { .. } | SyncEvent::MetadataChanged(_) => {
                    // Relayed to sinks
                }
                SyncEvent::Error { message } => {
                    error!("Sync error: {}", message);
                }
            },
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                info!("Sync event channel closed");
                break;
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                info!("Missed {} sync events", n);
            }
        }
    }
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled(config_path: &Path) -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing on stderr with optional file logging.
/// Stdout is reserved for relayed messages.
fn init_tracing(file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path: PathBuf = lingos_lyrics_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
