//! Lyrics fetcher that orchestrates multiple lyrics providers.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::LyricsCache;
use crate::lrc::LyricTrack;
use crate::playback::SongInfo;
use crate::provider::{LyricsProvider, LyricsQuery};
use crate::sync::{SyncEngine, SyncEvent};

const LOG_TARGET: &str = "lingos_lyrics::fetcher";

/// Lyrics fetcher that listens for song changes and fetches lyrics
pub struct LyricsFetcher {
    sync_engine: Arc<SyncEngine>,
    cache: Option<Arc<LyricsCache>>,
    providers: Vec<Box<dyn LyricsProvider>>,
    cancel_token: CancellationToken,
}

impl LyricsFetcher {
    /// Create a new lyrics fetcher
    ///
    /// # Arguments
    /// * `sync_engine` - Sync engine to listen for song changes
    /// * `cache` - Lyrics cache, or `None` to always ask the providers
    /// * `providers` - List of lyrics providers to try in order
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        sync_engine: Arc<SyncEngine>,
        cache: Option<Arc<LyricsCache>>,
        providers: Vec<Box<dyn LyricsProvider>>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            sync_engine,
            cache,
            providers,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the lyrics fetcher in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the lyrics fetching loop
    async fn run(&self) {
        info!(target: LOG_TARGET, "Initializing lyrics fetching handler");

        let mut rx = self.sync_engine.subscribe();

        if let Some(song) = self.sync_engine.current_song().await {
            if self.sync_engine.track().await.is_none() {
                info!(
                    target: LOG_TARGET,
                    "Found existing song on startup: {}, fetching lyrics",
                    song.label()
                );
                self.fetch_lyrics_for_song(&song).await;
            }
        }

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: LOG_TARGET, "Lyrics fetcher shutting down");
                    break;
                }
                event = rx.recv() => {
                    match event {
                        Ok(SyncEvent::SongChanged { song }) => {
                            self.fetch_lyrics_for_song(&song).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: LOG_TARGET,
                                "Lyrics fetcher lagged, skipped {} events", skipped
                            );
                            self.resync_after_lag().await;
                        }
                        Err(RecvError::Closed) => {
                            break;
                        }
                        Ok(_) => {}
                    }
                }
            }
        }
    }

    /// A skipped `SongChanged` leaves the current song without lyrics
    async fn resync_after_lag(&self) {
        let Some(song) = self.sync_engine.current_song().await else {
            return;
        };
        if self.sync_engine.track().await.is_none() {
            info!(target: LOG_TARGET, "Fetching lyrics missed while lagging: {}", song.label());
            self.fetch_lyrics_for_song(&song).await;
        }
    }

    /// Fetch lyrics for a song and hand them to the sync engine
    pub async fn fetch_lyrics_for_song(&self, song: &SongInfo) {
        let provider_names: Vec<_> = self.providers.iter().map(|p| p.name()).collect();
        info!(
            target: LOG_TARGET,
            "Fetching lyrics for: {} (mid: {:?}, providers: {:?})",
            song.label(),
            song.song_mid,
            provider_names
        );

        let query = LyricsQuery::from_song(song);

        if let Some(track) = self.cached_track(&query).await {
            info!(target: LOG_TARGET, "Using cached lyrics for {}", song.label());
            self.sync_engine.set_track_for(song, track).await;
            return;
        }

        for provider in &self.providers {
            info!(target: LOG_TARGET, "Trying provider: {}", provider.name());
            match provider.fetch(&query).await {
                Ok(fetched) => {
                    if !fetched.is_found() {
                        info!(target: LOG_TARGET, "Provider {} returned no lyrics", provider.name());
                        continue;
                    }
                    let Some(track) = fetched.track else {
                        continue;
                    };

                    info!(
                        target: LOG_TARGET,
                        "Found lyrics from {} ({} entries, provider_id: {})",
                        provider.name(),
                        track.len(),
                        fetched.provider_id
                    );

                    self.store(&query, song, provider.name(), &fetched.provider_id, &track)
                        .await;
                    self.sync_engine.set_track_for(song, track).await;
                    return;
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Provider {} failed with error: {}", provider.name(), e);
                }
            }
        }

        info!(
            target: LOG_TARGET,
            "No lyrics found for {} (tried {} providers: {:?})",
            song.label(),
            self.providers.len(),
            provider_names
        );

        if !self.sync_engine.state().await.song_changed(song) {
            self.sync_engine.set_no_lyrics().await;
        }
    }

    async fn cached_track(&self, query: &LyricsQuery) -> Option<LyricTrack> {
        let cache = self.cache.as_ref()?;
        let song_mid = query.song_mid()?;

        match cache.get(song_mid).await {
            Ok(Some(cached)) => Some(cached.to_track()).filter(|track| !track.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read lyrics cache: {}", e);
                None
            }
        }
    }

    async fn store(
        &self,
        query: &LyricsQuery,
        song: &SongInfo,
        provider: &str,
        provider_id: &str,
        track: &LyricTrack,
    ) {
        let (Some(cache), Some(song_mid)) = (self.cache.as_ref(), query.song_mid()) else {
            return;
        };

        if let Err(e) = cache
            .store(song_mid, provider, provider_id, track, &song.metadata())
            .await
        {
            warn!(target: LOG_TARGET, "Failed to cache lyrics: {}", e);
        }
    }
}
