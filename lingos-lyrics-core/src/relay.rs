//! Relays lyric and metadata changes to external consumers.
//!
//! Every `LyricChanged` event becomes a [`LyricsInfo`] message and every
//! settled `MetadataChanged` event a [`MetadataInfo`] message. Messages go to
//! each configured [`RelaySink`] in order.

use crate::error::Result;
use crate::playback::SongMetadata;
use crate::sync::{SyncEngine, SyncEvent};
use crate::time::epoch_millis;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lingos_lyrics::relay";

/// Sent in place of the next line after the last lyric
pub const END_MARKER: &str = "end";

/// The current lyric line and the one after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsInfo {
    pub lyric_text: String,
    pub next_lyric: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

impl LyricsInfo {
    #[must_use]
    pub fn new(current: Option<&str>, next: Option<&str>) -> Self {
        let next_lyric = next
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .unwrap_or(END_MARKER);

        Self {
            lyric_text: current.unwrap_or_default().to_string(),
            next_lyric: next_lyric.to_string(),
            timestamp: epoch_millis(),
        }
    }
}

/// Display metadata of the current song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataInfo {
    pub artist_name: String,
    pub song_name: String,
    pub album_name: String,
    pub cover_url: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

impl From<&SongMetadata> for MetadataInfo {
    fn from(metadata: &SongMetadata) -> Self {
        Self {
            artist_name: metadata.artist.clone().unwrap_or_default(),
            song_name: metadata.song_name.clone().unwrap_or_default(),
            album_name: metadata.album.clone().unwrap_or_default(),
            cover_url: metadata.cover_url.clone().unwrap_or_default(),
            timestamp: epoch_millis(),
        }
    }
}

/// A message delivered to relay sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayMessage {
    Lyrics(LyricsInfo),
    Metadata(MetadataInfo),
}

impl RelayMessage {
    /// Translate an engine event; events with no external counterpart yield `None`
    #[must_use]
    pub fn from_event(event: &SyncEvent) -> Option<Self> {
        match event {
            SyncEvent::LyricChanged { current, next, .. } => Some(Self::Lyrics(LyricsInfo::new(
                current.first().map(String::as_str),
                next.as_deref(),
            ))),
            SyncEvent::MetadataChanged(metadata) => Some(Self::Metadata(metadata.into())),
            _ => None,
        }
    }
}

/// Destination for relayed messages
#[async_trait]
pub trait RelaySink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver one message
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered. The relay logs it
    /// and keeps going.
    async fn send(&self, message: &RelayMessage) -> Result<()>;
}

#[derive(Debug, Default)]
struct LastMessages {
    lyrics: Option<LyricsInfo>,
    metadata: Option<MetadataInfo>,
}

/// Forwards engine events to relay sinks
pub struct Relay {
    sync_engine: Arc<SyncEngine>,
    sinks: Vec<Box<dyn RelaySink>>,
    last: Mutex<LastMessages>,
    cancel_token: CancellationToken,
}

impl Relay {
    pub fn new(
        sync_engine: Arc<SyncEngine>,
        sinks: Vec<Box<dyn RelaySink>>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            sync_engine,
            sinks,
            last: Mutex::new(LastMessages::default()),
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the relay in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let sink_names: Vec<_> = self.sinks.iter().map(|s| s.name()).collect();
        info!(target: LOG_TARGET, "Relaying lyrics to sinks: {:?}", sink_names);

        let mut rx = self.sync_engine.subscribe();

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: LOG_TARGET, "Relay shutting down");
                    break;
                }
                event = rx.recv() => {
                    match event {
                        Ok(event) => {
                            if let Some(message) = RelayMessage::from_event(&event) {
                                self.dispatch(message).await;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(target: LOG_TARGET, "Relay lagged, skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    }

    /// Remember `message` and deliver it to every sink
    pub async fn dispatch(&self, message: RelayMessage) {
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            match &message {
                RelayMessage::Lyrics(info) => last.lyrics = Some(info.clone()),
                RelayMessage::Metadata(info) => last.metadata = Some(info.clone()),
            }
        }

        debug!(target: LOG_TARGET, "Relaying {:?}", message);
        for sink in &self.sinks {
            if let Err(e) = sink.send(&message).await {
                warn!(target: LOG_TARGET, "Relay sink {} failed: {}", sink.name(), e);
            }
        }
    }

    /// Last lyrics message sent
    #[must_use]
    pub fn last_lyrics(&self) -> Option<LyricsInfo> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lyrics
            .clone()
    }

    /// Last metadata message sent
    #[must_use]
    pub fn last_metadata(&self) -> Option<MetadataInfo> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .metadata
            .clone()
    }
}
