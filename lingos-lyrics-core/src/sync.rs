use crate::debounce::Debouncer;
use crate::host::HostEvent;
use crate::lrc::LyricTrack;
use crate::playback::{MetadataField, PlaybackState, SongInfo, SongMetadata};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info};

const LOG_TARGET: &str = "lingos_lyrics::sync";

/// Quiet window that coalesces one song change's field updates into one event
pub const DEFAULT_METADATA_DEBOUNCE: Duration = Duration::from_millis(80);

/// Events emitted by the sync engine
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The host switched to a different song
    SongChanged { song: SongInfo },
    /// Lyrics were loaded for the current song
    LyricsLoaded { track: Arc<LyricTrack> },
    /// No lyrics found for the current song
    LyricsNotFound,
    /// The active lyric entry changed
    LyricChanged {
        index: usize,
        /// Lines of the active entry (original, then translation)
        current: Vec<String>,
        /// Next upcoming original line
        next: Option<String>,
    },
    /// Song display metadata settled after a burst of field updates
    MetadataChanged(SongMetadata),
    /// Error occurred
    Error { message: String },
}

/// The currently displayed lyric and the one after it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    pub index: Option<usize>,
    pub current: Vec<String>,
    pub next: Option<String>,
}

impl NowPlaying {
    /// Original line of the active entry
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.current.first().map(String::as_str)
    }

    /// Translation of the active entry
    #[must_use]
    pub fn translation(&self) -> Option<&str> {
        self.current.get(1).map(String::as_str)
    }
}

/// Sync engine state
#[derive(Default)]
struct SyncEngineInner {
    state: PlaybackState,
    track: Option<Arc<LyricTrack>>,
    active_index: Option<usize>,
}

/// Engine that maps playback position onto the active lyric entry.
///
/// All position updates go through one write lock, so the active index is
/// recomputed by a single writer at a time.
pub struct SyncEngine {
    inner: RwLock<SyncEngineInner>,
    metadata: Arc<Mutex<SongMetadata>>,
    metadata_debouncer: Debouncer,
    now_playing: watch::Sender<NowPlaying>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine with the default metadata quiet window
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a sync engine with a custom metadata quiet window
    #[must_use]
    pub fn with_metadata_debounce(quiet_period: Duration) -> Arc<Self> {
        Arc::new(Self::build(quiet_period))
    }

    fn build(quiet_period: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let (now_playing, _) = watch::channel(NowPlaying::default());

        Self {
            inner: RwLock::new(SyncEngineInner::default()),
            metadata: Arc::new(Mutex::new(SongMetadata::default())),
            metadata_debouncer: Debouncer::new(quiet_period),
            now_playing,
            event_tx,
        }
    }

    /// Subscribe to sync events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the current and next lyric lines
    pub fn watch_now_playing(&self) -> watch::Receiver<NowPlaying> {
        self.now_playing.subscribe()
    }

    /// Snapshot of the current and next lyric lines
    #[must_use]
    pub fn now_playing(&self) -> NowPlaying {
        self.now_playing.borrow().clone()
    }

    /// Apply one event from the host player
    pub async fn apply_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::SongInfo { raw } => {
                debug!(target: LOG_TARGET, "Host song info: {}", raw);
                self.song_changed(SongInfo::from_host_string(&raw)).await;
            }
            HostEvent::Song(song) => self.song_changed(song).await,
            HostEvent::Progress { current, total } => {
                self.set_duration(total).await;
                self.update_position(current).await;
            }
        }
    }

    /// Update the playback position and emit a lyric change if the active entry moved
    pub async fn update_position(&self, position_ms: u64) {
        let mut inner = self.inner.write().await;
        inner.state.set_position(position_ms);
        self.recompute(&mut inner);
    }

    async fn set_duration(&self, duration_ms: u64) {
        self.inner.write().await.state.duration_ms = duration_ms;
    }

    fn recompute(&self, inner: &mut SyncEngineInner) {
        let Some(track) = inner.track.clone() else {
            return;
        };
        let position_ms = inner.state.position_ms;
        let Some(index) = track.active_index(position_ms) else {
            return;
        };

        if inner.active_index == Some(index) {
            return;
        }
        inner.active_index = Some(index);

        let current = track
            .entry(index)
            .map(|entry| entry.lines.clone())
            .unwrap_or_default();
        let next = track.next_primary_after(index).map(str::to_string);

        debug!(
            target: LOG_TARGET,
            "Lyric index {} at {}ms: {:?}", index, position_ms, current
        );

        self.now_playing.send_replace(NowPlaying {
            index: Some(index),
            current: current.clone(),
            next: next.clone(),
        });
        let _ = self.event_tx.send(SyncEvent::LyricChanged {
            index,
            current,
            next,
        });
    }

    /// Handle a song info report from the host.
    ///
    /// A different song clears the current lyrics, rewinds the position and
    /// emits `SongChanged`; the display fields always go through the debounced
    /// metadata path.
    pub async fn song_changed(&self, song: SongInfo) {
        {
            let mut inner = self.inner.write().await;
            if inner.state.song_changed(&song) {
                info!(target: LOG_TARGET, "Song changed: {}", song.label());
                Self::clear_lyrics(&mut inner);
                inner.state.set_position(0);
                inner.state.duration_ms = 0;
                self.now_playing.send_replace(NowPlaying::default());
                let _ = self.event_tx.send(SyncEvent::SongChanged { song: song.clone() });
            }
            inner.state.song = Some(song.clone());
        }

        let metadata = song.metadata();
        self.set_song_name(metadata.song_name);
        self.set_artist(metadata.artist);
        self.set_album(metadata.album);
        self.set_cover_url(metadata.cover_url);
    }

    fn clear_lyrics(inner: &mut SyncEngineInner) {
        inner.track = None;
        inner.active_index = None;
    }

    /// Replace the lyric track in full and sync it to the last known position.
    pub async fn set_track(&self, track: LyricTrack) {
        let mut inner = self.inner.write().await;
        self.install_track(&mut inner, track);
    }

    /// Replace the lyric track only if `song` is still the current song.
    ///
    /// Returns `false` when the song changed while the lyrics were being fetched.
    pub async fn set_track_for(&self, song: &SongInfo, track: LyricTrack) -> bool {
        let mut inner = self.inner.write().await;
        if inner.state.song_changed(song) {
            debug!(
                target: LOG_TARGET,
                "Dropping lyrics for {}: no longer playing",
                song.label()
            );
            return false;
        }
        self.install_track(&mut inner, track);
        true
    }

    fn install_track(&self, inner: &mut SyncEngineInner, track: LyricTrack) {
        info!(target: LOG_TARGET, "Loaded {} lyric entries", track.len());
        let track = Arc::new(track);
        inner.track = Some(Arc::clone(&track));
        inner.active_index = None;
        self.now_playing.send_replace(NowPlaying::default());
        let _ = self.event_tx.send(SyncEvent::LyricsLoaded { track });
        self.recompute(inner);
    }

    /// Mark that no lyrics were found
    pub async fn set_no_lyrics(&self) {
        let mut inner = self.inner.write().await;
        Self::clear_lyrics(&mut inner);
        self.now_playing.send_replace(NowPlaying::default());
        let _ = self.event_tx.send(SyncEvent::LyricsNotFound);
    }

    /// Emit an error event
    pub fn emit_error(&self, message: String) {
        let _ = self.event_tx.send(SyncEvent::Error { message });
    }

    pub fn set_song_name(&self, value: Option<String>) {
        self.update_metadata(MetadataField::SongName, value);
    }

    pub fn set_artist(&self, value: Option<String>) {
        self.update_metadata(MetadataField::Artist, value);
    }

    pub fn set_album(&self, value: Option<String>) {
        self.update_metadata(MetadataField::Album, value);
    }

    pub fn set_cover_url(&self, value: Option<String>) {
        self.update_metadata(MetadataField::CoverUrl, value);
    }

    /// Store a metadata field and reschedule the debounced `MetadataChanged` event.
    ///
    /// Unchanged values are ignored. Must be called from within a tokio runtime.
    fn update_metadata(&self, field: MetadataField, value: Option<String>) {
        {
            let mut metadata = lock_metadata(&self.metadata);
            let slot = metadata.field_mut(field);
            if *slot == value {
                return;
            }
            *slot = value;
        }

        let metadata = Arc::clone(&self.metadata);
        let event_tx = self.event_tx.clone();
        self.metadata_debouncer.schedule(async move {
            let snapshot = lock_metadata(&metadata).clone();
            debug!(target: LOG_TARGET, "Metadata settled: {:?}", snapshot);
            let _ = event_tx.send(SyncEvent::MetadataChanged(snapshot));
        });
    }

    /// Current song metadata, including changes not yet notified
    #[must_use]
    pub fn metadata(&self) -> SongMetadata {
        lock_metadata(&self.metadata).clone()
    }

    /// Get current playback state
    pub async fn state(&self) -> PlaybackState {
        self.inner.read().await.state.clone()
    }

    /// Get current lyrics
    pub async fn track(&self) -> Option<Arc<LyricTrack>> {
        self.inner.read().await.track.clone()
    }

    /// Get the active lyric index
    pub async fn active_index(&self) -> Option<usize> {
        self.inner.read().await.active_index
    }

    /// Get current song info
    pub async fn current_song(&self) -> Option<SongInfo> {
        self.inner.read().await.state.song.clone()
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::build(DEFAULT_METADATA_DEBOUNCE)
    }
}

fn lock_metadata(metadata: &Mutex<SongMetadata>) -> MutexGuard<'_, SongMetadata> {
    metadata.lock().unwrap_or_else(PoisonError::into_inner)
}
