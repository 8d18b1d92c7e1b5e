use crate::error::CoreError;
use crate::lrc::LyricTrack;
use crate::playback::SongInfo;
use async_trait::async_trait;

/// Query parameters for fetching lyrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricsQuery {
    /// Media id of the song in the host's catalogue
    pub song_mid: Option<String>,
    /// Numeric song id
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl LyricsQuery {
    /// Create a query from a host song
    #[must_use]
    pub fn from_song(song: &SongInfo) -> Self {
        Self {
            song_mid: song.song_mid.clone(),
            song_id: song.song_id.clone(),
            title: song.name.clone(),
            artist: song.artist.clone(),
            album: song.album.clone(),
        }
    }

    /// Set the song media id
    #[must_use]
    pub fn with_song_mid(mut self, song_mid: impl Into<String>) -> Self {
        self.song_mid = Some(song_mid.into());
        self
    }

    /// Song media id, if non-empty
    #[must_use]
    pub fn song_mid(&self) -> Option<&str> {
        self.song_mid.as_deref().filter(|mid| !mid.is_empty())
    }
}

/// Lyrics with provider metadata
#[derive(Debug, Clone)]
pub struct FetchedLyrics {
    /// The timed track, or `None` when the provider has no lyrics for the song
    pub track: Option<LyricTrack>,
    /// Provider-specific ID of the lyrics (e.g. the song mid)
    pub provider_id: String,
}

impl FetchedLyrics {
    #[must_use]
    pub fn not_found(provider_id: impl Into<String>) -> Self {
        Self {
            track: None,
            provider_id: provider_id.into(),
        }
    }

    /// Check if lyrics with at least one timed entry were found
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.track.as_ref().is_some_and(|track| !track.is_empty())
    }
}

/// Trait for lyrics providers
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Fetch lyrics for a query
    async fn fetch(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError>;
}
