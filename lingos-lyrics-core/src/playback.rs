use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::time::DurationExt;

/// Current playback state reported by the host player
#[derive(Debug, Clone)]
pub struct PlaybackState {
    /// Song currently loaded in the host player (None before the first song event)
    pub song: Option<SongInfo>,
    /// Last reported playback position in milliseconds
    pub position_ms: u64,
    /// Total song length in milliseconds (0 when unknown)
    pub duration_ms: u64,
    /// When the position was last updated (for interpolation)
    pub updated_at: Instant,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            song: None,
            position_ms: 0,
            duration_ms: 0,
            updated_at: Instant::now(),
        }
    }
}

impl PlaybackState {
    /// Record a new position report
    pub fn set_position(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        self.updated_at = Instant::now();
    }

    /// Position advanced by the time elapsed since the last report, clamped to the duration
    #[must_use]
    pub fn interpolated_position_ms(&self) -> u64 {
        let interpolated = self
            .position_ms
            .saturating_add(self.updated_at.elapsed().as_millis_u64());

        if self.duration_ms == 0 {
            interpolated
        } else {
            interpolated.min(self.duration_ms)
        }
    }

    /// Check whether `song` is a different song from the current one
    #[must_use]
    pub fn song_changed(&self, song: &SongInfo) -> bool {
        self.song
            .as_ref()
            .map_or(true, |current| !current.same_song(song))
    }
}

/// Song information as exposed by the host player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongInfo {
    #[serde(default)]
    pub song_id: Option<String>,
    /// Media id used for lyric lookups
    #[serde(default)]
    pub song_mid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Cover image URL
    #[serde(default)]
    pub album_pic: Option<String>,
}

impl SongInfo {
    /// Same song when the media ids match; falls back to id and name when either lacks one
    #[must_use]
    pub fn same_song(&self, other: &Self) -> bool {
        match (&self.song_mid, &other.song_mid) {
            (Some(a), Some(b)) => a == b,
            _ => self.song_id == other.song_id && self.name == other.name,
        }
    }

    /// Human-readable label for logs
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.artist.as_deref().unwrap_or("?"),
            self.name.as_deref().unwrap_or("?")
        )
    }

    /// The display fields that are relayed as song metadata
    #[must_use]
    pub fn metadata(&self) -> SongMetadata {
        SongMetadata {
            song_name: self.name.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            cover_url: self.album_pic.clone(),
        }
    }
}

/// Display metadata for the current song
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub song_name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover_url: Option<String>,
}

/// One field of [`SongMetadata`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    SongName,
    Artist,
    Album,
    CoverUrl,
}

impl SongMetadata {
    pub fn field_mut(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::SongName => &mut self.song_name,
            MetadataField::Artist => &mut self.artist,
            MetadataField::Album => &mut self.album,
            MetadataField::CoverUrl => &mut self.cover_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn song(mid: &str, name: &str) -> SongInfo {
        SongInfo {
            song_id: Some("1".to_string()),
            song_mid: Some(mid.to_string()),
            name: Some(name.to_string()),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            album_pic: None,
        }
    }

    #[test]
    fn test_playback_state_default() {
        let state = PlaybackState::default();
        assert!(state.song.is_none());
        assert_eq!(state.position_ms, 0);
        assert_eq!(state.duration_ms, 0);
    }

    #[test]
    fn test_interpolated_position_clamped() {
        let state = PlaybackState {
            song: None,
            position_ms: 178_000,
            duration_ms: 180_000,
            updated_at: Instant::now() - Duration::from_secs(10),
        };
        assert_eq!(state.interpolated_position_ms(), 180_000);
    }

    #[test]
    fn test_interpolated_position_advances() {
        let state = PlaybackState {
            song: None,
            position_ms: 1000,
            duration_ms: 0,
            updated_at: Instant::now() - Duration::from_secs(2),
        };
        assert!(state.interpolated_position_ms() >= 3000);
    }

    #[test]
    fn test_same_song_by_mid() {
        assert!(song("abc", "One").same_song(&song("abc", "Renamed")));
        assert!(!song("abc", "One").same_song(&song("def", "One")));
    }

    #[test]
    fn test_same_song_without_mid_uses_id_and_name() {
        let a = SongInfo {
            song_id: Some("7".to_string()),
            name: Some("Song".to_string()),
            ..Default::default()
        };
        let b = SongInfo {
            song_mid: Some("mid".to_string()),
            ..a.clone()
        };
        assert!(a.same_song(&b));
        let c = SongInfo {
            name: Some("Other".to_string()),
            ..a.clone()
        };
        assert!(!a.same_song(&c));
    }

    #[test]
    fn test_song_changed() {
        let mut state = PlaybackState::default();
        assert!(state.song_changed(&song("abc", "One")));
        state.song = Some(song("abc", "One"));
        assert!(!state.song_changed(&song("abc", "One")));
        assert!(state.song_changed(&song("xyz", "Two")));
    }

    #[test]
    fn test_metadata_field_mut() {
        let mut metadata = song("abc", "One").metadata();
        *metadata.field_mut(MetadataField::CoverUrl) = Some("http://cover".to_string());
        assert_eq!(metadata.song_name.as_deref(), Some("One"));
        assert_eq!(metadata.cover_url.as_deref(), Some("http://cover"));
    }
}
