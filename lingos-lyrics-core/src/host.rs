//! Events reported by the host music player.
//!
//! The host exposes two callbacks: song info changes, which carry the
//! `toString()` of its song object, and progress changes with the current and
//! total time in milliseconds. Both arrive here as JSON lines.

use crate::error::{CoreError, Result};
use crate::playback::SongInfo;
use serde::{Deserialize, Serialize};

/// One event from the host player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Raw `toString()` of the host song object, e.g. `SongInfo(songId=1, songMid=abc, ...)`
    SongInfo { raw: String },
    /// Song fields already split out
    Song(SongInfo),
    /// Playback progress in milliseconds
    Progress {
        current: u64,
        #[serde(default)]
        total: u64,
    },
}

impl HostEvent {
    /// Decode one JSON line
    ///
    /// # Errors
    ///
    /// Returns `CoreError::HostEvent` if the line is not a valid event.
    pub fn from_json(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim()).map_err(|e| CoreError::HostEvent {
            reason: e.to_string(),
        })
    }
}

impl SongInfo {
    /// Read song fields out of the host's `toString()` representation
    #[must_use]
    pub fn from_host_string(raw: &str) -> Self {
        Self {
            song_id: value_of(raw, "songId"),
            song_mid: value_of(raw, "songMid"),
            name: value_of(raw, "songName"),
            artist: value_of(raw, "singerName"),
            album: value_of(raw, "albumName"),
            album_pic: value_of(raw, "albumPic500x500"),
        }
    }
}

/// Extract `field=value` from a `Type(a=1, b=2)` string.
///
/// The value runs up to the next `,` or `)`. Empty values and `null` yield `None`.
#[must_use]
pub fn value_of(raw: &str, field: &str) -> Option<String> {
    let needle = format!("{field}=");
    let mut search_from = 0;

    while let Some(found) = raw[search_from..].find(&needle) {
        let start = search_from + found;
        let value_start = start + needle.len();

        let at_boundary = raw[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');

        if at_boundary {
            let rest = &raw[value_start..];
            let end = rest.find(|c: char| c == ',' || c == ')').unwrap_or(rest.len());
            let value = rest[..end].trim();
            return (!value.is_empty() && value != "null").then(|| value.to_string());
        }

        search_from = value_start;
    }

    None
}
