use async_trait::async_trait;
use lingos_lyrics_core::error::Result;
use lingos_lyrics_core::{CoreError, FetchedLyrics, LyricTrack, LyricsProvider, LyricsQuery};
use std::path::{Path, PathBuf};

/// Serves one local LRC file for every song
pub struct LrcFileProvider {
    path: PathBuf,
    track: LyricTrack,
}

impl LrcFileProvider {
    /// Read and parse `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no timed lines.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let track = LyricTrack::parse_timed(&content)?;
        Ok(Self {
            path: path.to_path_buf(),
            track,
        })
    }

    pub fn track(&self) -> &LyricTrack {
        &self.track
    }
}

#[async_trait]
impl LyricsProvider for LrcFileProvider {
    fn name(&self) -> &'static str {
        "lrc_file"
    }

    async fn fetch(&self, _query: &LyricsQuery) -> std::result::Result<FetchedLyrics, CoreError> {
        Ok(FetchedLyrics {
            track: Some(self.track.clone()),
            provider_id: self.path.display().to_string(),
        })
    }
}
