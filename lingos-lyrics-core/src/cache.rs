use crate::error::Result;
use crate::lrc::LyricTrack;
use crate::playback::SongMetadata;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const LOG_TARGET: &str = "lingos_lyrics::cache";

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS lyrics (
    id INTEGER PRIMARY KEY,
    song_mid TEXT NOT NULL UNIQUE,
    song_name TEXT,
    artist TEXT,
    album TEXT,
    provider TEXT NOT NULL,
    provider_id TEXT NOT NULL,
    content TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lyrics_fetched_at ON lyrics(fetched_at);
";

/// Cached lyrics entry
#[derive(Debug, Clone)]
pub struct CachedLyrics {
    pub id: i64,
    pub song_mid: String,
    pub song_name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub provider: String,
    pub provider_id: String,
    /// LRC text with the original and translation lines
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedLyrics {
    /// Rebuild the lyric track from the stored LRC text
    #[must_use]
    pub fn to_track(&self) -> LyricTrack {
        LyricTrack::parse(&self.content)
    }
}

/// SQLite-based lyrics cache keyed by song mid
pub struct LyricsCache {
    conn: Connection,
}

impl LyricsCache {
    /// Create a new cache at the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the cache database cannot be created or opened.
    pub async fn new() -> Result<Self> {
        let cache_path = crate::paths::lyrics_cache_db_path();
        Self::open(&cache_path).await
    }

    /// Open a cache at a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path) -> Result<Self> {
        info!(target: LOG_TARGET, "Opening lyrics cache database at {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Ok(())
        })
        .await?;

        info!(target: LOG_TARGET, "Lyrics cache database initialized");
        Ok(Self { conn })
    }

    /// Look up lyrics by song mid
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, song_mid: &str) -> Result<Option<CachedLyrics>> {
        debug!(target: LOG_TARGET, "Looking up lyrics in cache: {}", song_mid);
        let song_mid = song_mid.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT id, song_mid, song_name, artist, album,
                           provider, provider_id, content, fetched_at
                    FROM lyrics
                    WHERE song_mid = ?1
                ",
                )?;

                let result = stmt
                    .query_row(rusqlite::params![song_mid], |row| {
                        Ok(CachedLyrics {
                            id: row.get(0)?,
                            song_mid: row.get(1)?,
                            song_name: row.get(2)?,
                            artist: row.get(3)?,
                            album: row.get(4)?,
                            provider: row.get(5)?,
                            provider_id: row.get(6)?,
                            content: row.get(7)?,
                            fetched_at: DateTime::from_timestamp(row.get::<_, i64>(8)?, 0)
                                .unwrap_or_else(Utc::now),
                        })
                    })
                    .optional()?;

                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Store lyrics for a song mid, replacing any previous entry
    ///
    /// # Errors
    ///
    /// Returns an error if the lyrics cannot be stored.
    pub async fn store(
        &self,
        song_mid: &str,
        provider: &str,
        provider_id: &str,
        track: &LyricTrack,
        metadata: &SongMetadata,
    ) -> Result<i64> {
        info!(
            target: LOG_TARGET,
            "Storing lyrics in cache: {} ({} entries, provider: {}:{})",
            song_mid,
            track.len(),
            provider,
            provider_id
        );
        let song_mid = song_mid.to_string();
        let provider = provider.to_string();
        let provider_id = provider_id.to_string();
        let metadata = metadata.clone();
        let content = track.to_lrc();
        let now = Utc::now().timestamp();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r"
                    INSERT INTO lyrics (song_mid, song_name, artist, album, provider, provider_id, content, fetched_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(song_mid) DO UPDATE SET
                        song_name = excluded.song_name,
                        artist = excluded.artist,
                        album = excluded.album,
                        provider = excluded.provider,
                        provider_id = excluded.provider_id,
                        content = excluded.content,
                        fetched_at = excluded.fetched_at
                ",
                    rusqlite::params![
                        song_mid,
                        metadata.song_name,
                        metadata.artist,
                        metadata.album,
                        provider,
                        provider_id,
                        content,
                        now
                    ],
                )?;

                let id = conn.query_row(
                    "SELECT id FROM lyrics WHERE song_mid = ?1",
                    rusqlite::params![song_mid],
                    |row| row.get(0),
                )?;

                Ok(id)
            })
            .await
            .map_err(Into::into)
    }

    /// Delete cache entries older than `ttl_days`
    ///
    /// # Errors
    ///
    /// Returns an error if the database cleanup fails.
    pub async fn cleanup(&self, ttl_days: u32) -> Result<usize> {
        let cutoff = Utc::now().timestamp() - (i64::from(ttl_days) * 24 * 60 * 60);
        self.delete_fetched_before(cutoff).await
    }

    async fn delete_fetched_before(&self, cutoff: i64) -> Result<usize> {
        self.conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM lyrics WHERE fetched_at < ?1",
                    rusqlite::params![cutoff],
                )?;
                Ok(deleted)
            })
            .await
            .map_err(Into::into)
    }

    /// Checkpoint WAL for clean shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lrc::LyricEntry;

    fn bilingual_track() -> LyricTrack {
        LyricTrack::new(vec![
            LyricEntry::new(0, ["故事的小黄花", "The little yellow flower"]),
            LyricEntry::new(5_250, ["从出生那年就飘着", "Floating since the year I was born"]),
        ])
    }

    fn metadata() -> SongMetadata {
        SongMetadata {
            song_name: Some("晴天".to_string()),
            artist: Some("周杰伦".to_string()),
            album: None,
            cover_url: None,
        }
    }

    async fn open_temp() -> (tempfile::TempDir, LyricsCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = LyricsCache::open(&dir.path().join("cache").join("lyrics.db"))
            .await
            .unwrap();
        (dir, cache)
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let (_dir, cache) = open_temp().await;

        cache
            .store("003OUlho2HcRHC", "qq_music", "003OUlho2HcRHC", &bilingual_track(), &metadata())
            .await
            .unwrap();

        let cached = cache.get("003OUlho2HcRHC").await.unwrap().unwrap();
        assert_eq!(cached.provider, "qq_music");
        assert_eq!(cached.artist.as_deref(), Some("周杰伦"));
        assert_eq!(cached.to_track().entries, bilingual_track().entries);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_dir, cache) = open_temp().await;
        assert!(cache.get("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_replaces_existing() {
        let (_dir, cache) = open_temp().await;
        let first = cache
            .store("mid", "qq_music", "1", &bilingual_track(), &metadata())
            .await
            .unwrap();

        let replacement = LyricTrack::new(vec![LyricEntry::new(1_000, ["only"])]);
        let second = cache
            .store("mid", "qq_music", "2", &replacement, &metadata())
            .await
            .unwrap();

        assert_eq!(first, second);
        let cached = cache.get("mid").await.unwrap().unwrap();
        assert_eq!(cached.provider_id, "2");
        assert_eq!(cached.to_track().entries, replacement.entries);
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired() {
        let (_dir, cache) = open_temp().await;
        cache
            .store("mid", "qq_music", "1", &bilingual_track(), &metadata())
            .await
            .unwrap();

        assert_eq!(cache.cleanup(30).await.unwrap(), 0);
        let future_cutoff = Utc::now().timestamp() + 60;
        assert_eq!(cache.delete_fetched_before(future_cutoff).await.unwrap(), 1);
        assert!(cache.get("mid").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint() {
        let (_dir, cache) = open_temp().await;
        cache.checkpoint().await.unwrap();
    }
}
