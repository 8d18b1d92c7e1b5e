//! Playback sources: host events on stdin, and the built-in mock song.

use async_trait::async_trait;
use lingos_lyrics_core::error::Result;
use lingos_lyrics_core::{
    HostEvent, LyricEntry, LyricTrack, PlaybackSource, PlaybackState, SongInfo, SyncEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lingos_lyrics::source";

/// Reads JSON-lines host events and feeds them to the sync engine
pub struct HostEventSource<R> {
    reader: Mutex<R>,
    sync_engine: Arc<SyncEngine>,
    cancel_token: CancellationToken,
}

impl HostEventSource<BufReader<Stdin>> {
    pub fn stdin(sync_engine: Arc<SyncEngine>, cancel_token: CancellationToken) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), sync_engine, cancel_token)
    }
}

impl<R> HostEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, sync_engine: Arc<SyncEngine>, cancel_token: CancellationToken) -> Self {
        Self {
            reader: Mutex::new(reader),
            sync_engine,
            cancel_token,
        }
    }
}

#[async_trait]
impl<R> PlaybackSource for HostEventSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "host_events"
    }

    async fn run(&self) -> Result<()> {
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();
        info!(target: LOG_TARGET, "Reading host events");

        loop {
            buf.clear();
            let read = tokio::select! {
                () = self.cancel_token.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => read?,
            };
            if read == 0 {
                info!(target: LOG_TARGET, "Host event stream ended");
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(target: LOG_TARGET, "Skipping host event that is not UTF-8: {}", e);
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match HostEvent::from_json(line) {
                Ok(event) => self.sync_engine.apply_host_event(event).await,
                Err(e) => warn!(target: LOG_TARGET, "Skipping host event {:?}: {}", line, e),
            }
        }

        Ok(())
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

/// Length of one pass through the mock song
pub const MOCK_LOOP_MS: u64 = 35_000;

/// Song shown in mock mode
#[must_use]
pub fn mock_song() -> SongInfo {
    SongInfo {
        song_id: None,
        song_mid: None,
        name: Some("偏爱 (My devotion)".to_string()),
        artist: Some("黄星".to_string()),
        album: Some("Beloved (挚爱)".to_string()),
        album_pic: Some(
            "http://y.gtimg.cn/music/photo_new/T002R500x500M000001J55Pj0QwUjw_1.jpg".to_string(),
        ),
    }
}

/// Bilingual lyrics of the mock song
#[must_use]
pub fn mock_track() -> LyricTrack {
    LyricTrack::new(vec![
        LyricEntry::new(0, ["模拟播放开始", "Mock playback starts"]),
        LyricEntry::new(5_000, ["车窗外的城市闪烁着光影", "City lights shimmer beyond the glass"]),
        LyricEntry::new(10_000, ["指尖跟随旋律轻敲方向盘", "Fingers drum softly to the beat"]),
        LyricEntry::new(15_000, ["心跳和节奏此刻重合", "Heartbeat syncs with every rhythm"]),
        LyricEntry::new(20_000, ["让旋律在空中自由漂浮", "Let the melody float through the air"]),
        LyricEntry::new(25_000, ["这是属于我们的旅途配乐", "This soundtrack belongs to our ride"]),
        LyricEntry::new(30_000, ["模拟播放循环结束", "Looping back to start"]),
    ])
}

/// Plays a fixed track on a looping clock
pub struct MockSource {
    sync_engine: Arc<SyncEngine>,
    track: LyricTrack,
    tick: Duration,
    cancel_token: CancellationToken,
}

impl MockSource {
    pub fn new(
        sync_engine: Arc<SyncEngine>,
        track: LyricTrack,
        tick: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            sync_engine,
            track,
            tick,
            cancel_token,
        }
    }

    /// Loop length: the last entry plus five seconds, or the mock default
    fn loop_ms(&self) -> u64 {
        self.track
            .entries
            .last()
            .map_or(MOCK_LOOP_MS, |entry| entry.start_millis.saturating_add(5_000))
    }
}

#[async_trait]
impl PlaybackSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn run(&self) -> Result<()> {
        let loop_ms = self.loop_ms();
        info!(
            target: LOG_TARGET,
            "Mock playback: {} entries, {}ms loop", self.track.len(), loop_ms
        );

        self.sync_engine.song_changed(mock_song()).await;
        self.sync_engine.set_track(self.track.clone()).await;

        let mut clock = PlaybackState {
            duration_ms: loop_ms,
            ..PlaybackState::default()
        };
        let mut interval = tokio::time::interval(self.tick);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                _ = interval.tick() => {}
            }

            let mut position_ms = clock.interpolated_position_ms();
            if position_ms >= loop_ms {
                debug!(target: LOG_TARGET, "Mock loop restarts");
                clock.set_position(0);
                position_ms = 0;
            }
            self.sync_engine.update_position(position_ms).await;
        }

        Ok(())
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_events_drive_engine() {
        let input = concat!(
            r#"{"type":"song_info","raw":"SongInfo(songMid=abc, songName=Song, singerName=Artist)"}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"type":"progress","current":5500,"total":60000}"#,
            "\n",
        );
        let engine = SyncEngine::new();
        engine.set_track(mock_track()).await;
        let source = HostEventSource::new(input.as_bytes(), Arc::clone(&engine), CancellationToken::new());

        source.run().await.unwrap();

        let state = engine.state().await;
        assert_eq!(state.position_ms, 5500);
        assert_eq!(
            engine.current_song().await.and_then(|song| song.song_mid),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut input = Vec::new();
        input.extend_from_slice(
            br#"{"type":"song_info","raw":"SongInfo(songMid=abc, songName=Song, singerName=Artist)"}"#,
        );
        input.push(b'\n');
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(br#"{"type":"progress","current":5500,"total":60000}"#);
        input.push(b'\n');

        let engine = SyncEngine::new();
        let source = HostEventSource::new(input.as_slice(), Arc::clone(&engine), CancellationToken::new());

        source.run().await.unwrap();

        assert_eq!(engine.state().await.position_ms, 5500);
        assert_eq!(
            engine.current_song().await.and_then(|song| song.song_mid),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_stopped_source_returns() {
        let (_writer, reader) = tokio::io::duplex(64);
        let source = HostEventSource::new(
            BufReader::new(reader),
            SyncEngine::new(),
            CancellationToken::new(),
        );

        source.stop();
        source.run().await.unwrap();
    }

    #[test]
    fn test_mock_track_shape() {
        let track = mock_track();
        assert_eq!(track.len(), 7);
        assert!(track.entries.iter().all(|entry| entry.lines.len() == 2));
        assert_eq!(track.entries.last().map(|e| e.start_millis), Some(30_000));
    }

    #[tokio::test]
    async fn test_mock_source_loads_song_and_track() {
        let engine = SyncEngine::new();
        let cancel = CancellationToken::new();
        let source = Arc::new(MockSource::new(
            Arc::clone(&engine),
            mock_track(),
            Duration::from_millis(10),
            cancel.clone(),
        ));
        let mut watcher = engine.watch_now_playing();

        let task = tokio::spawn({
            let source = Arc::clone(&source);
            async move { source.run().await }
        });
        watcher.wait_for(|now| now.index.is_some()).await.unwrap();

        assert_eq!(source.loop_ms(), MOCK_LOOP_MS);
        assert_eq!(
            engine.current_song().await.and_then(|song| song.name),
            Some("偏爱 (My devotion)".to_string())
        );
        assert_eq!(engine.now_playing().primary(), Some("模拟播放开始"));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
