use async_trait::async_trait;
use lingos_lyrics_core::error::Result;
use lingos_lyrics_core::{
    CoreError, FetchedLyrics, HostEvent, LyricTrack, LyricsFetcher, LyricsProvider, LyricsQuery,
    Relay, RelayMessage, RelaySink, SyncEngine,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LRC: &str = "\
[ti:晴天]
[00:00.00]故事的小黄花
[00:05.00]从出生那年就飘着
[00:10.00]童年的荡秋千
[00:00.00]The little yellow flower of the story
[00:05.00]Has floated since the year I was born
[00:10.00]The swing of childhood
";

struct FixedProvider;

#[async_trait]
impl LyricsProvider for FixedProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch(&self, query: &LyricsQuery) -> std::result::Result<FetchedLyrics, CoreError> {
        Ok(FetchedLyrics {
            track: Some(LyricTrack::parse(LRC)),
            provider_id: query.song_mid().unwrap_or_default().to_string(),
        })
    }
}

#[derive(Clone, Default)]
struct CollectingSink {
    messages: Arc<Mutex<Vec<RelayMessage>>>,
}

#[async_trait]
impl RelaySink for CollectingSink {
    fn name(&self) -> &'static str {
        "collecting"
    }

    async fn send(&self, message: &RelayMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

async fn feed(engine: &SyncEngine, line: &str) {
    engine.apply_host_event(HostEvent::from_json(line).unwrap()).await;
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_host_events_flow_to_relay() {
    let engine = SyncEngine::new();
    let fetcher = Arc::new(LyricsFetcher::new(
        Arc::clone(&engine),
        None,
        vec![Box::new(FixedProvider)],
        None,
    ));
    let sink = CollectingSink::default();
    let relay = Arc::new(Relay::new(
        Arc::clone(&engine),
        vec![Box::new(sink.clone())],
        None,
    ));
    let fetcher_handle = Arc::clone(&fetcher).start();
    let relay_handle = Arc::clone(&relay).start();
    settle().await;

    feed(
        &engine,
        r#"{"type":"song_info","raw":"SongInfo(songId=1, songMid=003OUlho2HcRHC, songName=晴天, singerName=周杰伦, albumName=叶惠美, albumPic500x500=https://y.gtimg.cn/c.jpg)"}"#,
    )
    .await;
    settle().await;
    assert_eq!(engine.track().await.map(|t| t.len()), Some(3));

    for position in [0, 4_999, 5_000, 12_000] {
        feed(
            &engine,
            &format!(r#"{{"type":"progress","current":{position},"total":240000}}"#),
        )
        .await;
        settle().await;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;

    let messages = sink.messages.lock().unwrap().clone();
    let lyrics: Vec<_> = messages
        .iter()
        .filter_map(|message| match message {
            RelayMessage::Lyrics(info) => Some((info.lyric_text.clone(), info.next_lyric.clone())),
            RelayMessage::Metadata(_) => None,
        })
        .collect();
    assert_eq!(
        lyrics,
        vec![
            ("故事的小黄花".to_string(), "从出生那年就飘着".to_string()),
            ("从出生那年就飘着".to_string(), "童年的荡秋千".to_string()),
            ("童年的荡秋千".to_string(), "end".to_string()),
        ]
    );

    let metadata: Vec<_> = messages
        .iter()
        .filter_map(|message| match message {
            RelayMessage::Metadata(info) => Some(info.clone()),
            RelayMessage::Lyrics(_) => None,
        })
        .collect();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].song_name, "晴天");
    assert_eq!(metadata[0].artist_name, "周杰伦");
    assert_eq!(metadata[0].cover_url, "https://y.gtimg.cn/c.jpg");

    let now = engine.now_playing();
    assert_eq!(now.translation(), Some("The swing of childhood"));

    fetcher.cancel_token().cancel();
    relay.cancel_token().cancel();
    fetcher_handle.await.unwrap();
    relay_handle.await.unwrap();
}
