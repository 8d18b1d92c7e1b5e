use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use lingos_lyrics_core::{CoreError, FetchedLyrics, LyricTrack, LyricsProvider, LyricsQuery};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lingos_lyrics::qqmusic";

const QQ_LYRIC_URL: &str = "https://c.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg";
const QQ_REFERER: &str = "https://i.y.qq.com";
const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 18_1 like Mac OS X) \
                          AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/22B83";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// QQ Music lyrics provider, keyed by song mid
pub struct QqMusicProvider {
    client: ClientWithMiddleware,
}

impl QqMusicProvider {
    /// Create a new QQ Music provider with default 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(QQ_REFERER));

        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }
}

/// Lyric request URL for a song mid
#[must_use]
pub fn lyric_url(song_mid: &str) -> String {
    format!(
        "{QQ_LYRIC_URL}?songmid={}&g_tk=5381&format=json",
        urlencoding::encode(song_mid)
    )
}

/// Response from the QQ Music lyric endpoint.
/// Both fields are base64-encoded LRC text; other fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct QqLyricResponse {
    #[serde(default)]
    lyric: Option<String>,
    #[serde(default)]
    trans: Option<String>,
}

#[async_trait]
impl LyricsProvider for QqMusicProvider {
    fn name(&self) -> &'static str {
        "qq_music"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<FetchedLyrics, CoreError> {
        let Some(song_mid) = query.song_mid() else {
            info!(target: LOG_TARGET, "No song mid in query, skipping QQ Music");
            return Ok(FetchedLyrics::not_found(""));
        };

        let url = lyric_url(song_mid);
        info!(target: LOG_TARGET, "QQ Music GET: {}", url);

        let response = self.client.get(&url).send().await?;
        info!(target: LOG_TARGET, "QQ Music response status: {}", response.status());

        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "QQ Music returned status: {}", response.status());
            return Err(CoreError::LyricsProviderFailed {
                provider: self.name().to_string(),
                reason: format!("QQ Music returned status: {}", response.status()),
            });
        }

        let body = response.text().await?;
        let track = parse_response(&body).map_err(|reason| CoreError::LyricsProviderFailed {
            provider: self.name().to_string(),
            reason,
        })?;

        Ok(FetchedLyrics {
            track,
            provider_id: song_mid.to_string(),
        })
    }
}

/// Decode a lyric response body into a track.
///
/// Original lines come first and translation lines after them; the track
/// builder pairs them by timestamp. Returns `Ok(None)` when neither field
/// yields a timed line.
///
/// # Errors
///
/// Returns a reason string if the body is not a lyric response.
pub fn parse_response(body: &str) -> Result<Option<LyricTrack>, String> {
    let response: QqLyricResponse =
        serde_json::from_str(strip_callback(body)).map_err(|e| format!("invalid JSON: {e}"))?;

    let lyric = response.lyric.as_deref().and_then(decode_field);
    let trans = response.trans.as_deref().and_then(decode_field);

    let lines: Vec<&str> = lyric
        .iter()
        .chain(trans.iter())
        .flat_map(|text| text.split('\n'))
        .collect();

    if lines.is_empty() {
        debug!(target: LOG_TARGET, "QQ Music response has no lyric or translation");
        return Ok(None);
    }

    let track = LyricTrack::build(lines);
    debug!(target: LOG_TARGET, "Decoded {} lyric entries", track.len());
    Ok(Some(track).filter(|track| !track.is_empty()))
}

/// Unwrap a `MusicJsonCallback(...)` envelope if present
fn strip_callback(body: &str) -> &str {
    let body = body.trim();
    if body.starts_with('{') {
        return body;
    }
    match (body.find('('), body.rfind(')')) {
        (Some(open), Some(close)) if open < close => &body[open + 1..close],
        _ => body,
    }
}

/// Decode one base64 field; empty or undecodable fields are `None`
fn decode_field(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    match general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!(target: LOG_TARGET, "Failed to decode lyric field: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        general_purpose::STANDARD.encode(text)
    }

    fn body(lyric: Option<&str>, trans: Option<&str>) -> String {
        serde_json::json!({
            "retcode": 0,
            "code": 0,
            "lyric": lyric.map(encode),
            "trans": trans.map(encode),
        })
        .to_string()
    }

    #[test]
    fn test_lyric_url() {
        assert_eq!(
            lyric_url("003OUlho2HcRHC"),
            "https://c.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg?songmid=003OUlho2HcRHC&g_tk=5381&format=json"
        );
    }

    #[test]
    fn test_lyric_and_translation_are_paired() {
        let lyric = "[ti:晴天]\n[00:01.00]故事的小黄花\n[00:05.00]从出生那年就飘着";
        let trans = "[00:01.00]The little yellow flower\n[00:05.00]//\n";

        let track = parse_response(&body(Some(lyric), Some(trans)))
            .unwrap()
            .unwrap();

        assert_eq!(track.metadata.title.as_deref(), Some("晴天"));
        assert_eq!(track.len(), 2);
        assert_eq!(
            track.entries[0].lines,
            vec!["故事的小黄花", "The little yellow flower"]
        );
        assert_eq!(track.entries[1].lines, vec!["从出生那年就飘着"]);
    }

    #[test]
    fn test_lyric_only() {
        let track = parse_response(&body(Some("[00:00.00]a\n[00:02.00]b"), None))
            .unwrap()
            .unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.entries[1].translation(), None);
    }

    #[test]
    fn test_missing_fields_is_not_found() {
        assert!(parse_response(&body(None, None)).unwrap().is_none());
        assert!(parse_response(r#"{"lyric":""}"#).unwrap().is_none());
    }

    #[test]
    fn test_untimed_text_is_not_found() {
        let result = parse_response(&body(Some("[ti:title]\nplain text"), None)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_callback_envelope() {
        let wrapped = format!("MusicJsonCallback({})", body(Some("[00:00.00]a"), None));
        assert_eq!(parse_response(&wrapped).unwrap().map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_wrapped_base64_lines() {
        let encoded = encode("[00:00.00]first line of a longer lyric");
        let (head, tail) = encoded.split_at(10);
        let json = format!(r#"{{"lyric":"{head}\n{tail}"}}"#);
        assert_eq!(parse_response(&json).unwrap().map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_invalid_body() {
        assert!(parse_response("<html>busy</html>").is_err());
    }

    #[tokio::test]
    async fn test_query_without_song_mid_is_not_found() {
        let provider = QqMusicProvider::new().unwrap();
        let fetched = provider.fetch(&LyricsQuery::default()).await.unwrap();
        assert!(!fetched.is_found());
    }
}
