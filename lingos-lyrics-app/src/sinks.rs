//! Relay sinks: JSON lines on stdout and an HTTP webhook.

use async_trait::async_trait;
use lingos_lyrics_core::error::Result;
use lingos_lyrics_core::{CoreError, RelayMessage, RelaySink};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Writes each message as one JSON line
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W> RelaySink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, message: &RelayMessage) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// POSTs each message as JSON to a fixed URL
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RelaySink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, message: &RelayMessage) -> Result<()> {
        let response = self.client.post(&self.url).json(message).send().await?;

        if !response.status().is_success() {
            return Err(CoreError::RelayFailed {
                sink: self.name().to_string(),
                reason: format!("{} returned status: {}", self.url, response.status()),
            });
        }
        Ok(())
    }
}
