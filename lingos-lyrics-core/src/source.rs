//! Playback source trait.

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A source of host playback events.
///
/// Sources feed song info and progress into the [`SyncEngine`](crate::SyncEngine)
/// until cancelled. Implementations should:
///
/// - Report song changes and playback positions as they arrive
/// - Skip malformed input rather than stopping
/// - Return when the cancellation token is triggered or the input ends
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Returns a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// Run the source until cancelled or an unrecoverable error occurs.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot read its input.
    async fn run(&self) -> Result<()>;

    /// Get the cancellation token for this source.
    fn cancel_token(&self) -> CancellationToken;

    /// Signal the source to stop.
    fn stop(&self) {
        self.cancel_token().cancel();
    }
}
