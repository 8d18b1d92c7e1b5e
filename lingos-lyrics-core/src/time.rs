//! Time conversions shared by the engine and the relay.

use chrono::Utc;
use std::time::Duration;

/// Extension trait for saturating `Duration` conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall-clock time as Unix epoch milliseconds, the timestamp format of relayed messages
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}
