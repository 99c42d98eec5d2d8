//! Shared identifier types and utilities used across all switchboard crates.

pub mod id;

pub use id::{ChannelId, EntityId, InvalidId, MessageId, ServerId};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Message timestamps and pagination cursors use this resolution.
#[must_use]
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
