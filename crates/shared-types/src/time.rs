//! Wall-clock helpers.
//!
//! Record ages and TAPOS freshness are tracked as whole seconds since the
//! Unix epoch; downlink timestamps additionally carry milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Split an epoch-milliseconds stamp into whole seconds and the millisecond
/// remainder, the shape the TAPOS downlink response carries on the wire.
pub fn split_millis(epoch_ms: u64) -> (u32, u16) {
    ((epoch_ms / 1000) as u32, (epoch_ms % 1000) as u16)
}
