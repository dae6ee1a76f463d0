//! Wall-clock helpers.

use std::time::SystemTime;

/// Returns the current unix timestamp, in seconds.
///
/// Clocks set before the unix epoch collapse to zero rather than failing.
pub fn get_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_secs())
        .unwrap_or(0)
}
