//! Wall-clock helpers.

use crate::error::{constants, DispatchError, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn unix_seconds() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| DispatchError::Protocol(constants::ERR_SYSTEM_TIME.into()))
}

/// Convert a signed millisecond epoch timestamp into a `SystemTime`, split
/// into whole seconds plus the sub-second remainder. `None` if the platform
/// clock cannot represent it.
pub fn from_unix_millis(millis: i64) -> Option<SystemTime> {
    let abs = millis.unsigned_abs();
    let offset = Duration::new(abs / 1000, ((abs % 1000) * 1_000_000) as u32);
    if millis >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    }
}
