//! Timeout helpers shared by the writer and the heartbeat monitor.

use crate::error::{DispatchError, Result};
use std::future::Future;
use std::time::Duration;

/// Default wait for a correlated reply
pub const DEFAULT_MSG_TIMEOUT: Duration = Duration::from_secs(20);

/// Lower bound of the jittered keepalive interval
pub const KEEPALIVE_MIN_INTERVAL: Duration = Duration::from_secs(20);

/// Upper bound of the jittered keepalive interval
pub const KEEPALIVE_MAX_INTERVAL: Duration = Duration::from_secs(60);

/// How often stale correlation entries are swept
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Run `fut` with a deadline, turning expiry into [`DispatchError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration, what: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(DispatchError::Timeout(what.to_string())),
    }
}
