//! # Error Types
//!
//! Error handling for the dispatch and correlation engine.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`DispatchError`]. Failures are always handed back to the immediate caller;
//! nothing in this crate retries on its own.
//!
//! ## Error Categories
//! - **Input errors**: documents or nodes that cannot be encoded, tags too short
//!   for binary framing
//! - **Cryptographic errors**: sealing or opening a binary payload failed
//! - **Transport errors**: the socket write failed (the connection is likely dead)
//! - **Reply errors**: malformed keepalive replies, timeouts, dropped waiters
//!
//! ## Example Usage
//! ```rust
//! use session_dispatch::error::{DispatchError, Result};
//! use tracing::{error, info};
//!
//! fn parse_server_time(reply: &str) -> Result<u64> {
//!     reply
//!         .parse::<u64>()
//!         .map_err(|e| DispatchError::Protocol(format!("bad keepalive reply: {e}")))
//! }
//!
//! match parse_server_time("1700000000123") {
//!     Ok(ms) => info!(ms, "server clock"),
//!     Err(e) => error!(error = %e, "keepalive failed"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_REGISTRY_LOCK: &str = "Failed to acquire correlation registry lock";

    /// Tag errors
    pub const ERR_TAG_TOO_SHORT: &str = "no message tag specified or too short";

    /// Reply errors
    pub const ERR_CONNECTION_TIMEOUT: &str = "connection timed out";

    /// Cryptographic errors
    pub const ERR_INVALID_KEY_LENGTH: &str = "invalid key length";
    pub const ERR_SEALED_TOO_SHORT: &str = "sealed payload shorter than MAC and IV";
    pub const ERR_MAC_MISMATCH: &str = "message authentication failed";
    pub const ERR_BAD_PADDING: &str = "invalid block padding";

    /// Frame errors
    pub const ERR_UNKNOWN_FRAME_KIND: &str = "unknown frame kind";
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";
}

/// Primary error type for all dispatch operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum DispatchError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    /// The document or node could not be serialized. Not retriable.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encryption or authentication failed. Not retriable.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The tag cannot be framed unambiguously. Caller bug.
    #[error("Invalid message tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },

    /// The physical write failed; the connection is probably gone.
    #[error("Error writing to socket: {0}")]
    TransportWrite(String),

    /// The remote end answered with something we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// The waiter's channel was closed without a value, either because the
    /// entry was replaced by a newer registration or swept as stale.
    #[error("Response dropped for tag {0:?}")]
    ResponseDropped(String),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl DispatchError {
    /// Whether the failure indicates the underlying connection should be torn down.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            DispatchError::TransportWrite(_) | DispatchError::Timeout(_) | DispatchError::Io(_)
        )
    }
}

/// Type alias for Results using DispatchError
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DispatchError::TransportWrite("broken pipe".into()).is_connection_fatal());
        assert!(DispatchError::Timeout(constants::ERR_CONNECTION_TIMEOUT.into()).is_connection_fatal());
        assert!(!DispatchError::Protocol("abc".into()).is_connection_fatal());
        assert!(!DispatchError::InvalidTag {
            tag: "x".into(),
            reason: constants::ERR_TAG_TOO_SHORT.into()
        }
        .is_connection_fatal());
    }

    #[test]
    fn test_timeout_message() {
        let err = DispatchError::Timeout(constants::ERR_CONNECTION_TIMEOUT.into());
        assert_eq!(err.to_string(), "Timeout: connection timed out");
    }
}
