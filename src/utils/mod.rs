//! # Utility Modules
//!
//! Supporting utilities for sealing payloads, logging, timing and metrics.
//!
//! ## Components
//! - **Crypto**: AES-256-CBC encrypt-then-MAC (HMAC-SHA256) sealing of binary payloads
//! - **Logging**: Structured logging configuration
//! - **Time**: Wall-clock helpers for tags and server timestamps
//! - **Timeout**: Async timeout wrappers and default durations
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Random IVs come from the thread-local CSPRNG
//! - MAC verification is constant-time
//! - Session keys are zeroed on drop (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;

pub use crypto::{IvMode, SessionKeys};
pub use metrics::{Metrics, MetricsSnapshot};
