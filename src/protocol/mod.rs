//! # Dispatch Protocol
//!
//! Everything between "send this, give me a channel for the reply" and the
//! bytes on the transport.
//!
//! ## Components
//! - **Connection**: the socket writer, document/binary/keepalive sends
//! - **Registry**: tag → one-shot reply channel table
//! - **Dispatcher**: read-path helper delivering inbound frames into the registry
//! - **Heartbeat**: periodic keepalive probing and stale-entry sweeping

pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod registry;
