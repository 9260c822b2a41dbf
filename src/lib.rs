//! # Session Dispatch
//!
//! Outbound dispatch and reply correlation for a persistent, full-duplex
//! session to a messaging service over one multiplexed socket.
//!
//! A caller asks the [`Conn`] to send a structured document, a sealed binary
//! node or a keepalive. The connection tags the message, registers a one-shot
//! reply channel under that tag and writes the frame, all under one write lock.
//! The read side hands inbound frames to a [`Dispatcher`], which finds the
//! waiter by tag and delivers the payload.
//!
//! ```rust,no_run
//! use session_dispatch::{Conn, Dispatcher, SessionKeys, SinkTransport};
//! use session_dispatch::core::frame::Frame;
//!
//! # async fn run() -> session_dispatch::Result<()> {
//! let (tx, _rx) = futures::channel::mpsc::channel::<Frame>(16);
//! let keys = SessionKeys::new(vec![0u8; 32], vec![1u8; 32])?;
//! let conn = Conn::new(SinkTransport::new(tx), keys);
//! let dispatcher = Dispatcher::new(conn.registry().clone());
//!
//! let pending = conn.write_json(&serde_json::json!(["query", "exist", "123"])).await?;
//! // ... the reader calls dispatcher.route(frame) for every inbound frame ...
//! # let _ = dispatcher;
//! let reply = conn.await_reply(pending).await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::frame::{Flag, Frame, FrameKind, Metric};
pub use crate::core::node::{Marshal, Node, NodeContent, RawNode};
pub use crate::core::tag::MessageTag;
pub use error::{DispatchError, Result};
pub use protocol::connection::Conn;
pub use protocol::dispatcher::{Dispatcher, Routed};
pub use protocol::registry::{CorrelationRegistry, Delivery, PendingResponse};
pub use transport::{SinkTransport, Transport};
pub use utils::crypto::{IvMode, SessionKeys};
