//! # Transport Boundary
//!
//! The writer talks to the physical connection through [`Transport`]. A
//! transport is not expected to be safe for concurrent use; the connection
//! serializes every call behind its write lock.
//!
//! ## Adapters
//! - [`SinkTransport`]: any `futures::Sink<Frame>`, e.g. a websocket sink or a
//!   `Framed` stream using [`codec::FrameCodec`]
//! - [`codec::FrameCodec`]: length-prefixed framing over plain byte streams

pub mod codec;

use crate::core::frame::{Frame, FrameKind};
use crate::error::{DispatchError, Result};
use bytes::Bytes;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::future::Future;
use tracing::trace;

/// Physical write side of a connection.
pub trait Transport: Send {
    /// Write one frame. Errors mean the frame may not have left the process.
    fn write_message(
        &mut self,
        kind: FrameKind,
        data: Bytes,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// [`Transport`] over any sink of frames.
#[derive(Debug)]
pub struct SinkTransport<S> {
    sink: S,
}

impl<S> SinkTransport<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S> Transport for SinkTransport<S>
where
    S: Sink<Frame> + Unpin + Send,
    S::Error: Display,
{
    fn write_message(
        &mut self,
        kind: FrameKind,
        data: Bytes,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let len = data.len();
            self.sink
                .send(Frame::new(kind, data))
                .await
                .map_err(|e| DispatchError::TransportWrite(e.to_string()))?;
            trace!(kind = ?kind, bytes = len, "Frame flushed to sink");
            Ok(())
        }
    }
}
