//! # Connection
//!
//! Per-connection dispatch state: the transport behind its write lock, the
//! correlation registry, the tag counter and the server liveness clock.
//!
//! Every send goes through [`Conn::write`]:
//!
//! 1. take the write lock for the whole operation
//! 2. register the tag (registry lock, held only for the insert)
//! 3. write the frame
//! 4. on failure, remove the tag again before returning the error
//!
//! Because registration happens under the write lock and strictly before the
//! bytes are written, a reply can never arrive for a tag that is not yet known.

use crate::config::ConnectionConfig;
use crate::core::frame::{self, Flag, FrameKind, Metric, KEEPALIVE_BODY, KEEPALIVE_TAG};
use crate::core::node::Marshal;
use crate::core::tag::{MessageTag, TagGenerator};
use crate::error::{DispatchError, Result};
use crate::protocol::registry::{CorrelationRegistry, PendingResponse};
use crate::transport::Transport;
use crate::utils::crypto::{IvMode, SessionKeys};
use crate::utils::metrics::Metrics;
use crate::utils::time::from_unix_millis;
use crate::utils::timeout::DEFAULT_MSG_TIMEOUT;

use bytes::Bytes;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// One logical connection to the remote service.
///
/// Share it with `Arc`; all methods take `&self`.
pub struct Conn<T: Transport> {
    transport: Mutex<T>,
    registry: Arc<CorrelationRegistry>,
    keys: SessionKeys,
    tags: TagGenerator,
    server_last_seen: RwLock<Option<SystemTime>>,
    msg_timeout: Duration,
    iv_mode: IvMode,
    max_frame_size: usize,
    metrics: Arc<Metrics>,
}

impl<T: Transport> Conn<T> {
    pub fn new(transport: T, keys: SessionKeys) -> Self {
        Self {
            transport: Mutex::new(transport),
            registry: Arc::new(CorrelationRegistry::new()),
            keys,
            tags: TagGenerator::new(),
            server_last_seen: RwLock::new(None),
            msg_timeout: DEFAULT_MSG_TIMEOUT,
            iv_mode: IvMode::Random,
            max_frame_size: crate::config::MAX_FRAME_SIZE,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn from_config(transport: T, keys: SessionKeys, config: &ConnectionConfig) -> Self {
        let iv_mode = if config.fixed_zero_iv {
            IvMode::ZERO
        } else {
            IvMode::Random
        };
        Self::new(transport, keys)
            .with_msg_timeout(config.msg_timeout)
            .with_iv_mode(iv_mode)
            .with_max_frame_size(config.max_frame_size)
    }

    pub fn with_msg_timeout(mut self, msg_timeout: Duration) -> Self {
        self.msg_timeout = msg_timeout;
        self
    }

    pub fn with_iv_mode(mut self, iv_mode: IvMode) -> Self {
        self.iv_mode = iv_mode;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Continue the tag sequence of an earlier connection
    pub fn with_msg_count(mut self, count: u64) -> Self {
        self.tags = TagGenerator::starting_at(count);
        self
    }

    /// Registry shared with the read path
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn msg_timeout(&self) -> Duration {
        self.msg_timeout
    }

    /// Number of confirmed document and binary writes
    pub fn msg_count(&self) -> u64 {
        self.tags.count()
    }

    /// Mint a tag for the next message. The counter moves only after a write succeeds.
    pub fn new_tag(&self) -> Result<MessageTag> {
        self.tags.new_tag()
    }

    /// Last moment the server confirmed liveness, as reported by its own clock
    pub fn server_last_seen(&self) -> Option<SystemTime> {
        *self
            .server_last_seen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a raw frame. With a non-empty `tag` a reply channel is registered
    /// first and returned; with an empty tag the frame is fire-and-forget.
    #[instrument(skip(self, data), fields(bytes = data.len()), level = "debug")]
    pub async fn write(
        &self,
        kind: FrameKind,
        tag: &str,
        data: Bytes,
    ) -> Result<Option<PendingResponse>> {
        let mut transport = self.transport.lock().await;
        if tag.is_empty() {
            self.send_frame(&mut transport, kind, data).await?;
            Ok(None)
        } else {
            self.write_tagged(&mut transport, kind, tag, data)
                .await
                .map(Some)
        }
    }

    /// Send a structured document as `<tag>,<json>` and return its reply channel.
    ///
    /// The tag is minted under the write lock, so concurrent document sends
    /// never share one.
    #[instrument(skip(self, document), level = "debug")]
    pub async fn write_json<D>(&self, document: &D) -> Result<PendingResponse>
    where
        D: Serialize + ?Sized,
    {
        let body =
            serde_json::to_vec(document).map_err(|e| DispatchError::Encoding(e.to_string()))?;

        let mut transport = self.transport.lock().await;
        let tag = self.tags.new_tag()?;
        let bytes = frame::text_frame(tag.as_str(), &body);

        let pending = self
            .write_tagged(&mut transport, FrameKind::Text, tag.as_str(), bytes)
            .await?;
        self.tags.advance();
        debug!(tag = %tag, "Document sent");
        Ok(pending)
    }

    /// Seal `node` and send it as `<tag>,<metric><flag><sealed>`.
    ///
    /// Tags shorter than two bytes are rejected before anything is encoded,
    /// registered or written.
    #[instrument(skip(self, node, metric, flag), fields(metric = metric.0, flag = flag.0), level = "debug")]
    pub async fn write_binary<N>(
        &self,
        node: &N,
        metric: Metric,
        flag: Flag,
        tag: &str,
    ) -> Result<PendingResponse>
    where
        N: Marshal + ?Sized,
    {
        frame::validate_binary_tag(tag)?;

        let plain = node.marshal()?;
        let sealed = self.keys.seal(self.iv_mode, &plain)?;
        let bytes = frame::binary_frame(tag, metric, flag, &sealed);

        let mut transport = self.transport.lock().await;
        let pending = self
            .write_tagged(&mut transport, FrameKind::Binary, tag, bytes)
            .await?;
        self.tags.advance();
        debug!(tag, "Node sent");
        Ok(pending)
    }

    /// Probe liveness: send a keepalive and wait up to `msg_timeout` for the
    /// server's millisecond timestamp.
    ///
    /// On success the server clock becomes the new last-seen time. An
    /// unparseable reply or a timeout leaves it untouched.
    #[instrument(skip(self), level = "debug")]
    pub async fn send_keepalive(&self) -> Result<()> {
        let result = self.keepalive_round_trip().await;
        self.metrics.keepalive(result.is_ok());
        if let Err(ref e) = result {
            warn!(error = %e, "Keepalive failed");
        }
        result
    }

    async fn keepalive_round_trip(&self) -> Result<()> {
        let pending = {
            let mut transport = self.transport.lock().await;
            self.write_tagged(
                &mut transport,
                FrameKind::Text,
                KEEPALIVE_TAG,
                Bytes::from_static(KEEPALIVE_BODY),
            )
            .await?
        };

        let reply = self.await_text(pending).await?;

        // signed, like the server's own clock; pre-epoch values are kept as is
        let millis = reply.trim().parse::<i64>().map_err(|e| {
            DispatchError::Protocol(format!("invalid keepalive timestamp {reply:?}: {e}"))
        })?;
        let seen = from_unix_millis(millis).ok_or_else(|| {
            DispatchError::Protocol(format!("keepalive timestamp out of range: {millis}"))
        })?;
        *self
            .server_last_seen
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(seen);
        debug!(millis, "Server liveness confirmed");
        Ok(())
    }

    /// Send a request and wait for its correlated reply within `msg_timeout`.
    pub async fn request_json<D>(&self, document: &D) -> Result<String>
    where
        D: Serialize + ?Sized,
    {
        let pending = self.write_json(document).await?;
        self.await_text(pending).await
    }

    /// [`Conn::await_reply`] for text replies. A payload that is not UTF-8 is a
    /// [`DispatchError::Protocol`] error.
    pub async fn await_text(&self, pending: PendingResponse) -> Result<String> {
        let tag = pending.tag().to_string();
        let reply = self.await_reply(pending).await?;
        String::from_utf8(reply.to_vec()).map_err(|e| {
            DispatchError::Protocol(format!("reply to {tag} is not valid UTF-8: {e}"))
        })
    }

    /// Wait for `pending` within `msg_timeout`, counting timeouts. The payload
    /// is returned exactly as it arrived.
    pub async fn await_reply(&self, pending: PendingResponse) -> Result<Bytes> {
        let result = pending.wait(self.msg_timeout).await;
        if matches!(result, Err(DispatchError::Timeout(_))) {
            self.metrics.reply_timeout();
        }
        result
    }

    /// Register `tag`, write, and undo the registration if the write fails.
    /// Caller holds the write lock.
    async fn write_tagged(
        &self,
        transport: &mut T,
        kind: FrameKind,
        tag: &str,
        data: Bytes,
    ) -> Result<PendingResponse> {
        let pending = self.registry.register(tag)?;
        self.metrics.pending_registered();

        if let Err(e) = self.send_frame(transport, kind, data).await {
            if let Err(cleanup) = self.registry.remove(tag) {
                warn!(tag, error = %cleanup, "Failed to remove entry after write error");
            }
            return Err(e);
        }
        Ok(pending)
    }

    /// Hand one frame to the transport. Caller holds the write lock.
    async fn send_frame(&self, transport: &mut T, kind: FrameKind, data: Bytes) -> Result<()> {
        let len = data.len();
        if len > self.max_frame_size {
            return Err(DispatchError::OversizedFrame(len));
        }

        match transport.write_message(kind, data).await {
            Ok(()) => {
                self.metrics.frame_sent(kind, len as u64);
                Ok(())
            }
            Err(e) => {
                self.metrics.write_failed();
                warn!(kind = ?kind, bytes = len, error = %e, "Socket write failed");
                Err(match e {
                    DispatchError::TransportWrite(_) => e,
                    other => DispatchError::TransportWrite(other.to_string()),
                })
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for Conn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("msg_count", &self.msg_count())
            .field("pending", &self.registry.len())
            .field("msg_timeout", &self.msg_timeout)
            .field("server_last_seen", &self.server_last_seen())
            .finish()
    }
}
