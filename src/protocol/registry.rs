//! # Correlation Registry
//!
//! Maps message tags to the one-shot channel of the caller waiting for the
//! reply. The writer inserts an entry before the frame leaves the process; the
//! read path removes it when the reply arrives.
//!
//! The registry has its own lock, separate from the connection's write lock,
//! and never holds it across I/O, so lookups from the read path are not stuck
//! behind a slow socket write.
//!
//! Only these paths mutate the table:
//! - insert by the writer when a tagged frame is about to be written
//! - removal by the writer when that write fails
//! - removal by the read path on delivery
//! - removal of abandoned entries by [`CorrelationRegistry::sweep_expired`]

use crate::error::{constants, DispatchError, Result};
use crate::utils::timeout::with_timeout_error;
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

struct PendingEntry {
    tx: oneshot::Sender<Bytes>,
    registered_at: Instant,
}

/// Outcome of handing an inbound payload to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A live waiter received the payload
    Delivered,
    /// The entry existed but its waiter had already gone away
    Abandoned,
    /// No entry for the tag: late, duplicate or unsolicited
    NoWaiter,
}

/// Thread-safe tag → waiter table
#[derive(Default)]
pub struct CorrelationRegistry {
    pending: Mutex<HashMap<String, PendingEntry>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, PendingEntry>>> {
        self.pending
            .lock()
            .map_err(|_| DispatchError::LockPoisoned(constants::ERR_REGISTRY_LOCK.into()))
    }

    /// Create a single-use channel for `tag`.
    ///
    /// A second registration under a live tag replaces the first; the earlier
    /// waiter then resolves with [`DispatchError::ResponseDropped`].
    pub fn register(&self, tag: &str) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            tx,
            registered_at: Instant::now(),
        };

        let replaced = self.lock()?.insert(tag.to_string(), entry).is_some();
        if replaced {
            warn!(tag, "Replaced a pending entry registered under the same tag");
        } else {
            trace!(tag, "Pending entry registered");
        }

        Ok(PendingResponse {
            tag: tag.to_string(),
            rx,
        })
    }

    /// Drop the entry for `tag`. Returns whether one existed.
    pub fn remove(&self, tag: &str) -> Result<bool> {
        let removed = self.lock()?.remove(tag).is_some();
        if removed {
            trace!(tag, "Pending entry removed");
        }
        Ok(removed)
    }

    /// Remove the entry for `tag` and hand `payload` to its waiter.
    ///
    /// The bytes are passed on untouched; binary replies are ciphertext and
    /// text replies are decoded by whoever awaits them. Never blocks: the
    /// channel holds exactly one value.
    pub fn deliver(&self, tag: &str, payload: Bytes) -> Result<Delivery> {
        let entry = self.lock()?.remove(tag);
        let Some(entry) = entry else {
            debug!(tag, "No waiter for tag, dropping reply");
            return Ok(Delivery::NoWaiter);
        };

        match entry.tx.send(payload) {
            Ok(()) => {
                trace!(tag, "Reply delivered");
                Ok(Delivery::Delivered)
            }
            Err(_) => {
                debug!(tag, "Waiter gone before reply arrived");
                Ok(Delivery::Abandoned)
            }
        }
    }

    /// Remove entries older than `ttl` or whose waiter has been dropped.
    /// Returns how many were removed.
    pub fn sweep_expired(&self, ttl: Duration) -> Result<usize> {
        let now = Instant::now();
        let mut pending = self.lock()?;
        let before = pending.len();
        pending.retain(|_, entry| {
            !entry.tx.is_closed() && now.duration_since(entry.registered_at) < ttl
        });
        let removed = before - pending.len();
        drop(pending);

        if removed > 0 {
            debug!(removed, "Swept stale pending entries");
        }
        Ok(removed)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags currently awaiting a reply, in no particular order
    pub fn tags(&self) -> Vec<String> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

/// Receiving half of a registry entry.
///
/// Resolves with the reply payload, or with [`DispatchError::ResponseDropped`]
/// if the entry was removed without a reply. Always race it against a deadline,
/// e.g. with [`PendingResponse::wait`].
#[derive(Debug)]
pub struct PendingResponse {
    tag: String,
    rx: oneshot::Receiver<Bytes>,
}

impl PendingResponse {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Wait at most `timeout` for the reply.
    ///
    /// Timing out does not touch the registry; the entry stays until delivery
    /// or the next sweep.
    pub async fn wait(self, timeout: Duration) -> Result<Bytes> {
        with_timeout_error(self, timeout, constants::ERR_CONNECTION_TIMEOUT).await
    }

    /// Take the reply if it has already arrived
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl Future for PendingResponse {
    type Output = Result<Bytes>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(payload)) => Poll::Ready(Ok(payload)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DispatchError::ResponseDropped(
                this.tag.clone(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
