//! Shared fixtures for integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use futures::StreamExt;
use session_dispatch::core::frame::{split_tag, Frame, FrameKind, KEEPALIVE_TAG};
use session_dispatch::{Conn, DispatchError, Dispatcher, Result, SessionKeys, SinkTransport, Transport};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const ENC_KEY: [u8; 32] = [0x5a; 32];
pub const MAC_KEY: [u8; 32] = [0xa5; 32];

pub fn keys() -> SessionKeys {
    SessionKeys::new(ENC_KEY.to_vec(), MAC_KEY.to_vec()).expect("valid keys")
}

/// Transport that records frames and can be told to fail
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub frames: Arc<Mutex<Vec<Frame>>>,
    pub fail: Arc<AtomicBool>,
    pub writes: Arc<AtomicUsize>,
}

impl RecordingTransport {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Transport for RecordingTransport {
    fn write_message(
        &mut self,
        kind: FrameKind,
        data: Bytes,
    ) -> impl Future<Output = Result<()>> + Send {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(DispatchError::TransportWrite("connection reset by peer".into()))
        } else {
            self.frames.lock().unwrap().push(Frame::new(kind, data));
            Ok(())
        };
        std::future::ready(result)
    }
}

pub type ChannelConn = Conn<SinkTransport<futures::channel::mpsc::Sender<Frame>>>;

/// Behaviour of the simulated remote end
#[derive(Clone, Copy, Debug)]
pub struct ServerBehavior {
    /// Probability that a request is never answered
    pub loss_rate: f32,
    /// Delay before each reply
    pub delay: Duration,
    /// Timestamp returned for keepalives
    pub clock_ms: u64,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            delay: Duration::ZERO,
            clock_ms: 1_700_000_000_123,
        }
    }
}

/// Connection wired to a simulated server that answers every tagged frame
/// with `<tag>,{"echo":<len>}` and every keepalive with `!<clock_ms>`.
pub fn connect_to_fake_server(
    msg_timeout: Duration,
    behavior: ServerBehavior,
) -> (Arc<ChannelConn>, JoinHandle<usize>) {
    let (tx, mut rx) = futures::channel::mpsc::channel::<Frame>(1024);
    let conn = Arc::new(Conn::new(SinkTransport::new(tx), keys()).with_msg_timeout(msg_timeout));
    let dispatcher = Dispatcher::new(conn.registry().clone()).with_metrics(conn.metrics().clone());

    let server = tokio::spawn(async move {
        let mut answered = 0usize;
        while let Some(frame) = rx.next().await {
            if behavior.loss_rate > 0.0 && rand::random::<f32>() < behavior.loss_rate {
                continue;
            }
            if !behavior.delay.is_zero() {
                tokio::time::sleep(behavior.delay).await;
            }
            let reply = if &frame.payload[..] == b"?,," {
                format!("{KEEPALIVE_TAG}{}", behavior.clock_ms)
            } else {
                let Some((tag, body)) = split_tag(&frame.payload) else {
                    continue;
                };
                format!("{tag},{{\"echo\":{}}}", body.len())
            };
            if dispatcher.route_text(&reply).is_ok() {
                answered += 1;
            }
        }
        answered
    });

    (conn, server)
}
