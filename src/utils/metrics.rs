//! Observability and Metrics
//!
//! Counters describing what a connection has written and how its correlated
//! replies resolved. Uses atomic counters so the writer, the heartbeat task and
//! the read path can all record without locking.

use crate::core::frame::FrameKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Per-connection metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Text frames written
    pub text_frames_sent: AtomicU64,
    /// Binary frames written
    pub binary_frames_sent: AtomicU64,
    /// Control frames written
    pub control_frames_sent: AtomicU64,
    /// Total payload bytes handed to the transport
    pub bytes_sent: AtomicU64,
    /// Transport writes that failed
    pub write_failures: AtomicU64,
    /// Correlation entries created
    pub pending_registered: AtomicU64,
    /// Replies delivered to a live waiter
    pub pending_delivered: AtomicU64,
    /// Stale entries removed by the sweep
    pub pending_swept: AtomicU64,
    /// Waits that hit their deadline
    pub reply_timeouts: AtomicU64,
    /// Keepalives answered with a valid timestamp
    pub keepalives_ok: AtomicU64,
    /// Keepalives that failed for any reason
    pub keepalives_failed: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            text_frames_sent: AtomicU64::new(0),
            binary_frames_sent: AtomicU64::new(0),
            control_frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            pending_registered: AtomicU64::new(0),
            pending_delivered: AtomicU64::new(0),
            pending_swept: AtomicU64::new(0),
            reply_timeouts: AtomicU64::new(0),
            keepalives_ok: AtomicU64::new(0),
            keepalives_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a frame handed to the transport
    pub fn frame_sent(&self, kind: FrameKind, byte_count: u64) {
        let counter = match kind {
            FrameKind::Text => &self.text_frames_sent,
            FrameKind::Binary => &self.binary_frames_sent,
            FrameKind::Control => &self.control_frames_sent,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn write_failed(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_registered(&self) {
        self.pending_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_delivered(&self) {
        self.pending_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_swept(&self, count: u64) {
        self.pending_swept.fetch_add(count, Ordering::Relaxed);
    }

    pub fn reply_timeout(&self) {
        self.reply_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn keepalive(&self, ok: bool) {
        if ok {
            self.keepalives_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.keepalives_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            text_frames_sent: self.text_frames_sent.load(Ordering::Relaxed),
            binary_frames_sent: self.binary_frames_sent.load(Ordering::Relaxed),
            control_frames_sent: self.control_frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            pending_registered: self.pending_registered.load(Ordering::Relaxed),
            pending_delivered: self.pending_delivered.load(Ordering::Relaxed),
            pending_swept: self.pending_swept.load(Ordering::Relaxed),
            reply_timeouts: self.reply_timeouts.load(Ordering::Relaxed),
            keepalives_ok: self.keepalives_ok.load(Ordering::Relaxed),
            keepalives_failed: self.keepalives_failed.load(Ordering::Relaxed),
            uptime_secs: self.uptime().as_secs(),
        }
    }

    /// Log a summary at info level
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            text = s.text_frames_sent,
            binary = s.binary_frames_sent,
            bytes = s.bytes_sent,
            write_failures = s.write_failures,
            registered = s.pending_registered,
            delivered = s.pending_delivered,
            swept = s.pending_swept,
            timeouts = s.reply_timeouts,
            uptime_secs = s.uptime_secs,
            "Connection metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub text_frames_sent: u64,
    pub binary_frames_sent: u64,
    pub control_frames_sent: u64,
    pub bytes_sent: u64,
    pub write_failures: u64,
    pub pending_registered: u64,
    pub pending_delivered: u64,
    pub pending_swept: u64,
    pub reply_timeouts: u64,
    pub keepalives_ok: u64,
    pub keepalives_failed: u64,
    pub uptime_secs: u64,
}
