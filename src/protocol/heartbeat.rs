//! Background tasks that keep a connection honest.
//!
//! - [`spawn_keepalive`] probes liveness at a jittered interval and stops at the
//!   first failure, handing the error back through its `JoinHandle` so the owner
//!   can decide how to reconnect.
//! - [`spawn_registry_sweep`] removes correlation entries whose waiter gave up
//!   and whose reply never came.

use crate::config::HeartbeatConfig;
use crate::error::Result;
use crate::protocol::connection::Conn;
use crate::protocol::registry::CorrelationRegistry;
use crate::transport::Transport;
use crate::utils::metrics::Metrics;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Jittered keepalive interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveSchedule {
    pub min: Duration,
    pub max: Duration,
}

impl KeepaliveSchedule {
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self::new(config.keepalive_min, config.keepalive_max)
    }

    /// Pick the pause before the next probe, uniformly in `[min, max]`.
    pub fn next_interval(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Probe `conn` until `shutdown` fires or a probe fails.
///
/// Resolves `Ok(())` on shutdown (or when every sender of `shutdown` is
/// dropped) and `Err` with the probe's failure otherwise.
pub fn spawn_keepalive<T>(
    conn: Arc<Conn<T>>,
    schedule: KeepaliveSchedule,
    mut shutdown: mpsc::Receiver<()>,
) -> JoinHandle<Result<()>>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        loop {
            let pause = schedule.next_interval();
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Keepalive loop stopped");
                    conn.metrics().log_summary();
                    return Ok(());
                }
                _ = tokio::time::sleep(pause) => {
                    if let Err(e) = conn.send_keepalive().await {
                        warn!(error = %e, "Keepalive loop ending on failed probe");
                        return Err(e);
                    }
                    debug!(next_ms = pause.as_millis() as u64, "Keepalive ok");
                }
            }
        }
    })
}

/// Periodically drop entries older than `ttl` or whose waiter is gone.
pub fn spawn_registry_sweep(
    registry: Arc<CorrelationRegistry>,
    metrics: Option<Arc<Metrics>>,
    interval: Duration,
    ttl: Duration,
    mut shutdown: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Registry sweep stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match registry.sweep_expired(ttl) {
                        Ok(removed) => {
                            if let (Some(metrics), true) = (&metrics, removed > 0) {
                                metrics.pending_swept(removed as u64);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Registry sweep failed, stopping");
                            return;
                        }
                    }
                }
            }
        }
    })
}
