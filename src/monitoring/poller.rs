use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;

use super::snapshot_parser::parse_snapshot;
use super::status_client::StatusSource;
use super::types::Snapshot;
use crate::error_handling::types::PipelineError;

/// Polls one host on a fixed period and hands every snapshot downstream.
///
/// A full channel blocks the poller until the aggregator catches up; snapshots
/// are never dropped.
pub struct Poller<S> {
    host: String,
    source: S,
    interval: Duration,
}

impl<S: StatusSource> Poller<S> {
    pub fn new(host: impl Into<String>, source: S, interval: Duration) -> Self {
        Self {
            host: host.into(),
            source,
            interval,
        }
    }

    /// Polls one time and returns the parsed snapshot.
    pub async fn poll_once(&mut self) -> Snapshot {
        let captured_at = Utc::now();
        let lines = self.source.fetch_status().await;
        parse_snapshot(&self.host, &lines, captured_at)
    }

    /// Only returns once the downstream aggregator is gone.
    pub async fn run(mut self, snapshots: Sender<Snapshot>) -> Result<(), PipelineError> {
        info!("[{}] started polling every {:?}", self.host, self.interval);
        loop {
            let started = Instant::now();
            let snapshot = self.poll_once().await;
            debug!(
                "[{}] polled {} active session(s)",
                self.host,
                snapshot.sessions.len()
            );
            snapshots
                .send(snapshot)
                .await
                .map_err(|_| PipelineError::ChannelClosed("snapshots"))?;

            let elapsed = started.elapsed();
            match self.interval.checked_sub(elapsed) {
                Some(wait) if !wait.is_zero() => tokio::time::sleep(wait).await,
                _ => warn!(
                    "[{}] falling behind: polling took {:?} with a {:?} interval",
                    self.host, elapsed, self.interval
                ),
            }
        }
    }
}
