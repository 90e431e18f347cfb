//! Per-host diff engine.
//!
//! The aggregator keeps the previous snapshot of its host and, for every new
//! one, works out which sessions went away and how many bytes each user moved
//! since the previous poll. Closed sessions and bandwidth samples leave on two
//! separate channels.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::mpsc::{Receiver, Sender};

use super::types::{BandwidthSample, ByteCounters, SessionRecord, Snapshot, UserKey};
use crate::error_handling::types::PipelineError;

/// Outcome of diffing one snapshot against its predecessor.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Sessions gone since the previous poll, `closed_at` already stamped
    pub closed: Vec<SessionRecord>,
    /// `None` when the interval saw neither traffic nor active users
    pub sample: Option<BandwidthSample>,
}

pub struct Aggregator {
    previous: Snapshot,
}

impl Aggregator {
    /// Starts from an empty snapshot taken at `started_at`.
    pub fn new(host: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            previous: Snapshot::empty(host, started_at),
        }
    }

    pub fn host(&self) -> &str {
        &self.previous.host
    }

    /// Diffs `current` against the retained snapshot and retains `current`.
    pub fn ingest(&mut self, current: Snapshot) -> SnapshotDiff {
        let previous = std::mem::replace(&mut self.previous, current);
        let current = &self.previous;
        let interval_start = previous.captured_at;

        let mut buckets: BTreeMap<UserKey, ByteCounters> = BTreeMap::new();
        buckets.insert(UserKey::AllUsers, ByteCounters::default());
        for (key, record) in &current.sessions {
            let delta = match previous.sessions.get(key) {
                Some(before) => ByteCounters::new(
                    record.bytes_sent - before.bytes_sent,
                    record.bytes_received - before.bytes_received,
                ),
                None => ByteCounters::new(record.bytes_sent, record.bytes_received),
            };
            *buckets.entry(UserKey::user(record.user.as_str())).or_default() += delta;
            *buckets.entry(UserKey::AllUsers).or_default() += delta;
        }

        let mut closed: Vec<SessionRecord> = previous
            .sessions
            .into_iter()
            .filter(|(key, _)| !current.sessions.contains_key(key))
            .map(|(_, mut record)| {
                record.closed_at = Some(interval_start);
                record
            })
            .collect();
        closed.sort_by(|a, b| {
            a.connected_since_epoch
                .cmp(&b.connected_since_epoch)
                .then_with(|| a.key().cmp(&b.key()))
        });

        let has_traffic = !buckets[&UserKey::AllUsers].is_zero();
        let has_users = buckets.len() > 1;
        let sample = (has_traffic || has_users).then(|| BandwidthSample {
            host: current.host.clone(),
            interval_start,
            interval_end: current.captured_at,
            per_user: buckets,
        });

        SnapshotDiff { closed, sample }
    }

    /// Consumes snapshots until the poller goes away.
    ///
    /// Closed sessions are pushed before the interval's sample.
    pub async fn run(
        mut self,
        mut snapshots: Receiver<Snapshot>,
        closed_sessions: Sender<SessionRecord>,
        samples: Sender<BandwidthSample>,
    ) -> Result<(), PipelineError> {
        info!("[{}] aggregator started", self.host());
        while let Some(snapshot) = snapshots.recv().await {
            let diff = self.ingest(snapshot);
            for record in diff.closed {
                debug!("[{}] session closed: {}", record.host, record.key());
                closed_sessions
                    .send(record)
                    .await
                    .map_err(|_| PipelineError::ChannelClosed("closed sessions"))?;
            }
            if let Some(sample) = diff.sample {
                let total = sample.total();
                debug!(
                    "[{}] {} user(s) sent {} and received {} bytes",
                    sample.host,
                    sample.per_user.len() - 1,
                    total.sent,
                    total.received
                );
                samples
                    .send(sample)
                    .await
                    .map_err(|_| PipelineError::ChannelClosed("bandwidth samples"))?;
            }
        }
        Err(PipelineError::ChannelClosed("snapshots"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tokio::sync::mpsc;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn session(user: &str, ip: &str, sent: i64, received: i64, since: i64) -> SessionRecord {
        SessionRecord {
            host: String::from("office"),
            user: user.to_string(),
            public_address: ip.to_string(),
            internal_address: String::from("10.8.0.6"),
            bytes_sent: sent,
            bytes_received: received,
            connected_since: format!("since {}", since),
            connected_since_epoch: since,
            closed_at: None,
        }
    }

    fn snapshot(at: i64, records: Vec<SessionRecord>) -> Snapshot {
        Snapshot {
            host: String::from("office"),
            captured_at: t(at),
            sessions: records.into_iter().map(|r| (r.key(), r)).collect(),
        }
    }

    fn assert_conserved(sample: &BandwidthSample) {
        let mut sum = ByteCounters::default();
        for (_, counters) in sample.real_users() {
            sum += *counters;
        }
        assert_eq!(sum, sample.total());
    }

    #[test]
    fn test_new_session_counts_from_zero() {
        let mut aggregator = Aggregator::new("office", t(0));
        let diff = aggregator.ingest(snapshot(60, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]));

        assert!(diff.closed.is_empty());
        let sample = diff.sample.unwrap();
        assert_eq!(sample.host, "office");
        assert_eq!(sample.interval_start, t(0));
        assert_eq!(sample.interval_end, t(60));
        assert_eq!(sample.get("A"), Some(ByteCounters::new(100, 50)));
        assert_eq!(sample.total(), ByteCounters::new(100, 50));
        assert_eq!(sample.per_user.len(), 2);
    }

    #[test]
    fn test_disappeared_session_is_closed_at_previous_poll() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(60, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]));
        let diff = aggregator.ingest(snapshot(120, vec![]));

        assert_eq!(diff.closed.len(), 1);
        assert_eq!(diff.closed[0].user, "A");
        assert_eq!(diff.closed[0].closed_at, Some(t(60)));
        assert_eq!(diff.closed[0].bytes_sent, 100);
        assert_eq!(diff.sample, None);
    }

    #[test]
    fn test_growing_session_yields_delta() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(60, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]));
        let diff = aggregator.ingest(snapshot(120, vec![session("A", "1.1.1.1:1", 130, 50, 1000)]));

        assert!(diff.closed.is_empty());
        let sample = diff.sample.unwrap();
        assert_eq!(sample.interval_start, t(60));
        assert_eq!(sample.get("A"), Some(ByteCounters::new(30, 0)));
        assert_eq!(sample.total(), ByteCounters::new(30, 0));
    }

    #[test]
    fn test_idle_host_emits_nothing() {
        let mut aggregator = Aggregator::new("office", t(0));
        assert_eq!(aggregator.ingest(snapshot(60, vec![])), SnapshotDiff::default());
        assert_eq!(aggregator.ingest(snapshot(120, vec![])), SnapshotDiff::default());
    }

    #[test]
    fn test_idle_but_connected_user_still_reported() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(60, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]));
        let sample = aggregator
            .ingest(snapshot(120, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]))
            .sample
            .unwrap();

        assert_eq!(sample.get("A"), Some(ByteCounters::default()));
        assert!(sample.total().is_zero());
    }

    #[test]
    fn test_sessions_of_one_user_are_summed_and_conserved() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(
            60,
            vec![
                session("A", "1.1.1.1:1", 100, 10, 1000),
                session("A", "2.2.2.2:1", 200, 20, 1001),
                session("B", "3.3.3.3:1", 5, 5, 1002),
            ],
        ));
        let diff = aggregator.ingest(snapshot(
            120,
            vec![
                session("A", "1.1.1.1:1", 150, 10, 1000),
                session("A", "2.2.2.2:1", 260, 25, 1001),
                session("B", "3.3.3.3:1", 5, 5, 1002),
                session("C", "4.4.4.4:1", 7, 9, 1100),
            ],
        ));

        let sample = diff.sample.unwrap();
        assert_eq!(sample.get("A"), Some(ByteCounters::new(110, 5)));
        assert_eq!(sample.get("B"), Some(ByteCounters::new(0, 0)));
        assert_eq!(sample.get("C"), Some(ByteCounters::new(7, 9)));
        assert_eq!(sample.total(), ByteCounters::new(117, 14));
        assert_conserved(&sample);
    }

    #[test]
    fn test_reconnect_is_a_new_session() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(60, vec![session("A", "1.1.1.1:1", 500, 500, 1000)]));
        let diff = aggregator.ingest(snapshot(120, vec![session("A", "1.1.1.1:1", 40, 4, 1090)]));

        assert_eq!(diff.closed.len(), 1);
        assert_eq!(diff.closed[0].connected_since_epoch, 1000);
        assert_eq!(diff.closed[0].closed_at, Some(t(60)));
        let sample = diff.sample.unwrap();
        assert_eq!(sample.get("A"), Some(ByteCounters::new(40, 4)));
    }

    #[test]
    fn test_shrinking_counter_propagates_negative_delta() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(60, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]));
        let sample = aggregator
            .ingest(snapshot(120, vec![session("A", "1.1.1.1:1", 90, 50, 1000)]))
            .sample
            .unwrap();

        assert_eq!(sample.get("A"), Some(ByteCounters::new(-10, 0)));
        assert_eq!(sample.total(), ByteCounters::new(-10, 0));
    }

    #[test]
    fn test_user_named_like_aggregate_does_not_collide() {
        let mut aggregator = Aggregator::new("office", t(0));
        let sample = aggregator
            .ingest(snapshot(60, vec![session("__ALL__", "1.1.1.1:1", 3, 4, 1)]))
            .sample
            .unwrap();

        assert_eq!(sample.get("__ALL__"), Some(ByteCounters::new(3, 4)));
        assert_eq!(sample.total(), ByteCounters::new(3, 4));
        assert_eq!(sample.per_user.len(), 2);
    }

    #[test]
    fn test_each_session_closes_exactly_once() {
        let mut aggregator = Aggregator::new("office", t(0));
        aggregator.ingest(snapshot(
            60,
            vec![
                session("A", "1.1.1.1:1", 1, 1, 1000),
                session("B", "2.2.2.2:1", 1, 1, 900),
            ],
        ));
        let first = aggregator.ingest(snapshot(120, vec![]));
        let second = aggregator.ingest(snapshot(180, vec![]));

        let users: Vec<&str> = first.closed.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["B", "A"]);
        assert!(second.closed.is_empty());
    }

    #[tokio::test]
    async fn test_run_routes_diffs_to_channels() {
        let (snap_tx, snap_rx) = mpsc::channel(4);
        let (closed_tx, mut closed_rx) = mpsc::channel(4);
        let (sample_tx, mut sample_rx) = mpsc::channel(4);
        let handle = tokio::spawn(Aggregator::new("office", t(0)).run(snap_rx, closed_tx, sample_tx));

        snap_tx
            .send(snapshot(60, vec![session("A", "1.1.1.1:1", 100, 50, 1000)]))
            .await
            .unwrap();
        snap_tx.send(snapshot(120, vec![])).await.unwrap();

        let sample = sample_rx.recv().await.unwrap();
        assert_eq!(sample.total(), ByteCounters::new(100, 50));
        let closed = closed_rx.recv().await.unwrap();
        assert_eq!(closed.closed_at, Some(t(60)));

        drop(snap_tx);
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PipelineError::ChannelClosed("snapshots"))));
        assert!(sample_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_fails_when_writer_is_gone() {
        let (snap_tx, snap_rx) = mpsc::channel(4);
        let (closed_tx, closed_rx) = mpsc::channel(4);
        let (sample_tx, _sample_rx) = mpsc::channel(4);
        drop(closed_rx);
        let handle = tokio::spawn(Aggregator::new("office", t(0)).run(snap_rx, closed_tx, sample_tx));

        snap_tx
            .send(snapshot(60, vec![session("A", "1.1.1.1:1", 1, 1, 1)]))
            .await
            .unwrap();
        snap_tx.send(snapshot(120, vec![])).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(PipelineError::ChannelClosed("closed sessions"))
        ));
    }
}
