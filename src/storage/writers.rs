//! Channel consumers persisting the two telemetry streams.
//!
//! Each writer prepares its table on startup, then appends every received item
//! before taking the next one. A failed append ends the writer with an error;
//! there are no retries.

use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc::Receiver;

use crate::error_handling::types::PipelineError;
use crate::monitoring::types::{BandwidthSample, SessionRecord};
use crate::storage::storage_trait::TelemetryStore;

pub struct SessionWriter<S> {
    store: Arc<S>,
}

impl<S: TelemetryStore> SessionWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn run(self, mut records: Receiver<SessionRecord>) -> Result<(), PipelineError> {
        self.store.prepare_sessions().await?;
        info!("Session writer ready");
        while let Some(record) = records.recv().await {
            if let Err(e) = self.store.append_session_event(&record).await {
                error!("[{}] unable to persist session of {}: {}", record.host, record.user, e);
                return Err(e.into());
            }
            debug!("[{}] persisted session {}", record.host, record.key());
        }
        Err(PipelineError::ChannelClosed("closed sessions"))
    }
}

pub struct DataWriter<S> {
    store: Arc<S>,
}

impl<S: TelemetryStore> DataWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn run(self, mut samples: Receiver<BandwidthSample>) -> Result<(), PipelineError> {
        self.store.prepare_data().await?;
        info!("Data writer ready");
        while let Some(sample) = samples.recv().await {
            for row in sample.rows() {
                if let Err(e) = self.store.append_bandwidth_row(&row).await {
                    error!("[{}] unable to persist bandwidth of {}: {}", row.host, row.user, e);
                    return Err(e.into());
                }
            }
            debug!(
                "[{}] persisted {} bandwidth row(s) ending at {}",
                sample.host,
                sample.per_user.len(),
                sample.interval_end
            );
        }
        Err(PipelineError::ChannelClosed("bandwidth samples"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error_handling::types::StorageError;
    use crate::monitoring::types::{ByteCounters, UserKey};
    use crate::storage::types::BandwidthRow;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// In-memory store that starts failing after `fail_after` appends.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub prepared: AtomicUsize,
        pub sessions: Mutex<Vec<SessionRecord>>,
        pub rows: Mutex<Vec<BandwidthRow>>,
        pub fail_after: Option<usize>,
    }

    impl MemoryStore {
        pub(crate) fn failing_after(appends: usize) -> Self {
            Self {
                fail_after: Some(appends),
                ..Default::default()
            }
        }

        fn appended(&self) -> usize {
            self.sessions.lock().unwrap().len() + self.rows.lock().unwrap().len()
        }

        fn check(&self) -> Result<(), StorageError> {
            match self.fail_after {
                Some(limit) if self.appended() >= limit => {
                    Err(StorageError::WriteFailed(String::from("disk full")))
                }
                _ => Ok(()),
            }
        }
    }

    impl TelemetryStore for MemoryStore {
        async fn prepare_sessions(&self) -> Result<(), StorageError> {
            self.prepared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn prepare_data(&self) -> Result<(), StorageError> {
            self.prepared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn append_session_event(&self, record: &SessionRecord) -> Result<(), StorageError> {
            self.check()?;
            self.sessions.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn append_bandwidth_row(&self, row: &BandwidthRow) -> Result<(), StorageError> {
            self.check()?;
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }
    }

    fn record(user: &str) -> SessionRecord {
        SessionRecord {
            host: String::from("office"),
            user: user.to_string(),
            public_address: String::from("203.0.113.7:1"),
            internal_address: String::from("10.8.0.6"),
            bytes_sent: 1,
            bytes_received: 2,
            connected_since: String::from("since"),
            connected_since_epoch: 100,
            closed_at: DateTime::from_timestamp(160, 0),
        }
    }

    fn sample() -> BandwidthSample {
        let mut per_user = BTreeMap::new();
        per_user.insert(UserKey::AllUsers, ByteCounters::new(3, 3));
        per_user.insert(UserKey::user("A"), ByteCounters::new(1, 1));
        per_user.insert(UserKey::user("B"), ByteCounters::new(2, 2));
        BandwidthSample {
            host: String::from("office"),
            interval_start: DateTime::<Utc>::from_timestamp(60, 0).unwrap(),
            interval_end: DateTime::<Utc>::from_timestamp(120, 0).unwrap(),
            per_user,
        }
    }

    #[tokio::test]
    async fn test_session_writer_persists_in_order() {
        let store = Arc::new(MemoryStore::default());
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(SessionWriter::new(store.clone()).run(rx));

        tx.send(record("alice")).await.unwrap();
        tx.send(record("bob")).await.unwrap();
        drop(tx);

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PipelineError::ChannelClosed(_))));
        assert_eq!(store.prepared.load(Ordering::SeqCst), 1);
        let users: Vec<String> = store.sessions.lock().unwrap().iter().map(|r| r.user.clone()).collect();
        assert_eq!(users, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_data_writer_writes_one_row_per_user() {
        let store = Arc::new(MemoryStore::default());
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(DataWriter::new(store.clone()).run(rx));

        tx.send(sample()).await.unwrap();
        drop(tx);
        handle.await.unwrap().unwrap_err();

        let rows = store.rows.lock().unwrap();
        let users: Vec<&str> = rows.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["__ALL__", "A", "B"]);
        assert!(rows.iter().all(|r| r.interval_start == 60 && r.interval_end == 120));
    }

    #[tokio::test]
    async fn test_append_failure_stops_writer() {
        let store = Arc::new(MemoryStore::failing_after(1));
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(SessionWriter::new(store.clone()).run(rx));

        tx.send(record("alice")).await.unwrap();
        tx.send(record("bob")).await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(PipelineError::StorageError(StorageError::WriteFailed(_)))
        ));
        assert_eq!(store.sessions.lock().unwrap().len(), 1);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_data_writer_failure_mid_sample() {
        let store = Arc::new(MemoryStore::failing_after(2));
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(DataWriter::new(store.clone()).run(rx));

        tx.send(sample()).await.unwrap();
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(PipelineError::StorageError(_))));
        assert_eq!(store.rows.lock().unwrap().len(), 2);
    }
}
