//! Polling and delta-aggregation pipeline.
//!
//! ```text
//! StatusClient ─▶ SnapshotParser ─▶ Poller ──(snapshots)──▶ Aggregator ─┬─(closed sessions)─▶ SessionWriter
//!                                                                      └─(samples)─────────▶ DataWriter
//! ```
//!
//! One poller/aggregator pair runs per monitored host; the two writers are
//! shared by every host.

pub mod aggregator;
pub mod poller;
pub mod snapshot_parser;
pub mod status_client;
pub mod types;


pub use aggregator::{Aggregator, SnapshotDiff};
pub use poller::Poller;
pub use snapshot_parser::parse_snapshot;
pub use status_client::{StatusClient, StatusSource};
pub use types::{BandwidthSample, ByteCounters, SessionKey, SessionRecord, Snapshot, UserKey, ALL_USERS};
