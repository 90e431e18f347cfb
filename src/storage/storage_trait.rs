//! Storage Trait
//!
//! This module defines the `TelemetryStore` trait, the write contract the
//! pipeline writers rely on.
//!
//! Implementors of this trait are responsible for:
//! - Creating their tables when missing, idempotently
//! - Appending closed session events
//! - Appending bandwidth rows
//!
//! Appends are expected to be durable once the returned future resolves.

use std::future::Future;

use crate::error_handling::types::StorageError;
use crate::monitoring::types::SessionRecord;
use crate::storage::types::BandwidthRow;

pub trait TelemetryStore: Send + Sync + 'static {
    /// Creates the session event table if it does not exist yet.
    fn prepare_sessions(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Creates the bandwidth table if it does not exist yet.
    fn prepare_data(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Appends one closed session. `record.closed_at` is expected to be set.
    fn append_session_event(
        &self,
        record: &SessionRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Appends one user's traffic for one interval.
    fn append_bandwidth_row(
        &self,
        row: &BandwidthRow,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
