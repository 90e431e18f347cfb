//! Storage subsystem
//!
//! This module persists the two telemetry streams and serves the read queries
//! used by the reporting surface.
//!
//! Components:
//! - `storage_trait`: the `TelemetryStore` write contract.
//! - `types`: rows and filters shared by the write and read sides.
//! - `database_storage`: ORM-based implementation using SeaORM.
//! - `db_entities`: SeaORM entity models for the database backend.
//! - `report_filter`: helpers to build report queries.
//! - `writers`: the channel consumers feeding a `TelemetryStore`.

pub mod database_storage;
pub mod db_entities;
pub mod report_filter;
pub mod storage_trait;
pub mod types;
pub mod writers;

pub use database_storage::DatabaseStorage;
pub use storage_trait::TelemetryStore;
pub use writers::{DataWriter, SessionWriter};
