use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityName, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Schema,
};

use crate::error_handling::types::StorageError;
use crate::monitoring::types::SessionRecord;
use crate::storage::db_entities::{data, sessions};
use crate::storage::storage_trait::TelemetryStore;
use crate::storage::types::{BandwidthRow, ReportFilter};

/// SQLite (or any SeaORM backend) persistence for both telemetry streams.
///
/// Cloning is cheap and yields another handle on the same connection pool.
#[derive(Clone)]
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let db = Database::connect(url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        info!("Connected to {:?} telemetry database", db.get_database_backend());
        Ok(Self { db })
    }

    /// Opens (creating if needed) a SQLite database file.
    pub async fn open_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            }
        }
        Self::connect(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    async fn create_table<E: EntityTrait>(&self) -> Result<(), StorageError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut table = schema.create_table_from_entity(E::default());
        table.if_not_exists();
        self.db
            .execute(backend.build(&table))
            .await
            .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

        for mut index in schema.create_index_from_entity(E::default()) {
            index.if_not_exists();
            self.db
                .execute(backend.build(&index))
                .await
                .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;
        }
        debug!("Table `{}` ready", E::default().table_name());
        Ok(())
    }

    /// Bandwidth rows, newest interval first.
    pub async fn bandwidth_rows(&self, filter: &ReportFilter) -> Result<Vec<BandwidthRow>, StorageError> {
        let mut query = data::Entity::find();
        if let Some(ref host) = filter.host {
            query = query.filter(data::Column::Host.eq(host.as_str()));
        }
        if let Some(since) = filter.since {
            query = query.filter(data::Column::TimestampStart.gte(since.timestamp()));
        }
        query = query
            .order_by_desc(data::Column::TimestampStart)
            .order_by_desc(data::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let rows = query
            .all(&self.db)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        Ok(rows.into_iter().map(bandwidth_row_from_model).collect())
    }

    /// Closed sessions, most recently connected first.
    pub async fn session_events(&self, filter: &ReportFilter) -> Result<Vec<SessionRecord>, StorageError> {
        let mut query = sessions::Entity::find();
        if let Some(ref host) = filter.host {
            query = query.filter(sessions::Column::Host.eq(host.as_str()));
        }
        if let Some(since) = filter.since {
            query = query.filter(sessions::Column::ConnectedAt.gte(since.timestamp()));
        }
        query = query
            .order_by_desc(sessions::Column::ConnectedAt)
            .order_by_desc(sessions::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let rows = query
            .all(&self.db)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        Ok(rows.into_iter().map(session_record_from_model).collect())
    }

    /// Distinct host aliases with data, optionally restricted to activity since a time.
    pub async fn hosts(&self, since: Option<DateTime<Utc>>) -> Result<Vec<String>, StorageError> {
        let mut session_hosts = sessions::Entity::find()
            .select_only()
            .column(sessions::Column::Host)
            .distinct();
        let mut data_hosts = data::Entity::find()
            .select_only()
            .column(data::Column::Host)
            .distinct();
        if let Some(since) = since {
            session_hosts = session_hosts.filter(sessions::Column::ConnectedAt.gte(since.timestamp()));
            data_hosts = data_hosts.filter(data::Column::TimestampStart.gte(since.timestamp()));
        }

        let mut hosts = BTreeSet::new();
        for query in [session_hosts.into_tuple::<String>(), data_hosts.into_tuple::<String>()] {
            let found = query
                .all(&self.db)
                .await
                .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            hosts.extend(found);
        }
        Ok(hosts.into_iter().collect())
    }
}

impl TelemetryStore for DatabaseStorage {
    async fn prepare_sessions(&self) -> Result<(), StorageError> {
        self.create_table::<sessions::Entity>().await
    }

    async fn prepare_data(&self) -> Result<(), StorageError> {
        self.create_table::<data::Entity>().await
    }

    async fn append_session_event(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let model = sessions::ActiveModel {
            id: NotSet,
            host: Set(record.host.clone()),
            user: Set(record.user.clone()),
            ip: Set(record.public_address.clone()),
            internal_ip: Set(record.internal_address.clone()),
            sent: Set(record.bytes_sent),
            received: Set(record.bytes_received),
            connected_at_str: Set(record.connected_since.clone()),
            connected_at: Set(record.connected_since_epoch),
            closed_at: Set(record.closed_at.map(|t| t.timestamp())),
        };
        sessions::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn append_bandwidth_row(&self, row: &BandwidthRow) -> Result<(), StorageError> {
        let model = data::ActiveModel {
            id: NotSet,
            host: Set(row.host.clone()),
            timestamp_start: Set(row.interval_start),
            timestamp_end: Set(row.interval_end),
            user: Set(row.user.clone()),
            sent: Set(row.sent),
            received: Set(row.received),
        };
        data::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

fn bandwidth_row_from_model(model: data::Model) -> BandwidthRow {
    BandwidthRow {
        host: model.host,
        interval_start: model.timestamp_start,
        interval_end: model.timestamp_end,
        user: model.user,
        sent: model.sent,
        received: model.received,
    }
}

fn session_record_from_model(model: sessions::Model) -> SessionRecord {
    SessionRecord {
        host: model.host,
        user: model.user,
        public_address: model.ip,
        internal_address: model.internal_ip,
        bytes_sent: model.sent,
        bytes_received: model.received,
        connected_since: model.connected_at_str,
        connected_since_epoch: model.connected_at,
        closed_at: model.closed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
    }
}
