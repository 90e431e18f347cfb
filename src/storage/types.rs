use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::BandwidthSample;

/// One persisted bandwidth row: one user of one host over one interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthRow {
    pub host: String,
    /// Unix seconds
    pub interval_start: i64,
    /// Unix seconds
    pub interval_end: i64,
    pub user: String,
    pub sent: i64,
    pub received: i64,
}

impl BandwidthSample {
    /// Flattens the sample into rows, the aggregate first.
    pub fn rows(&self) -> Vec<BandwidthRow> {
        self.per_user
            .iter()
            .map(|(user, counters)| BandwidthRow {
                host: self.host.clone(),
                interval_start: self.interval_start.timestamp(),
                interval_end: self.interval_end.timestamp(),
                user: user.to_string(),
                sent: counters.sent,
                received: counters.received,
            })
            .collect()
    }
}

/// Read-side query parameters shared by every report query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub host: Option<String>,
    /// Lower bound on the row timestamp, inclusive
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}
