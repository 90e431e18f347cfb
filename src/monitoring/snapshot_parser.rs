//! Turns `CLIENT_LIST` status lines into a [`Snapshot`].
//!
//! Field layout of a session line (only the first nine fields are read):
//!
//! ```text
//! CLIENT_LIST,Common Name,Real Address,Virtual Address,Virtual IPv6 Address,
//! Bytes Received,Bytes Sent,Connected Since,Connected Since (time_t),...
//! ```

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;

use super::types::{SessionRecord, Snapshot};
use crate::error_handling::types::ParseError;

const SIGNIFICANT_FIELDS: usize = 9;

/// Builds the snapshot of one host from the raw status lines.
///
/// Malformed lines are logged and skipped. If two lines yield the same session
/// key, the later one wins.
pub fn parse_snapshot(host: &str, lines: &[String], captured_at: DateTime<Utc>) -> Snapshot {
    let mut sessions = HashMap::with_capacity(lines.len());
    for line in lines {
        match parse_session_line(host, line) {
            Ok(record) => {
                if let Some(previous) = sessions.insert(record.key(), record) {
                    debug!("[{}] duplicate session line for {}", host, previous.key());
                }
            }
            Err(e) => warn!("[{}] dropping malformed status line {:?}: {}", host, line, e),
        }
    }
    Snapshot {
        host: host.to_string(),
        captured_at,
        sessions,
    }
}

pub fn parse_session_line(host: &str, line: &str) -> Result<SessionRecord, ParseError> {
    let fields: Vec<&str> = line
        .trim_end_matches(['\r', '\n'])
        .splitn(SIGNIFICANT_FIELDS + 1, ',')
        .take(SIGNIFICANT_FIELDS)
        .collect();
    if fields.len() < SIGNIFICANT_FIELDS {
        return Err(ParseError::TooFewFields(fields.len()));
    }

    // The server counts from its own side; a client's upload is its "received".
    Ok(SessionRecord {
        host: host.to_string(),
        user: fields[1].to_string(),
        public_address: fields[2].to_string(),
        internal_address: fields[3].to_string(),
        bytes_sent: parse_counter("bytes_received", fields[5])?,
        bytes_received: parse_counter("bytes_sent", fields[6])?,
        connected_since: fields[7].to_string(),
        connected_since_epoch: parse_counter("connected_since_epoch", fields[8])?,
        closed_at: None,
    })
}

fn parse_counter(field: &'static str, value: &str) -> Result<i64, ParseError> {
    value.trim().parse::<i64>().map_err(|_| ParseError::BadNumber {
        field,
        value: value.to_string(),
    })
}
