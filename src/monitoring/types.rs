//! Data model shared by the pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::AddAssign;

/// Name under which host-wide totals are persisted.
pub const ALL_USERS: &str = "__ALL__";

/// Identity of one session on one host.
///
/// Kept as a tuple of the raw fields rather than their concatenation, so that
/// `("ab", "c")` and `("a", "bc")` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub user: String,
    pub public_address: String,
    pub internal_address: String,
    pub connected_since: String,
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{} since {}",
            self.user, self.public_address, self.internal_address, self.connected_since
        )
    }
}

/// One client session as reported by a management interface.
///
/// Byte counters are cumulative since connect and seen from the client: `bytes_sent`
/// is what the server reports as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub host: String,
    pub user: String,
    pub public_address: String,
    pub internal_address: String,
    pub bytes_sent: i64,
    pub bytes_received: i64,
    /// Human readable connect time, verbatim from the server
    pub connected_since: String,
    /// Connect time as a unix timestamp, verbatim from the server
    pub connected_since_epoch: i64,
    /// Last poll at which the session was still reported, set once it disappears
    pub closed_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn key(&self) -> SessionKey {
        SessionKey {
            user: self.user.clone(),
            public_address: self.public_address.clone(),
            internal_address: self.internal_address.clone(),
            connected_since: self.connected_since.clone(),
        }
    }
}

/// Every session active on one host at one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub host: String,
    pub captured_at: DateTime<Utc>,
    pub sessions: HashMap<SessionKey, SessionRecord>,
}

impl Snapshot {
    pub fn empty(host: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            captured_at,
            sessions: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteCounters {
    pub sent: i64,
    pub received: i64,
}

impl ByteCounters {
    pub fn new(sent: i64, received: i64) -> Self {
        Self { sent, received }
    }

    pub fn is_zero(&self) -> bool {
        self.sent == 0 && self.received == 0
    }
}

impl AddAssign for ByteCounters {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.received += other.received;
    }
}

/// Bucket key of a bandwidth sample.
///
/// `AllUsers` orders first and never collides with a real user, even one
/// literally named `__ALL__`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserKey {
    AllUsers,
    User(String),
}

impl UserKey {
    pub fn user(name: impl Into<String>) -> Self {
        UserKey::User(name.into())
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::AllUsers => write!(f, "{}", ALL_USERS),
            UserKey::User(name) => write!(f, "{}", name),
        }
    }
}

/// Traffic attributed to each user of one host over `[interval_start, interval_end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandwidthSample {
    pub host: String,
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    pub per_user: BTreeMap<UserKey, ByteCounters>,
}

impl BandwidthSample {
    /// Totals of the aggregate bucket.
    pub fn total(&self) -> ByteCounters {
        self.per_user
            .get(&UserKey::AllUsers)
            .copied()
            .unwrap_or_default()
    }

    pub fn get(&self, user: &str) -> Option<ByteCounters> {
        self.per_user.get(&UserKey::user(user)).copied()
    }

    pub fn real_users(&self) -> impl Iterator<Item = (&str, &ByteCounters)> {
        self.per_user.iter().filter_map(|(key, counters)| match key {
            UserKey::AllUsers => None,
            UserKey::User(name) => Some((name.as_str(), counters)),
        })
    }
}
