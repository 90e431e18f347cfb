//! Helpers for building `ReportFilter` values.
//!
//! This module re-exports `ReportFilter` and provides the fixed look-back
//! windows offered by the reporting surface.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

pub use crate::storage::types::ReportFilter;

/// Build a `ReportFilter` that matches rows of one host.
pub fn by_host<S: Into<String>>(host: S) -> ReportFilter {
    ReportFilter { host: Some(host.into()), ..Default::default() }
}

/// Build a `ReportFilter` for the rows of the last `window`, counted from `now`.
pub fn within(window: ReportWindow, now: DateTime<Utc>) -> ReportFilter {
    ReportFilter { since: Some(window.since(now)), ..Default::default() }
}

/// Filter for one report request, the window counted back from `now`.
pub fn for_request(
    host: Option<String>,
    window: Option<ReportWindow>,
    limit: Option<u64>,
    now: DateTime<Utc>,
) -> ReportFilter {
    let mut filter = window.map(|w| within(w, now)).unwrap_or_default();
    filter.host = host;
    filter.limit = limit;
    filter
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportWindow {
    Minutes15,
    Minutes30,
    Hour1,
    Hours3,
    Hours6,
    Hours12,
    Day1,
}

impl ReportWindow {
    pub const ALL: [ReportWindow; 7] = [
        ReportWindow::Minutes15,
        ReportWindow::Minutes30,
        ReportWindow::Hour1,
        ReportWindow::Hours3,
        ReportWindow::Hours6,
        ReportWindow::Hours12,
        ReportWindow::Day1,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReportWindow::Minutes15 => "15m",
            ReportWindow::Minutes30 => "30m",
            ReportWindow::Hour1 => "1h",
            ReportWindow::Hours3 => "3h",
            ReportWindow::Hours6 => "6h",
            ReportWindow::Hours12 => "12h",
            ReportWindow::Day1 => "1d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            ReportWindow::Minutes15 => Duration::minutes(15),
            ReportWindow::Minutes30 => Duration::minutes(30),
            ReportWindow::Hour1 => Duration::hours(1),
            ReportWindow::Hours3 => Duration::hours(3),
            ReportWindow::Hours6 => Duration::hours(6),
            ReportWindow::Hours12 => Duration::hours(12),
            ReportWindow::Day1 => Duration::days(1),
        }
    }

    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

impl fmt::Display for ReportWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReportWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportWindow::ALL
            .into_iter()
            .find(|w| w.label() == s)
            .ok_or_else(|| {
                let labels: Vec<&str> = ReportWindow::ALL.iter().map(|w| w.label()).collect();
                format!("unknown window `{}`, expected one of {}", s, labels.join(", "))
            })
    }
}
