//! Shared types for logtrail
//!
//! This crate contains data structures used across multiple logtrail crates.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Log Record Types
// ============================================================================

/// Status code as delivered by the logs endpoint.
///
/// The upstream service is inconsistent here: some gateways report numeric
/// codes, others strings like "200" or "TIMEOUT". Comparisons are always
/// done on the string form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StatusCode {
    Number(i64),
    Text(String),
}

impl StatusCode {
    /// Canonical string form used for filtering and display
    pub fn as_display(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Check if this code is empty (missing on the record)
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// One unit of logged request/response activity, immutable once fetched
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique, stable identifier within one fetch result set
    pub id: u64,

    /// Creation timestamp as reported by the server
    #[serde(default)]
    pub created_at: String,

    /// Gateway category tag
    #[serde(default)]
    pub gateway: String,

    /// API category tag
    #[serde(default)]
    pub api: String,

    /// Status code (numeric or string)
    #[serde(default)]
    pub code: StatusCode,

    /// Session the request belonged to
    #[serde(default)]
    pub session_id: String,

    /// Request payload, JSON-encoded or plain string
    #[serde(default)]
    pub request: String,

    /// Response payload, JSON-encoded or plain string
    #[serde(default)]
    pub response: String,

    /// Free text, may embed attachment URLs
    #[serde(default)]
    pub comment: String,

    /// Duration of the request in milliseconds
    #[serde(default)]
    pub timer: f64,
}

impl LogRecord {
    /// Create a record with minimal fields (used by tests and the fallback set)
    pub fn new(id: u64, created_at: impl Into<String>) -> Self {
        Self {
            id,
            created_at: created_at.into(),
            gateway: String::new(),
            api: String::new(),
            code: StatusCode::default(),
            session_id: String::new(),
            request: String::new(),
            response: String::new(),
            comment: String::new(),
            timer: 0.0,
        }
    }

    /// Parse `created_at` into a UTC timestamp.
    ///
    /// Accepts RFC 3339 as well as the bare `YYYY-MM-DD HH:MM:SS` form some
    /// gateways emit. Returns None for anything else rather than failing.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let s = self.created_at.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Sort records newest-first by `created_at`.
///
/// The source does not guarantee ordering, so consumers impose it. Records
/// with unparseable timestamps sort after dated ones, by descending raw
/// string as a tiebreak.
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by(|a, b| match (a.timestamp(), b.timestamp()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    });
}

// ============================================================================
// Query & Filter Types
// ============================================================================

/// Server-side query parameters forwarded verbatim to the logs endpoint.
///
/// Absent or empty values are omitted from the outgoing request, never sent
/// as empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gateway: Option<String>,
}

impl QueryParams {
    /// Drop fields that are present but empty
    pub fn normalized(mut self) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        self.start_date = clean(self.start_date);
        self.end_date = clean(self.end_date);
        self.gateway = clean(self.gateway);
        self
    }
}

/// Client-side filter criteria evaluated over the loaded record set.
///
/// Empty string / None fields are wildcards and do not filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    /// Case-insensitive substring over id, session_id, request, response, comment
    pub search: String,

    /// Exact gateway match
    pub gateway: String,

    /// Exact api match
    pub api: String,

    /// Exact status match, compared as string
    pub status: String,

    /// Lower bound on created_at (inclusive)
    pub date_from: Option<DateTime<Utc>>,

    /// Upper bound on created_at (inclusive)
    pub date_to: Option<DateTime<Utc>>,
}

impl FilterSpec {
    /// True when no predicate is active (the spec matches everything)
    pub fn is_wildcard(&self) -> bool {
        self.search.is_empty()
            && self.gateway.is_empty()
            && self.api.is_empty()
            && self.status.is_empty()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }
}

// ============================================================================
// Fetch Outcome & Errors
// ============================================================================

/// Why a fetch degraded to the fallback dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DegradeReason {
    /// Transport known offline, skipped the network entirely
    Offline,
    /// Every retry attempt failed transiently
    RetriesExhausted,
    /// The endpoint answered with something other than a record array
    MalformedResponse,
}

impl DegradeReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::RetriesExhausted => "retries exhausted",
            Self::MalformedResponse => "malformed response",
        }
    }
}

/// Result of a log fetch: live data, or fallback data with an advisory reason.
///
/// Callers can tell fallback content apart from live content without
/// inspecting logs.
#[derive(Clone, Debug)]
pub enum LogsOutcome {
    /// Records fetched from the endpoint (or its cache)
    Live(Vec<LogRecord>),
    /// Static fallback records, with the reason live data was unavailable
    Degraded {
        records: Vec<LogRecord>,
        reason: DegradeReason,
    },
}

impl LogsOutcome {
    pub fn records(&self) -> &[LogRecord] {
        match self {
            Self::Live(records) => records,
            Self::Degraded { records, .. } => records,
        }
    }

    pub fn into_records(self) -> Vec<LogRecord> {
        match self {
            Self::Live(records) => records,
            Self::Degraded { records, .. } => records,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Errors surfaced by the fetch coordinator.
///
/// Cloneable so concurrent callers awaiting one coalesced request all
/// observe the same failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connectivity failure (DNS, connection reset, HTTP 5xx transport layer)
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered, but not with a record array
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Both live fetch and fallback were exhausted
    #[error("logs unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only genuine connectivity failures and timeouts are retried; a
    /// malformed response will be malformed again on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}
