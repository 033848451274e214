//! Pending operation domain entity

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Deferred-operation domain. Each kind has its own sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    DiagnosticsRetrieval,
    LogRetrieval,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiagnosticsRetrieval => "DiagnosticsRetrieval",
            Self::LogRetrieval => "LogRetrieval",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DiagnosticsRetrieval" => Some(Self::DiagnosticsRetrieval),
            "LogRetrieval" => Some(Self::LogRetrieval),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a pending operation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Waiting to be dispatched
    Pending,
    /// Handed to the station, completion tracked elsewhere
    SentAwaitingCompletion,
    Done,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::SentAwaitingCompletion => "SentAwaitingCompletion",
            Self::Done => "Done",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "SentAwaitingCompletion" => Self::SentAwaitingCompletion,
            _ => Self::Done,
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific fields relayed to the station when the operation is sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationPayload {
    /// Upload URL the station should push the file to
    pub location: String,
    /// `"DiagnosticsLog"` or `"SecurityLog"` (2.0.1 GetLog only)
    pub log_type: Option<String>,
    pub oldest_timestamp: Option<DateTime<Utc>>,
    pub latest_timestamp: Option<DateTime<Utc>>,
    /// Upload retries hint for the station
    pub retries: Option<i32>,
    /// Seconds between upload retries, hint for the station
    pub retry_interval: Option<i32>,
}

/// A deferred outbound operation for one charge station.
///
/// At most one record exists per `(kind, charge_station_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub charge_station_id: String,
    pub kind: OperationKind,
    /// Domain identity relayed to the station (`requestId`)
    pub request_id: i32,
    pub status: OperationStatus,
    /// Not dispatched before this instant
    pub send_after: DateTime<Utc>,
    /// Number of dispatch attempts so far
    pub retry_count: u32,
    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub payload: OperationPayload,
    pub created_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn new(
        charge_station_id: impl Into<String>,
        kind: OperationKind,
        request_id: i32,
        payload: OperationPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            charge_station_id: charge_station_id.into(),
            kind,
            request_id,
            status: OperationStatus::Pending,
            send_after: now,
            retry_count: 0,
            version: 0,
            payload,
            created_at: now,
        }
    }

    pub fn with_send_after(mut self, send_after: DateTime<Utc>) -> Self {
        self.send_after = send_after;
        self
    }

    /// Pending and due at `now` (inclusive).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OperationStatus::Pending && self.send_after <= now
    }

    /// Copy of this record pushed `retry_after` past the later of `now`
    /// and its current due time.
    pub fn rescheduled(&self, now: DateTime<Utc>, retry_after: Duration) -> Self {
        let base = self.send_after.max(now);
        Self {
            send_after: base + retry_after,
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
