//! Diagnostics status domain entity

use chrono::{DateTime, Utc};

use crate::domain::OperationKind;

/// Upload status, covering both the CSMS-side request lifecycle and
/// the statuses stations report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Queued for dispatch
    Requested,
    /// Station accepted the request
    Accepted,
    /// Station rejected the request or had nothing to upload
    Rejected,
    /// Station answered with a CallError
    Failed,
    Idle,
    Uploading,
    Uploaded,
    UploadFailed,
    /// Any other status string reported by the station
    Other(String),
}

impl UploadStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Requested => "Requested",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Failed => "Failed",
            Self::Idle => "Idle",
            Self::Uploading => "Uploading",
            Self::Uploaded => "Uploaded",
            Self::UploadFailed => "UploadFailed",
            Self::Other(s) => s,
        }
    }

    /// Parse a status string. 2.0.1's `UploadFailure` maps to `UploadFailed`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "Requested" => Self::Requested,
            "Accepted" => Self::Accepted,
            "Rejected" => Self::Rejected,
            "Failed" => Self::Failed,
            "Idle" => Self::Idle,
            "Uploading" => Self::Uploading,
            "Uploaded" => Self::Uploaded,
            "UploadFailed" | "UploadFailure" => Self::UploadFailed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Latest known upload status for one station and operation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsStatus {
    pub charge_station_id: String,
    pub kind: OperationKind,
    pub request_id: Option<i32>,
    pub status: UploadStatus,
    pub file_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DiagnosticsStatus {
    pub fn new(
        charge_station_id: impl Into<String>,
        kind: OperationKind,
        request_id: Option<i32>,
        status: UploadStatus,
    ) -> Self {
        Self {
            charge_station_id: charge_station_id.into(),
            kind,
            request_id,
            status,
            file_name: None,
            updated_at: Utc::now(),
        }
    }

    /// Replace the status, keeping request identity.
    pub fn transition(&mut self, status: UploadStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            UploadStatus::Requested,
            UploadStatus::Accepted,
            UploadStatus::Rejected,
            UploadStatus::Failed,
            UploadStatus::Idle,
            UploadStatus::Uploading,
            UploadStatus::Uploaded,
            UploadStatus::UploadFailed,
        ] {
            assert_eq!(UploadStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn v201_upload_failure_maps_to_upload_failed() {
        assert_eq!(UploadStatus::from_str("UploadFailure"), UploadStatus::UploadFailed);
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let s = UploadStatus::from_str("PermissionDenied");
        assert_eq!(s, UploadStatus::Other("PermissionDenied".into()));
        assert_eq!(s.as_str(), "PermissionDenied");
    }
}
