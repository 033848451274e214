//! Charge station runtime details

use chrono::{DateTime, Utc};

use crate::domain::OcppVersion;

/// Negotiated facts about a station's current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDetails {
    pub charge_station_id: String,
    /// Negotiated protocol version string, e.g. `"1.6"` or `"2.0.1"`
    pub ocpp_version: String,
    pub connected_at: DateTime<Utc>,
}

impl RuntimeDetails {
    pub fn new(charge_station_id: impl Into<String>, version: OcppVersion) -> Self {
        Self {
            charge_station_id: charge_station_id.into(),
            ocpp_version: version.version_string().to_string(),
            connected_at: Utc::now(),
        }
    }

    /// Parsed protocol version, `None` if the string is not one we speak.
    pub fn version(&self) -> Option<OcppVersion> {
        OcppVersion::from_version_string(&self.ocpp_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parses_negotiated_string() {
        let d = RuntimeDetails::new("CS001", OcppVersion::V201);
        assert_eq!(d.ocpp_version, "2.0.1");
        assert_eq!(d.version(), Some(OcppVersion::V201));
    }

    #[test]
    fn unknown_version_string_is_none() {
        let mut d = RuntimeDetails::new("CS001", OcppVersion::V16);
        d.ocpp_version = "1.5".into();
        assert_eq!(d.version(), None);
    }
}
