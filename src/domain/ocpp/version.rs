//! OCPP protocol version
//!
//! Defines the supported OCPP versions for multi-protocol support.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported OCPP protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OcppVersion {
    /// OCPP 1.6 (JSON / OCPP-J)
    V16,
    /// OCPP 2.0.1
    V201,
}

impl OcppVersion {
    /// All supported OCPP versions, ordered from newest to oldest.
    pub const ALL: &'static [OcppVersion] = &[Self::V201, Self::V16];

    /// WebSocket subprotocol identifier for this OCPP version.
    ///
    /// Used in the `Sec-WebSocket-Protocol` header during handshake.
    pub fn subprotocol(&self) -> &'static str {
        match self {
            Self::V16 => "ocpp1.6",
            Self::V201 => "ocpp2.0.1",
        }
    }

    /// Parse an OCPP version from a WebSocket subprotocol string.
    pub fn from_subprotocol(s: &str) -> Option<Self> {
        match s.trim() {
            "ocpp1.6" => Some(Self::V16),
            "ocpp2.0.1" => Some(Self::V201),
            _ => None,
        }
    }

    /// Human-readable version string, as stored in runtime details.
    pub fn version_string(&self) -> &'static str {
        match self {
            Self::V16 => "1.6",
            Self::V201 => "2.0.1",
        }
    }

    /// Parse a negotiated version string (`"1.6"`, `"2.0.1"`).
    ///
    /// Subprotocol spellings are accepted as well.
    pub fn from_version_string(s: &str) -> Option<Self> {
        match s.trim() {
            "1.6" => Some(Self::V16),
            "2.0.1" => Some(Self::V201),
            other => Self::from_subprotocol(other),
        }
    }
}

impl fmt::Display for OcppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OCPP {}", self.version_string())
    }
}
