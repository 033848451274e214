//! OCPP protocol version negotiation
//!
//! During the WebSocket handshake the charge station advertises which OCPP
//! sub-protocols it supports via the `Sec-WebSocket-Protocol` header.
//! The negotiator picks the best mutually-supported version.

use tracing::warn;

use crate::domain::OcppVersion;

/// Outcome of a handshake negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub version: OcppVersion,
    /// Subprotocol to echo back, `None` when nothing matched
    pub subprotocol: Option<&'static str>,
}

/// Negotiates the OCPP version during WebSocket handshake.
pub struct ProtocolNegotiator {
    /// Preference order, highest first
    supported_versions: Vec<OcppVersion>,
    fallback: OcppVersion,
}

impl ProtocolNegotiator {
    pub fn new(supported_versions: Vec<OcppVersion>, fallback: OcppVersion) -> Self {
        Self {
            supported_versions,
            fallback,
        }
    }

    /// Returns the best mutually-supported version, or `None` if no match.
    pub fn negotiate(&self, requested_protocols: &str) -> Option<OcppVersion> {
        let requested: Vec<&str> = requested_protocols.split(',').map(|s| s.trim()).collect();

        self.supported_versions
            .iter()
            .find(|version| requested.iter().any(|p| *p == version.subprotocol()))
            .copied()
    }

    /// Like [`negotiate`](Self::negotiate) but falls back to the default
    /// version when nothing matches.
    pub fn negotiate_or_default(&self, charge_station_id: &str, requested_protocols: &str) -> Negotiated {
        match self.negotiate(requested_protocols) {
            Some(version) => Negotiated {
                version,
                subprotocol: Some(version.subprotocol()),
            },
            None => {
                warn!(
                    charge_station_id,
                    requested = requested_protocols,
                    fallback = %self.fallback,
                    "No supported OCPP subprotocol requested, assuming fallback version"
                );
                Negotiated {
                    version: self.fallback,
                    subprotocol: None,
                }
            }
        }
    }

    pub fn supported_subprotocols(&self) -> Vec<&'static str> {
        self.supported_versions
            .iter()
            .map(|v| v.subprotocol())
            .collect()
    }
}

impl Default for ProtocolNegotiator {
    fn default() -> Self {
        Self::new(OcppVersion::ALL.to_vec(), OcppVersion::V16)
    }
}
