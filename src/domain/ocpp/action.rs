//! Action identity and typed action descriptors
//!
//! An [`ActionId`] is the registry key for a handler: the same logical
//! operation (e.g. `"Heartbeat"`) resolves to different schemas per
//! protocol version. An [`Action`] binds that key to the concrete
//! request/response payload types of one version.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::OcppVersion;

/// `(protocol version, action name)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId {
    pub version: OcppVersion,
    pub name: &'static str,
}

impl ActionId {
    pub const fn new(version: OcppVersion, name: &'static str) -> Self {
        Self { version, name }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.version, self.name)
    }
}

/// A typed OCPP action for a single protocol version.
///
/// Implementors are zero-sized markers; the codec uses the associated
/// types to perform the one authoritative decode of a payload so handlers
/// only ever see typed values.
pub trait Action: Send + Sync + 'static {
    /// Action name as it appears on the wire (`"GetLog"`).
    const NAME: &'static str;
    /// Protocol version whose schema `Request`/`Response` follow.
    const VERSION: OcppVersion;

    type Request: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static;
    type Response: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static;

    fn id() -> ActionId {
        ActionId::new(Self::VERSION, Self::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_different_versions_are_distinct() {
        let a = ActionId::new(OcppVersion::V16, "GetLog");
        let b = ActionId::new(OcppVersion::V201, "GetLog");
        assert_ne!(a, b);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn display_includes_version_and_name() {
        let id = ActionId::new(OcppVersion::V201, "Heartbeat");
        assert_eq!(id.to_string(), "OCPP 2.0.1/Heartbeat");
    }
}
