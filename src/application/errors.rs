//! Error taxonomy of the dispatch / correlation core

use serde_json::Value;
use thiserror::Error;

use super::codec::CodecError;
use crate::domain::{ActionId, OcppVersion, StoreError};

/// Failure inside a business handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Store failure, wrapped with what the handler was doing
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// e.g. `HandlerError::store(format!("cancelling reservation {id}"), e)`
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }
}

/// Registration problems, detected while building the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate {role} handler for {action}")]
    Duplicate { action: ActionId, role: HandlerRole },
}

/// The two roles a pluggable unit can fill for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerRole {
    Call,
    Result,
}

impl std::fmt::Display for HandlerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// Failure handing a call to the transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Charge station {0} is not connected")]
    NotConnected(String),

    #[error("Failed to send to {charge_station_id}: {reason}")]
    SendFailed {
        charge_station_id: String,
        reason: String,
    },
}

/// Inbound dispatch failure. Decode and lookup failures are kept apart from
/// handler failures so the transport can pick the wire-level error code.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(CodecError),

    #[error("No call handler for {action} on {version}")]
    NotImplemented { version: OcppVersion, action: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Encode(CodecError),

    #[error("Call cancelled before completion")]
    Cancelled,
}

impl DispatchError {
    /// OCPP-J CallError code for this failure.
    pub fn ocpp_error_code(&self, version: OcppVersion) -> &'static str {
        match (self, version) {
            (Self::Decode(_), OcppVersion::V16) => "FormationViolation",
            (Self::Decode(_), OcppVersion::V201) => "FormatViolation",
            (Self::NotImplemented { .. }, _) => "NotImplemented",
            _ => "InternalError",
        }
    }
}

/// A CallError frame received in answer to one of our calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    pub code: String,
    pub description: String,
    pub details: Value,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallError {}: {}", self.code, self.description)
    }
}

/// Outbound send / result correlation failure.
#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error(transparent)]
    Encode(CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Result or error frame with no pending correlation entry: duplicate
    /// delivery, a stale answer, or a station bug.
    #[error("Unsolicited result from {charge_station_id} for message {message_id}")]
    UnsolicitedResult {
        charge_station_id: String,
        message_id: String,
    },

    #[error(transparent)]
    Decode(CodecError),

    #[error("No result handler for {action}")]
    NotImplemented { action: ActionId },

    #[error("{action} result handler failed: {source}")]
    Handler {
        action: ActionId,
        #[source]
        source: HandlerError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_is_wrapped_with_context() {
        let err = HandlerError::store(
            "cancelling reservation 42",
            StoreError::Backend("disk full".into()),
        );
        assert_eq!(
            err.to_string(),
            "cancelling reservation 42: Storage backend error: disk full"
        );
    }

    #[test]
    fn error_codes_follow_version_spelling() {
        let not_impl = DispatchError::NotImplemented {
            version: OcppVersion::V16,
            action: "Foo".into(),
        };
        assert_eq!(not_impl.ocpp_error_code(OcppVersion::V16), "NotImplemented");
        let handler = DispatchError::Handler(HandlerError::Other("x".into()));
        assert_eq!(handler.ocpp_error_code(OcppVersion::V201), "InternalError");
    }
}
