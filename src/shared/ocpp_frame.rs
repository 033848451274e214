//! OCPP-J message framing
//!
//! The JSON array envelope shared by every OCPP version:
//!
//! - **Call**       `[2, "<messageId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<messageId>", {<payload>}]`
//! - **CallError**  `[4, "<messageId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::Value;
use thiserror::Error;

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame (version-agnostic transport envelope).
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        message_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        message_id: String,
        payload: Value,
    },
    CallError {
        message_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

/// Errors that can occur when parsing an OCPP-J frame.
#[derive(Debug, Error, PartialEq)]
pub enum OcppFrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Frame is not a non-empty JSON array")]
    NotAnArray,
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },
    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

impl OcppFrame {
    /// Parse a raw WebSocket text message.
    pub fn parse(text: &str) -> Result<Self, OcppFrameError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| OcppFrameError::InvalidJson(e.to_string()))?;
        let arr = match value {
            Value::Array(arr) if !arr.is_empty() => arr,
            _ => return Err(OcppFrameError::NotAnArray),
        };

        let msg_type = arr[0]
            .as_u64()
            .ok_or(OcppFrameError::FieldTypeMismatch("messageTypeId must be a number"))?;

        let (expected, message_id) = match msg_type {
            MSG_TYPE_CALL => (4, str_at(&arr, 1, "messageId must be a string")),
            MSG_TYPE_CALL_RESULT => (3, str_at(&arr, 1, "messageId must be a string")),
            MSG_TYPE_CALL_ERROR => (3, str_at(&arr, 1, "messageId must be a string")),
            other => return Err(OcppFrameError::UnknownMessageType(other)),
        };
        if arr.len() < expected {
            return Err(OcppFrameError::MissingFields {
                expected,
                got: arr.len(),
            });
        }
        let message_id = message_id?;

        let frame = match msg_type {
            MSG_TYPE_CALL => Self::Call {
                message_id,
                action: str_at(&arr, 2, "action must be a string")?,
                payload: arr[3].clone(),
            },
            MSG_TYPE_CALL_RESULT => Self::CallResult {
                message_id,
                payload: object_or_empty(arr.get(2)),
            },
            _ => Self::CallError {
                message_id,
                error_code: str_at(&arr, 2, "errorCode must be a string")?,
                error_description: arr
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                error_details: object_or_empty(arr.get(4)),
            },
        };
        Ok(frame)
    }

    /// Serialize this frame to a JSON string.
    pub fn serialize(&self) -> String {
        let arr = match self {
            Self::Call {
                message_id,
                action,
                payload,
            } => serde_json::json!([MSG_TYPE_CALL, message_id, action, payload]),
            Self::CallResult {
                message_id,
                payload,
            } => serde_json::json!([MSG_TYPE_CALL_RESULT, message_id, payload]),
            Self::CallError {
                message_id,
                error_code,
                error_description,
                error_details,
            } => serde_json::json!([
                MSG_TYPE_CALL_ERROR,
                message_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        arr.to_string()
    }

    pub fn message_id(&self) -> &str {
        match self {
            Self::Call { message_id, .. }
            | Self::CallResult { message_id, .. }
            | Self::CallError { message_id, .. } => message_id,
        }
    }

    /// `CallError` reply with empty details.
    pub fn error_response(
        message_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            message_id: message_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: Value::Object(Default::default()),
        }
    }
}

fn str_at(arr: &[Value], idx: usize, msg: &'static str) -> Result<String, OcppFrameError> {
    arr.get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(OcppFrameError::FieldTypeMismatch(msg))
}

fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(v) if !v.is_null() => v.clone(),
        _ => Value::Object(Default::default()),
    }
}
