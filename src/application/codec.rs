//! Typed payload codec
//!
//! The single place where raw JSON payloads become the typed request and
//! response values of an [`Action`], and back.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Action, ActionId};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed {action} {part} payload: {source}")]
    Decode {
        action: ActionId,
        part: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {action} {part} payload: {source}")]
    Encode {
        action: ActionId,
        part: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Version-specific codec for action `A`.
pub struct Codec<A: Action>(PhantomData<fn() -> A>);

impl<A: Action> Codec<A> {
    pub fn decode_request(payload: Value) -> Result<A::Request, CodecError> {
        decode(A::id(), "request", payload)
    }

    pub fn encode_request(request: &A::Request) -> Result<Value, CodecError> {
        encode(A::id(), "request", request)
    }

    pub fn decode_response(payload: Value) -> Result<A::Response, CodecError> {
        decode(A::id(), "response", payload)
    }

    pub fn encode_response(response: &A::Response) -> Result<Value, CodecError> {
        encode(A::id(), "response", response)
    }
}

fn decode<T: DeserializeOwned>(
    action: ActionId,
    part: &'static str,
    payload: Value,
) -> Result<T, CodecError> {
    serde_json::from_value(payload).map_err(|source| CodecError::Decode {
        action,
        part,
        source,
    })
}

fn encode<T: Serialize>(action: ActionId, part: &'static str, value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(|source| CodecError::Encode {
        action,
        part,
        source,
    })
}

/// Wire spelling of a serializable enum value (`"UploadFailure"`).
pub fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}
