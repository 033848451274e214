//! Inbound dispatcher
//!
//! Entry point for station-initiated Call frames: raw payload in, raw
//! response payload out. Decoding, handler lookup and encoding all go
//! through the registry; the transport maps [`DispatchError`] variants to
//! OCPP-J CallError codes.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::context::CallContext;
use super::errors::DispatchError;
use super::registry::HandlerRegistry;
use crate::domain::OcppVersion;

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Handle one inbound call for `charge_station_id`.
    ///
    /// No timeout is imposed here; the handler runs until it completes or
    /// `ctx` is cancelled.
    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        version: OcppVersion,
        action: &str,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        info!(charge_station_id, %version, action, "Call received");

        let result = match self.registry.erased_call_handler(version, action) {
            Some(handler) => ctx
                .run(handler.call(ctx, charge_station_id, payload))
                .await
                .unwrap_or(Err(DispatchError::Cancelled)),
            None => {
                warn!(charge_station_id, %version, action, "No call handler registered");
                Err(DispatchError::NotImplemented {
                    version,
                    action: action.to_string(),
                })
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(DispatchError::Decode(_)) => "decode_error",
            Err(DispatchError::NotImplemented { .. }) => "not_implemented",
            Err(DispatchError::Handler(_)) => "handler_error",
            Err(DispatchError::Encode(_)) => "encode_error",
            Err(DispatchError::Cancelled) => "cancelled",
        };
        counter!(
            "ocpp_calls_dispatched_total",
            "action" => action.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        if let Err(e) = &result {
            debug!(charge_station_id, action, error = %e, "Call failed");
        }
        result
    }
}
