//! Handler registry
//!
//! Maps `(protocol version, action name)` to the pluggable units that
//! handle it. A unit can fill two independent roles per action:
//!
//! - [`CallHandler`]: answers station-initiated calls
//! - [`ResultHandler`]: consumes the station's answer to a call we sent
//!
//! The registry is assembled once through [`HandlerRegistryBuilder`] during
//! startup and is immutable afterwards, so lookups from concurrent station
//! sessions need no locking.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::codec::Codec;
use super::context::CallContext;
use super::errors::{DispatchError, HandlerError, HandlerRole, ProtocolError, RegistryError};
use crate::domain::{Action, ActionId, OcppVersion};

/// Opaque caller-supplied state remembered alongside an outbound call.
pub type CallState = Option<Value>;

#[async_trait]
pub trait CallHandler<A: Action>: Send + Sync {
    async fn handle_call(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        request: A::Request,
    ) -> Result<A::Response, HandlerError>;
}

#[async_trait]
pub trait ResultHandler<A: Action>: Send + Sync {
    async fn handle_result(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        request: A::Request,
        result: A::Response,
        state: CallState,
    ) -> Result<(), HandlerError>;

    /// Called when the station answers with a CallError. The default logs
    /// the error and drops the request.
    async fn handle_error(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        request: A::Request,
        error: ProtocolError,
        _state: CallState,
    ) -> Result<(), HandlerError> {
        warn!(
            charge_station_id,
            action = A::NAME,
            error = %error,
            request = ?request,
            "CallError received, dropping request"
        );
        Ok(())
    }
}

// ── Type erasure ───────────────────────────────────────────────

/// Call handler behind the codec: raw payload in, raw payload out.
#[async_trait]
pub(crate) trait ErasedCallHandler: Send + Sync {
    async fn call(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        payload: Value,
    ) -> Result<Value, DispatchError>;

    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

struct TypedCallHandler<A: Action> {
    handler: Arc<dyn CallHandler<A>>,
}

#[async_trait]
impl<A: Action> ErasedCallHandler for TypedCallHandler<A> {
    async fn call(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        let request = Codec::<A>::decode_request(payload).map_err(DispatchError::Decode)?;
        let response = self
            .handler
            .handle_call(ctx, charge_station_id, request)
            .await?;
        Codec::<A>::encode_response(&response).map_err(DispatchError::Encode)
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.handler
    }
}

type ByAction<T> = HashMap<OcppVersion, HashMap<&'static str, T>>;

// ── HandlerRegistry ────────────────────────────────────────────

pub struct HandlerRegistry {
    call_handlers: ByAction<Arc<dyn ErasedCallHandler>>,
    /// Each value is an `Arc<dyn ResultHandler<A>>` for the keyed action.
    result_handlers: ByAction<Arc<dyn Any + Send + Sync>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn contains(&self, version: OcppVersion, action: &str, role: HandlerRole) -> bool {
        match role {
            HandlerRole::Call => lookup(&self.call_handlers, version, action).is_some(),
            HandlerRole::Result => lookup(&self.result_handlers, version, action).is_some(),
        }
    }

    pub(crate) fn erased_call_handler(
        &self,
        version: OcppVersion,
        action: &str,
    ) -> Option<&Arc<dyn ErasedCallHandler>> {
        lookup(&self.call_handlers, version, action)
    }

    pub fn call_handler<A: Action>(&self) -> Option<Arc<dyn CallHandler<A>>> {
        lookup(&self.call_handlers, A::VERSION, A::NAME)?
            .as_any()
            .downcast_ref::<Arc<dyn CallHandler<A>>>()
            .cloned()
    }

    pub fn result_handler<A: Action>(&self) -> Option<Arc<dyn ResultHandler<A>>> {
        lookup(&self.result_handlers, A::VERSION, A::NAME)?
            .downcast_ref::<Arc<dyn ResultHandler<A>>>()
            .cloned()
    }

    /// Registered actions for `role`, sorted for stable startup logs.
    pub fn actions(&self, role: HandlerRole) -> Vec<ActionId> {
        fn collect<T>(map: &ByAction<T>) -> Vec<ActionId> {
            map.iter()
                .flat_map(|(version, names)| names.keys().map(|name| ActionId::new(*version, *name)))
                .collect()
        }
        let mut ids = match role {
            HandlerRole::Call => collect(&self.call_handlers),
            HandlerRole::Result => collect(&self.result_handlers),
        };
        ids.sort_by_key(|id| (id.version, id.name));
        ids
    }
}

fn lookup<'a, T>(map: &'a ByAction<T>, version: OcppVersion, action: &str) -> Option<&'a T> {
    map.get(&version)?.get(action)
}

// ── HandlerRegistryBuilder ─────────────────────────────────────

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    call_handlers: ByAction<Arc<dyn ErasedCallHandler>>,
    result_handlers: ByAction<Arc<dyn Any + Send + Sync>>,
}

impl HandlerRegistryBuilder {
    pub fn call<A: Action>(&mut self, handler: Arc<dyn CallHandler<A>>) -> Result<(), RegistryError> {
        let slot = self.call_handlers.entry(A::VERSION).or_default();
        if slot.contains_key(A::NAME) {
            return Err(RegistryError::Duplicate {
                action: A::id(),
                role: HandlerRole::Call,
            });
        }
        slot.insert(A::NAME, Arc::new(TypedCallHandler::<A> { handler }));
        Ok(())
    }

    pub fn result<A: Action>(
        &mut self,
        handler: Arc<dyn ResultHandler<A>>,
    ) -> Result<(), RegistryError> {
        let slot = self.result_handlers.entry(A::VERSION).or_default();
        if slot.contains_key(A::NAME) {
            return Err(RegistryError::Duplicate {
                action: A::id(),
                role: HandlerRole::Result,
            });
        }
        slot.insert(A::NAME, Arc::new(handler));
        Ok(())
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            call_handlers: self.call_handlers,
            result_handlers: self.result_handlers,
        }
    }
}
