//! Application layer
//!
//! The dispatch core (registry, codec, dispatcher, result correlator, sync
//! engine) plus the business handlers and services plugged into it.

pub mod actions;
pub mod codec;
pub mod context;
pub mod correlator;
pub mod dispatcher;
pub mod errors;
pub mod handlers;
pub mod ports;
pub mod registry;
pub mod services;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{Codec, CodecError};
pub use context::CallContext;
pub use correlator::ResultCorrelator;
pub use dispatcher::Dispatcher;
pub use errors::{
    CorrelationError, DispatchError, HandlerError, HandlerRole, ProtocolError, RegistryError,
    TransportError,
};
pub use ports::{CallMaker, OutboundCall};
pub use registry::{CallHandler, CallState, HandlerRegistry, HandlerRegistryBuilder, ResultHandler};
pub use services::DiagnosticsService;
pub use sync::{DeferredDispatcher, SyncConfig, SyncEngine, SyncError, TickReport};
