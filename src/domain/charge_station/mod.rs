//! Charge station facts consumed by the core
//!
//! Runtime details (negotiated protocol version) and the heartbeat
//! status store.

pub mod model;
pub mod repository;

pub use model::RuntimeDetails;
pub use repository::{ChargeStationStatusStore, RuntimeDetailsLookup};
