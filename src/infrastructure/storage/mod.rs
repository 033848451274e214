//! Store implementations that need no external service

pub mod memory;

pub use memory::{
    InMemoryChargeStationStatusStore, InMemoryDiagnosticsStatusStore,
    InMemoryPendingOperationStore, InMemoryRuntimeDetails,
};
