//! Pending operation aggregate
//!
//! Durable records of outbound operations that could not be sent right
//! away and are (re)dispatched by the sync engine.

pub mod model;
pub mod repository;

pub use model::{OperationKind, OperationPayload, OperationStatus, PendingOperation};
pub use repository::PendingOperationStore;
