//! Domain layer
//!
//! Protocol value objects, aggregates and the store contracts the
//! application layer depends on. No transport or database types leak in
//! here beyond the `DbErr` conversion on [`StoreError`].

pub mod charge_station;
pub mod diagnostics;
pub mod error;
pub mod ocpp;
pub mod pending_operation;

pub use charge_station::{ChargeStationStatusStore, RuntimeDetails, RuntimeDetailsLookup};
pub use diagnostics::{DiagnosticsStatus, DiagnosticsStatusStore, UploadStatus};
pub use error::{StoreError, StoreResult};
pub use ocpp::{Action, ActionId, OcppVersion};
pub use pending_operation::{
    OperationKind, OperationPayload, OperationStatus, PendingOperation, PendingOperationStore,
};
