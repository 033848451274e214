//! Infrastructure layer: stores and live sessions

pub mod database;
pub mod session;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmPendingOperationStore};
pub use session::{SessionRegistry, SharedSessionRegistry};
pub use storage::{
    InMemoryChargeStationStatusStore, InMemoryDiagnosticsStatusStore,
    InMemoryPendingOperationStore, InMemoryRuntimeDetails,
};
