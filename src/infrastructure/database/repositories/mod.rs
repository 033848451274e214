//! SeaORM store implementations

mod pending_operation_repository;

pub use pending_operation_repository::SeaOrmPendingOperationStore;
