//! SeaORM entities

pub mod pending_operation;
