//! # OCPP Central System
//!
//! OCPP 1.6 / 2.0.1 central system core for managing EV charging stations.
//!
//! ## Architecture
//!
//! - **domain**: protocol versions, action identity, pending operations and
//!   the store contracts
//! - **application**: handler registry, dispatcher, result correlator, sync
//!   engine, and the business handlers plugged into them
//! - **infrastructure**: in-memory and SeaORM stores, live session registry
//! - **interfaces**: OCPP-J WebSocket server
//! - **shared**: OCPP-J framing and shutdown signalling

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig};
