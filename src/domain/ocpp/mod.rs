//! OCPP protocol shared types
//!
//! Value objects related to the OCPP protocol that don't belong
//! to a single aggregate: protocol versions and action identity.

pub mod action;
pub mod version;

pub use action::{Action, ActionId};
pub use version::OcppVersion;
