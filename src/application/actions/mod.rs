//! Typed action markers for the messages this CSMS speaks
//!
//! One zero-sized type per (version, action), binding the wire name to
//! the `rust_ocpp` request/response pair of that version.

pub mod v16;
pub mod v201;
