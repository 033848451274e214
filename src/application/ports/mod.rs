//! Application ports
//!
//! Outbound contracts the dispatch core depends on. Store contracts are
//! domain-level and live next to their aggregates in `crate::domain`.

pub mod outbound;

pub use outbound::{CallMaker, OutboundCall};
