//! Live charge station sessions

mod connection;
mod registry;

pub use connection::{Connection, EvictedSession};
pub use registry::{SessionRegistry, SharedSessionRegistry};
