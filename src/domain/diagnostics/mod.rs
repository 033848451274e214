//! Diagnostics / log upload status aggregate
//!
//! Tracks business completion of retrieval operations once the sync
//! engine has handed them to the station.

pub mod model;
pub mod repository;

pub use model::{DiagnosticsStatus, UploadStatus};
pub use repository::DiagnosticsStatusStore;
