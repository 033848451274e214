use thiserror::Error;

/// Errors surfaced by every store contract in the domain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {entity} {key}")]
    NotFound { entity: &'static str, key: String },

    /// A compare-and-swap write lost against a concurrent writer.
    #[error("Concurrent update on {entity} {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
