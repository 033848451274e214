//! Diagnostics status store interface

use async_trait::async_trait;

use super::model::DiagnosticsStatus;
use crate::domain::{OperationKind, StoreResult};

#[async_trait]
pub trait DiagnosticsStatusStore: Send + Sync {
    /// Insert or replace the status for `(status.kind, status.charge_station_id)`
    async fn put(&self, status: DiagnosticsStatus) -> StoreResult<()>;

    async fn get(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
    ) -> StoreResult<Option<DiagnosticsStatus>>;
}
