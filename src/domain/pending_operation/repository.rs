//! Pending operation store interface

use async_trait::async_trait;

use super::model::{OperationKind, PendingOperation};
use crate::domain::StoreResult;

/// Durable store for pending operations.
///
/// Records are keyed by `(kind, charge_station_id)`. Every write bumps the
/// record's `version`; `reschedule` and versioned `delete` are
/// compare-and-swap so two writers cannot both re-dispatch one record.
#[async_trait]
pub trait PendingOperationStore: Send + Sync {
    /// Insert or replace the record for `(op.kind, op.charge_station_id)`.
    async fn put(&self, op: PendingOperation) -> StoreResult<()>;

    async fn get(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
    ) -> StoreResult<Option<PendingOperation>>;

    /// Persist `op`'s schedule fields if the stored version still equals
    /// `op.version`. Returns the stored record with its new version, or
    /// `StoreError::Conflict` if another writer got there first.
    async fn reschedule(&self, op: &PendingOperation) -> StoreResult<PendingOperation>;

    /// Delete the record. With `expected_version`, only deletes if the
    /// stored version matches. Returns whether a record was removed.
    async fn delete(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
        expected_version: Option<i64>,
    ) -> StoreResult<bool>;

    /// Page of records ordered by charge station id, strictly after
    /// `previous_charge_station_id` (`""` starts from the beginning).
    async fn list(
        &self,
        kind: OperationKind,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<PendingOperation>>;
}
