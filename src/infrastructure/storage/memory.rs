//! In-memory store implementations for development and testing

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::domain::{
    ChargeStationStatusStore, DiagnosticsStatus, DiagnosticsStatusStore, OperationKind,
    PendingOperation, PendingOperationStore, RuntimeDetails, RuntimeDetailsLookup, StoreError,
    StoreResult,
};

fn key_of(kind: OperationKind, charge_station_id: &str) -> String {
    format!("{}/{}", kind, charge_station_id)
}

// ── Pending operations ─────────────────────────────────────────

/// Ordered by `(kind, charge_station_id)` so pages come out sorted.
#[derive(Default)]
pub struct InMemoryPendingOperationStore {
    records: RwLock<BTreeMap<(OperationKind, String), PendingOperation>>,
}

impl InMemoryPendingOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PendingOperationStore for InMemoryPendingOperationStore {
    async fn put(&self, mut op: PendingOperation) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let key = (op.kind, op.charge_station_id.clone());
        op.version = records.get(&key).map(|r| r.version + 1).unwrap_or(1);
        records.insert(key, op);
        Ok(())
    }

    async fn get(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
    ) -> StoreResult<Option<PendingOperation>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(kind, charge_station_id.to_string()))
            .cloned())
    }

    async fn reschedule(&self, op: &PendingOperation) -> StoreResult<PendingOperation> {
        let mut records = self.records.write().await;
        let key = (op.kind, op.charge_station_id.clone());
        let stored = records.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            entity: "pending operation",
            key: key_of(op.kind, &op.charge_station_id),
        })?;
        if stored.version != op.version {
            return Err(StoreError::Conflict {
                entity: "pending operation",
                key: key_of(op.kind, &op.charge_station_id),
            });
        }
        stored.send_after = op.send_after;
        stored.retry_count = op.retry_count;
        stored.status = op.status;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn delete(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
        expected_version: Option<i64>,
    ) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let key = (kind, charge_station_id.to_string());
        match (records.get(&key), expected_version) {
            (None, _) => Ok(false),
            (Some(stored), Some(expected)) if stored.version != expected => Ok(false),
            _ => Ok(records.remove(&key).is_some()),
        }
    }

    async fn list(
        &self,
        kind: OperationKind,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<PendingOperation>> {
        let records = self.records.read().await;
        Ok(records
            .range((kind, previous_charge_station_id.to_string())..)
            .take_while(|((k, _), _)| *k == kind)
            .filter(|((_, cs), _)| {
                previous_charge_station_id.is_empty() || cs.as_str() > previous_charge_station_id
            })
            .take(page_size)
            .map(|(_, op)| op.clone())
            .collect())
    }
}

// ── Runtime details ────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRuntimeDetails {
    details: DashMap<String, RuntimeDetails>,
}

impl InMemoryRuntimeDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, details: RuntimeDetails) {
        self.details
            .insert(details.charge_station_id.clone(), details);
    }
}

#[async_trait]
impl RuntimeDetailsLookup for InMemoryRuntimeDetails {
    async fn lookup(&self, charge_station_id: &str) -> StoreResult<Option<RuntimeDetails>> {
        Ok(self
            .details
            .get(charge_station_id)
            .map(|d| d.value().clone()))
    }
}

// ── Charge station status ──────────────────────────────────────

#[derive(Default)]
pub struct InMemoryChargeStationStatusStore {
    heartbeats: DashMap<String, DateTime<Utc>>,
}

impl InMemoryChargeStationStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChargeStationStatusStore for InMemoryChargeStationStatusStore {
    async fn set_heartbeat(&self, charge_station_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.heartbeats.insert(charge_station_id.to_string(), at);
        Ok(())
    }

    async fn last_heartbeat(&self, charge_station_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.heartbeats.get(charge_station_id).map(|at| *at))
    }
}

// ── Diagnostics status ─────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryDiagnosticsStatusStore {
    statuses: DashMap<(OperationKind, String), DiagnosticsStatus>,
}

impl InMemoryDiagnosticsStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiagnosticsStatusStore for InMemoryDiagnosticsStatusStore {
    async fn put(&self, status: DiagnosticsStatus) -> StoreResult<()> {
        self.statuses
            .insert((status.kind, status.charge_station_id.clone()), status);
        Ok(())
    }

    async fn get(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
    ) -> StoreResult<Option<DiagnosticsStatus>> {
        Ok(self
            .statuses
            .get(&(kind, charge_station_id.to_string()))
            .map(|s| s.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OcppVersion, OperationPayload, UploadStatus};
    use std::collections::HashSet;

    fn op(cs: &str, kind: OperationKind) -> PendingOperation {
        PendingOperation::new(cs, kind, 1, OperationPayload::default())
    }

    #[tokio::test]
    async fn put_assigns_increasing_versions() {
        let store = InMemoryPendingOperationStore::new();
        store.put(op("CS1", OperationKind::LogRetrieval)).await.unwrap();
        let v1 = store.get(OperationKind::LogRetrieval, "CS1").await.unwrap().unwrap().version;
        store.put(op("CS1", OperationKind::LogRetrieval)).await.unwrap();
        let v2 = store.get(OperationKind::LogRetrieval, "CS1").await.unwrap().unwrap().version;
        assert!(v2 > v1);
    }

    #[tokio::test]
    async fn cursor_pagination_visits_every_record_once() {
        let store = InMemoryPendingOperationStore::new();
        for i in 0..23 {
            store
                .put(op(&format!("CS{:03}", i), OperationKind::DiagnosticsRetrieval))
                .await
                .unwrap();
        }
        store.put(op("CS005", OperationKind::LogRetrieval)).await.unwrap();

        let mut seen = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = store
                .list(OperationKind::DiagnosticsRetrieval, 5, &cursor)
                .await
                .unwrap();
            let Some(last) = page.last() else { break };
            cursor = last.charge_station_id.clone();
            seen.extend(page.into_iter().map(|op| op.charge_station_id));
        }

        assert_eq!(seen.len(), 23);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 23);
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[tokio::test]
    async fn reschedule_is_compare_and_swap() {
        let store = InMemoryPendingOperationStore::new();
        store.put(op("CS1", OperationKind::DiagnosticsRetrieval)).await.unwrap();
        let read = store
            .get(OperationKind::DiagnosticsRetrieval, "CS1")
            .await
            .unwrap()
            .unwrap();

        let next = read.rescheduled(Utc::now(), chrono::Duration::seconds(30));
        let stored = store.reschedule(&next).await.unwrap();
        assert_eq!(stored.version, read.version + 1);
        assert_eq!(stored.retry_count, 1);

        let stale = store.reschedule(&next).await.unwrap_err();
        assert!(matches!(stale, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn reschedule_of_missing_record_is_not_found() {
        let store = InMemoryPendingOperationStore::new();
        let err = store
            .reschedule(&op("CS1", OperationKind::LogRetrieval))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn versioned_delete_keeps_newer_record() {
        let store = InMemoryPendingOperationStore::new();
        store.put(op("CS1", OperationKind::LogRetrieval)).await.unwrap();
        let old = store.get(OperationKind::LogRetrieval, "CS1").await.unwrap().unwrap();
        store.put(op("CS1", OperationKind::LogRetrieval)).await.unwrap();

        assert!(!store
            .delete(OperationKind::LogRetrieval, "CS1", Some(old.version))
            .await
            .unwrap());
        assert!(store
            .delete(OperationKind::LogRetrieval, "CS1", None)
            .await
            .unwrap());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn runtime_details_lookup() {
        let runtime = InMemoryRuntimeDetails::new();
        runtime.insert(RuntimeDetails::new("CS1", OcppVersion::V201));
        let found = runtime.lookup("CS1").await.unwrap().unwrap();
        assert_eq!(found.version(), Some(OcppVersion::V201));
        assert!(runtime.lookup("CS2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn diagnostics_status_is_keyed_by_kind() {
        let store = InMemoryDiagnosticsStatusStore::new();
        store
            .put(DiagnosticsStatus::new(
                "CS1",
                OperationKind::LogRetrieval,
                Some(3),
                UploadStatus::Uploading,
            ))
            .await
            .unwrap();
        assert!(store
            .get(OperationKind::DiagnosticsRetrieval, "CS1")
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .get(OperationKind::LogRetrieval, "CS1")
                .await
                .unwrap()
                .unwrap()
                .status,
            UploadStatus::Uploading
        );
    }
}
