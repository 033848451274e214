//! Diagnostics / log retrieval requests
//!
//! Requests are not sent inline. Each one becomes a pending operation that
//! the matching sync loop dispatches once the station is reachable.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::{
    DiagnosticsStatus, DiagnosticsStatusStore, OperationKind, OperationPayload, PendingOperation,
    PendingOperationStore, StoreResult, UploadStatus,
};

pub struct DiagnosticsService {
    operations: Arc<dyn PendingOperationStore>,
    statuses: Arc<dyn DiagnosticsStatusStore>,
    next_request_id: AtomicI32,
}

impl DiagnosticsService {
    pub fn new(
        operations: Arc<dyn PendingOperationStore>,
        statuses: Arc<dyn DiagnosticsStatusStore>,
    ) -> Self {
        // Seeded from the clock so ids stay distinct across restarts.
        let seed = (Utc::now().timestamp() % 1_000_000_000) as i32;
        Self {
            operations,
            statuses,
            next_request_id: AtomicI32::new(seed),
        }
    }

    /// Queue a diagnostics upload from `charge_station_id` to `payload.location`.
    pub async fn request_diagnostics(
        &self,
        charge_station_id: &str,
        payload: OperationPayload,
    ) -> StoreResult<PendingOperation> {
        self.enqueue(charge_station_id, OperationKind::DiagnosticsRetrieval, payload)
            .await
    }

    /// Queue a log upload. Only 2.0.1 stations can serve it.
    pub async fn request_log(
        &self,
        charge_station_id: &str,
        payload: OperationPayload,
    ) -> StoreResult<PendingOperation> {
        self.enqueue(charge_station_id, OperationKind::LogRetrieval, payload)
            .await
    }

    async fn enqueue(
        &self,
        charge_station_id: &str,
        kind: OperationKind,
        payload: OperationPayload,
    ) -> StoreResult<PendingOperation> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let op = PendingOperation::new(charge_station_id, kind, request_id, payload);
        self.operations.put(op.clone()).await?;
        self.statuses
            .put(DiagnosticsStatus::new(
                charge_station_id,
                kind,
                Some(request_id),
                UploadStatus::Requested,
            ))
            .await?;

        info!(charge_station_id, %kind, request_id, "Upload requested");
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::{
        InMemoryDiagnosticsStatusStore, InMemoryPendingOperationStore,
    };
    use crate::domain::OperationStatus;

    fn service() -> (
        DiagnosticsService,
        Arc<InMemoryPendingOperationStore>,
        Arc<InMemoryDiagnosticsStatusStore>,
    ) {
        let ops = Arc::new(InMemoryPendingOperationStore::new());
        let statuses = Arc::new(InMemoryDiagnosticsStatusStore::new());
        (
            DiagnosticsService::new(ops.clone(), statuses.clone()),
            ops,
            statuses,
        )
    }

    #[tokio::test]
    async fn request_creates_a_due_pending_operation() {
        let (svc, ops, statuses) = service();
        let before = Utc::now();
        let op = svc
            .request_diagnostics(
                "CS1",
                OperationPayload {
                    location: "ftp://diag.example.com/".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = ops
            .get(OperationKind::DiagnosticsRetrieval, "CS1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, OperationStatus::Pending);
        assert_eq!(stored.request_id, op.request_id);
        assert!(stored.send_after >= before && stored.is_due(Utc::now()));

        let status = statuses
            .get(OperationKind::DiagnosticsRetrieval, "CS1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, UploadStatus::Requested);
        assert_eq!(status.request_id, Some(op.request_id));
    }

    #[tokio::test]
    async fn request_ids_are_unique() {
        let (svc, _, _) = service();
        let a = svc
            .request_log("CS1", OperationPayload::default())
            .await
            .unwrap();
        let b = svc
            .request_log("CS2", OperationPayload::default())
            .await
            .unwrap();
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.kind, OperationKind::LogRetrieval);
    }
}
