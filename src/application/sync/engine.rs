//! Sync/retry loop for one kind of pending operation
//!
//! Each tick reads one page of records after the cursor left by the
//! previous tick. An empty page resets the cursor so the next tick starts
//! over from the first station.
//!
//! Per due record: resolve the station's protocol version, drop the record
//! if that version cannot express the operation, otherwise persist the
//! pushed-back due time (compare-and-swap) and only then dispatch. A
//! successful dispatch deletes the record; a failed one leaves the pushed
//! back due time for a later tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use metrics::counter;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{DeferredDispatcher, SyncError};
use crate::application::context::CallContext;
use crate::domain::{
    OcppVersion, PendingOperation, PendingOperationStore, RuntimeDetailsLookup, StoreError,
};
use crate::shared::shutdown::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Scan period
    pub run_every: Duration,
    /// How far a record's due time is pushed back per dispatch attempt
    pub retry_after: chrono::Duration,
    pub page_size: usize,
    /// Upper bound on concurrent sends within one tick
    pub max_concurrent_sends: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            run_every: Duration::from_secs(60),
            retry_after: chrono::Duration::minutes(5),
            page_size: 50,
            max_concurrent_sends: 16,
        }
    }
}

/// What one tick did, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    pub not_due: usize,
    pub lookup_failed: usize,
    pub unsupported: usize,
    pub conflicts: usize,
    pub persist_failed: usize,
    pub dispatched: usize,
    pub dispatch_failed: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.unsupported == 0
            && self.conflicts == 0
            && self.persist_failed == 0
            && self.dispatched == 0
            && self.dispatch_failed == 0
    }
}

pub struct SyncEngine {
    store: Arc<dyn PendingOperationStore>,
    runtime: Arc<dyn RuntimeDetailsLookup>,
    dispatcher: Arc<dyn DeferredDispatcher>,
    config: SyncConfig,
    /// Last charge station id of the previous page
    cursor: Mutex<String>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn PendingOperationStore>,
        runtime: Arc<dyn RuntimeDetailsLookup>,
        dispatcher: Arc<dyn DeferredDispatcher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            dispatcher,
            config,
            cursor: Mutex::new(String::new()),
        }
    }

    /// Spawn the periodic loop. It stops after `shutdown` fires, once the
    /// tick in progress (and its sends) has finished.
    pub fn start(self: Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let kind = self.dispatcher.kind();
            info!(
                %kind,
                run_every_secs = self.config.run_every.as_secs(),
                retry_after_secs = self.config.retry_after.num_seconds(),
                "🔁 Sync loop started"
            );

            let mut interval = tokio::time::interval(self.config.run_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Sends started by a tick are finished even during shutdown.
            let ctx = CallContext::new();

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.tick(&ctx).await {
                            Ok(report) if report.is_idle() => {}
                            Ok(report) => info!(%kind, ?report, "Sync tick finished"),
                            Err(e) => error!(%kind, error = %e, "Sync tick failed"),
                        }
                    }
                    _ = shutdown.wait() => {
                        info!(%kind, "🔁 Sync loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    pub async fn tick(&self, ctx: &CallContext) -> Result<TickReport, SyncError> {
        self.tick_at(ctx, Utc::now()).await
    }

    /// One scan with `now` as the reference time.
    pub async fn tick_at(
        &self,
        ctx: &CallContext,
        now: DateTime<Utc>,
    ) -> Result<TickReport, SyncError> {
        let kind = self.dispatcher.kind();
        let mut cursor = self.cursor.lock().await;

        let page = self
            .store
            .list(kind, self.config.page_size, &cursor)
            .await
            .map_err(|source| SyncError::List { kind, source })?;

        let mut report = TickReport {
            scanned: page.len(),
            ..TickReport::default()
        };
        match page.last() {
            Some(last) => *cursor = last.charge_station_id.clone(),
            None => {
                cursor.clear();
                return Ok(report);
            }
        }

        let mut ready = Vec::new();
        for op in page {
            if !op.is_due(now) {
                report.not_due += 1;
                continue;
            }

            let Some(version) = self.resolve_version(&op).await else {
                report.lookup_failed += 1;
                continue;
            };

            if !self.dispatcher.supports(version) {
                self.drop_unsupported(&op, version).await;
                report.unsupported += 1;
                continue;
            }

            match self
                .store
                .reschedule(&op.rescheduled(now, self.config.retry_after))
                .await
            {
                Ok(stored) => ready.push((stored, version)),
                Err(StoreError::Conflict { .. }) => {
                    debug!(
                        %kind,
                        charge_station_id = %op.charge_station_id,
                        "Record changed concurrently, skipping"
                    );
                    report.conflicts += 1;
                }
                Err(e) => {
                    error!(
                        %kind,
                        charge_station_id = %op.charge_station_id,
                        error = %e,
                        "Failed to persist rescheduled due time, not dispatching"
                    );
                    report.persist_failed += 1;
                }
            }
        }

        let limit = self.config.max_concurrent_sends.max(1);
        let outcomes: Vec<bool> = stream::iter(ready)
            .map(|(op, version)| self.dispatch_one(ctx, op, version))
            .buffer_unordered(limit)
            .collect()
            .await;

        report.dispatched = outcomes.iter().filter(|ok| **ok).count();
        report.dispatch_failed = outcomes.len() - report.dispatched;
        Ok(report)
    }

    /// The station's negotiated version, or `None` to leave the record
    /// untouched for a later tick.
    async fn resolve_version(&self, op: &PendingOperation) -> Option<OcppVersion> {
        let cs = op.charge_station_id.as_str();
        match self.runtime.lookup(cs).await {
            Ok(Some(details)) => {
                let version = details.version();
                if version.is_none() {
                    warn!(
                        charge_station_id = cs,
                        ocpp_version = %details.ocpp_version,
                        "Unrecognised protocol version, leaving operation pending"
                    );
                }
                version
            }
            Ok(None) => {
                info!(charge_station_id = cs, kind = %op.kind, "No runtime details, leaving operation pending");
                None
            }
            Err(e) => {
                error!(charge_station_id = cs, error = %e, "Runtime details lookup failed");
                None
            }
        }
    }

    async fn drop_unsupported(&self, op: &PendingOperation, version: OcppVersion) {
        let cs = op.charge_station_id.as_str();
        match self.store.delete(op.kind, cs, Some(op.version)).await {
            Ok(_) => {
                warn!(
                    charge_station_id = cs,
                    kind = %op.kind,
                    %version,
                    request_id = op.request_id,
                    "Operation not supported by station protocol version, dropped"
                );
                counter!(
                    "ocpp_pending_operations_dispatched_total",
                    "kind" => op.kind.as_str(),
                    "outcome" => "unsupported"
                )
                .increment(1);
            }
            Err(e) => {
                error!(charge_station_id = cs, kind = %op.kind, error = %e, "Failed to delete unsupported operation");
            }
        }
    }

    async fn dispatch_one(&self, ctx: &CallContext, op: PendingOperation, version: OcppVersion) -> bool {
        let cs = op.charge_station_id.as_str();
        match self.dispatcher.dispatch(ctx, &op, version).await {
            Ok(message_id) => {
                counter!(
                    "ocpp_pending_operations_dispatched_total",
                    "kind" => op.kind.as_str(),
                    "outcome" => "sent"
                )
                .increment(1);
                match self.store.delete(op.kind, cs, Some(op.version)).await {
                    Ok(true) => info!(
                        charge_station_id = cs,
                        kind = %op.kind,
                        request_id = op.request_id,
                        message_id = %message_id,
                        "Pending operation dispatched"
                    ),
                    Ok(false) => debug!(
                        charge_station_id = cs,
                        kind = %op.kind,
                        "Record replaced after dispatch, keeping the newer one"
                    ),
                    Err(e) => error!(
                        charge_station_id = cs,
                        kind = %op.kind,
                        error = %e,
                        "Failed to delete dispatched operation"
                    ),
                }
                true
            }
            Err(e) => {
                counter!(
                    "ocpp_pending_operations_dispatched_total",
                    "kind" => op.kind.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                warn!(
                    charge_station_id = cs,
                    kind = %op.kind,
                    request_id = op.request_id,
                    retry_count = op.retry_count,
                    next_attempt = %op.send_after,
                    error = %e,
                    "Dispatch failed, will retry"
                );
                false
            }
        }
    }
}
