//! Diagnostics and log upload tracking
//!
//! Station notifications (1.6 `DiagnosticsStatusNotification`, 2.0.1
//! `LogStatusNotification`) and the answers to our own `GetDiagnostics` /
//! `GetLog` calls all end up as a [`DiagnosticsStatus`] per station and kind.

use std::sync::Arc;

use async_trait::async_trait;
use rust_ocpp::v1_6::messages::diagnostics_status_notification::{
    DiagnosticsStatusNotificationRequest, DiagnosticsStatusNotificationResponse,
};
use rust_ocpp::v1_6::messages::get_diagnostics::{GetDiagnosticsRequest, GetDiagnosticsResponse};
use rust_ocpp::v2_0_1::enumerations::log_enum_type::LogEnumType;
use rust_ocpp::v2_0_1::messages::get_log::{GetLogRequest, GetLogResponse};
use rust_ocpp::v2_0_1::messages::log_status_notification::{
    LogStatusNotificationRequest, LogStatusNotificationResponse,
};
use tracing::{info, warn};

use crate::application::actions::{v16, v201};
use crate::application::codec::wire_name;
use crate::application::context::CallContext;
use crate::application::errors::{HandlerError, ProtocolError};
use crate::application::registry::{CallHandler, CallState, ResultHandler};
use crate::application::sync::OperationRef;
use crate::domain::{DiagnosticsStatus, DiagnosticsStatusStore, OperationKind, UploadStatus};

pub struct DiagnosticsHandler {
    store: Arc<dyn DiagnosticsStatusStore>,
}

impl DiagnosticsHandler {
    pub fn new(store: Arc<dyn DiagnosticsStatusStore>) -> Self {
        Self { store }
    }

    async fn record(
        &self,
        charge_station_id: &str,
        kind: OperationKind,
        request_id: Option<i32>,
        status: UploadStatus,
        file_name: Option<String>,
    ) -> Result<(), HandlerError> {
        let current = self.store.get(kind, charge_station_id).await.map_err(|e| {
            HandlerError::store(format!("reading {kind} status of {charge_station_id}"), e)
        })?;

        let mut entry = match current {
            Some(mut current) if request_id.is_none() || current.request_id == request_id => {
                current.transition(status);
                current
            }
            _ => DiagnosticsStatus::new(charge_station_id, kind, request_id, status),
        };
        if file_name.is_some() {
            entry.file_name = file_name;
        }

        info!(
            charge_station_id,
            %kind,
            request_id = ?entry.request_id,
            status = %entry.status,
            "Upload status updated"
        );
        self.store.put(entry).await.map_err(|e| {
            HandlerError::store(format!("recording {kind} status of {charge_station_id}"), e)
        })
    }

    /// 2.0.1 uses `GetLog` for both kinds; the request id tells them apart.
    async fn log_kind(
        &self,
        charge_station_id: &str,
        request_id: Option<i32>,
    ) -> Result<OperationKind, HandlerError> {
        let Some(request_id) = request_id else {
            return Ok(OperationKind::LogRetrieval);
        };
        let diagnostics = self
            .store
            .get(OperationKind::DiagnosticsRetrieval, charge_station_id)
            .await
            .map_err(|e| {
                HandlerError::store(format!("reading diagnostics status of {charge_station_id}"), e)
            })?;
        if diagnostics.is_some_and(|d| d.request_id == Some(request_id)) {
            Ok(OperationKind::DiagnosticsRetrieval)
        } else {
            Ok(OperationKind::LogRetrieval)
        }
    }
}

// ── Station notifications ──────────────────────────────────────

#[async_trait]
impl CallHandler<v16::DiagnosticsStatusNotification> for DiagnosticsHandler {
    async fn handle_call(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        request: DiagnosticsStatusNotificationRequest,
    ) -> Result<DiagnosticsStatusNotificationResponse, HandlerError> {
        let status = UploadStatus::from_str(&wire_name(&request.status));
        self.record(
            charge_station_id,
            OperationKind::DiagnosticsRetrieval,
            None,
            status,
            None,
        )
        .await?;
        Ok(DiagnosticsStatusNotificationResponse {})
    }
}

#[async_trait]
impl CallHandler<v201::LogStatusNotification> for DiagnosticsHandler {
    async fn handle_call(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        request: LogStatusNotificationRequest,
    ) -> Result<LogStatusNotificationResponse, HandlerError> {
        let kind = self.log_kind(charge_station_id, request.request_id).await?;
        let status = UploadStatus::from_str(&wire_name(&request.status));
        self.record(charge_station_id, kind, request.request_id, status, None)
            .await?;
        Ok(LogStatusNotificationResponse {})
    }
}

// ── Answers to our calls ───────────────────────────────────────

#[async_trait]
impl ResultHandler<v16::GetDiagnostics> for DiagnosticsHandler {
    async fn handle_result(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        _request: GetDiagnosticsRequest,
        result: GetDiagnosticsResponse,
        state: CallState,
    ) -> Result<(), HandlerError> {
        let request_id = OperationRef::from_state(&state).map(|r| r.request_id);
        // No file name means the station has nothing to upload.
        let status = if result.file_name.is_some() {
            UploadStatus::Accepted
        } else {
            UploadStatus::Rejected
        };
        self.record(
            charge_station_id,
            OperationKind::DiagnosticsRetrieval,
            request_id,
            status,
            result.file_name,
        )
        .await
    }

    async fn handle_error(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        _request: GetDiagnosticsRequest,
        error: ProtocolError,
        state: CallState,
    ) -> Result<(), HandlerError> {
        warn!(charge_station_id, error = %error, "GetDiagnostics failed");
        let request_id = OperationRef::from_state(&state).map(|r| r.request_id);
        self.record(
            charge_station_id,
            OperationKind::DiagnosticsRetrieval,
            request_id,
            UploadStatus::Failed,
            None,
        )
        .await
    }
}

fn get_log_kind(request: &GetLogRequest, state: &CallState) -> OperationKind {
    match OperationRef::from_state(state) {
        Some(r) => r.kind,
        None => match request.log_type {
            LogEnumType::DiagnosticsLog => OperationKind::DiagnosticsRetrieval,
            _ => OperationKind::LogRetrieval,
        },
    }
}

#[async_trait]
impl ResultHandler<v201::GetLog> for DiagnosticsHandler {
    async fn handle_result(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        request: GetLogRequest,
        result: GetLogResponse,
        state: CallState,
    ) -> Result<(), HandlerError> {
        let kind = get_log_kind(&request, &state);
        let status = UploadStatus::from_str(&wire_name(&result.status));
        self.record(
            charge_station_id,
            kind,
            Some(request.request_id),
            status,
            result.filename,
        )
        .await
    }

    async fn handle_error(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        request: GetLogRequest,
        error: ProtocolError,
        state: CallState,
    ) -> Result<(), HandlerError> {
        warn!(charge_station_id, error = %error, "GetLog failed");
        let kind = get_log_kind(&request, &state);
        self.record(
            charge_station_id,
            kind,
            Some(request.request_id),
            UploadStatus::Failed,
            None,
        )
        .await
    }
}
