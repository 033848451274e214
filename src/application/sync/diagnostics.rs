//! Diagnostics retrieval: 1.6 `GetDiagnostics`, 2.0.1 `GetLog(DiagnosticsLog)`

use std::sync::Arc;

use async_trait::async_trait;
use rust_ocpp::v1_6::messages::get_diagnostics::GetDiagnosticsRequest;
use rust_ocpp::v2_0_1::enumerations::log_enum_type::LogEnumType;

use super::logs::get_log_request;
use super::{DeferredDispatcher, OperationRef};
use crate::application::actions::{v16, v201};
use crate::application::context::CallContext;
use crate::application::correlator::ResultCorrelator;
use crate::application::errors::CorrelationError;
use crate::domain::{OcppVersion, OperationKind, PendingOperation};

pub struct DiagnosticsDispatcher {
    correlator: Arc<ResultCorrelator>,
}

impl DiagnosticsDispatcher {
    pub fn new(correlator: Arc<ResultCorrelator>) -> Self {
        Self { correlator }
    }
}

#[async_trait]
impl DeferredDispatcher for DiagnosticsDispatcher {
    fn kind(&self) -> OperationKind {
        OperationKind::DiagnosticsRetrieval
    }

    fn supports(&self, _version: OcppVersion) -> bool {
        true
    }

    async fn dispatch(
        &self,
        ctx: &CallContext,
        op: &PendingOperation,
        version: OcppVersion,
    ) -> Result<String, CorrelationError> {
        let state = OperationRef::of(op).to_state();
        match version {
            OcppVersion::V16 => {
                let request = GetDiagnosticsRequest {
                    location: op.payload.location.clone(),
                    retries: op.payload.retries,
                    retry_interval: op.payload.retry_interval,
                    start_time: op.payload.oldest_timestamp,
                    stop_time: op.payload.latest_timestamp,
                };
                self.correlator
                    .send::<v16::GetDiagnostics>(ctx, &op.charge_station_id, request, state)
                    .await
            }
            OcppVersion::V201 => {
                let request = get_log_request(op, LogEnumType::DiagnosticsLog);
                self.correlator
                    .send::<v201::GetLog>(ctx, &op.charge_station_id, request, state)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::HandlerRegistry;
    use crate::application::testing::RecordingCallMaker;
    use crate::domain::{Action, OperationPayload};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn setup() -> (DiagnosticsDispatcher, Arc<RecordingCallMaker>) {
        let call_maker = Arc::new(RecordingCallMaker::new());
        let correlator = Arc::new(ResultCorrelator::new(
            Arc::new(HandlerRegistry::builder().build()),
            call_maker.clone(),
        ));
        (DiagnosticsDispatcher::new(correlator), call_maker)
    }

    fn op(cs: &str) -> PendingOperation {
        PendingOperation::new(
            cs,
            OperationKind::DiagnosticsRetrieval,
            4,
            OperationPayload {
                location: "ftp://diag.example.com/".into(),
                oldest_timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
                retry_interval: Some(30),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn v16_station_gets_get_diagnostics() {
        let (d, call_maker) = setup();
        d.dispatch(&CallContext::new(), &op("CS16"), OcppVersion::V16)
            .await
            .unwrap();

        let sent = call_maker.sent();
        assert_eq!(sent[0].1.action, v16::GetDiagnostics::id());
        let payload = &sent[0].1.payload;
        assert_eq!(payload["location"], json!("ftp://diag.example.com/"));
        assert_eq!(payload["retryInterval"], json!(30));
        assert!(payload["startTime"].as_str().unwrap().starts_with("2024-05-01T00:00:00"));
    }

    #[tokio::test]
    async fn v201_station_gets_diagnostics_log() {
        let (d, call_maker) = setup();
        d.dispatch(&CallContext::new(), &op("CS201"), OcppVersion::V201)
            .await
            .unwrap();

        let sent = call_maker.sent();
        assert_eq!(sent[0].1.action, v201::GetLog::id());
        assert_eq!(sent[0].1.payload["logType"], json!("DiagnosticsLog"));
        assert_eq!(sent[0].1.payload["requestId"], json!(4));
    }

    #[test]
    fn every_version_is_supported() {
        let (d, _) = setup();
        for v in OcppVersion::ALL {
            assert!(d.supports(*v));
        }
    }
}
