//! Log retrieval: 2.0.1 `GetLog` only

use std::sync::Arc;

use async_trait::async_trait;
use rust_ocpp::v2_0_1::datatypes::log_parameters_type::LogParametersType;
use rust_ocpp::v2_0_1::enumerations::log_enum_type::LogEnumType;
use rust_ocpp::v2_0_1::messages::get_log::GetLogRequest;

use super::{DeferredDispatcher, OperationRef};
use crate::application::actions::v201;
use crate::application::context::CallContext;
use crate::application::correlator::ResultCorrelator;
use crate::application::errors::CorrelationError;
use crate::domain::{ActionId, OcppVersion, OperationKind, PendingOperation};

pub struct LogDispatcher {
    correlator: Arc<ResultCorrelator>,
}

impl LogDispatcher {
    pub fn new(correlator: Arc<ResultCorrelator>) -> Self {
        Self { correlator }
    }
}

#[async_trait]
impl DeferredDispatcher for LogDispatcher {
    fn kind(&self) -> OperationKind {
        OperationKind::LogRetrieval
    }

    fn supports(&self, version: OcppVersion) -> bool {
        version == OcppVersion::V201
    }

    async fn dispatch(
        &self,
        ctx: &CallContext,
        op: &PendingOperation,
        version: OcppVersion,
    ) -> Result<String, CorrelationError> {
        if version != OcppVersion::V201 {
            return Err(CorrelationError::NotImplemented {
                action: ActionId::new(version, "GetLog"),
            });
        }
        let log_type = match op.payload.log_type.as_deref() {
            Some("DiagnosticsLog") => LogEnumType::DiagnosticsLog,
            _ => LogEnumType::SecurityLog,
        };
        self.correlator
            .send::<v201::GetLog>(
                ctx,
                &op.charge_station_id,
                get_log_request(op, log_type),
                OperationRef::of(op).to_state(),
            )
            .await
    }
}

pub(super) fn get_log_request(op: &PendingOperation, log_type: LogEnumType) -> GetLogRequest {
    GetLogRequest {
        log_type,
        request_id: op.request_id,
        retries: op.payload.retries,
        retry_interval: op.payload.retry_interval,
        log: LogParametersType {
            remote_location: op.payload.location.clone(),
            oldest_timestamp: op.payload.oldest_timestamp,
            latest_timestamp: op.payload.latest_timestamp,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::HandlerRegistry;
    use crate::application::testing::RecordingCallMaker;
    use crate::domain::OperationPayload;
    use serde_json::json;

    fn op() -> PendingOperation {
        PendingOperation::new(
            "CS201",
            OperationKind::LogRetrieval,
            31,
            OperationPayload {
                location: "https://logs.example.com/upload".into(),
                retries: Some(2),
                ..Default::default()
            },
        )
    }

    #[test]
    fn only_v201_is_supported() {
        let correlator = Arc::new(ResultCorrelator::new(
            Arc::new(HandlerRegistry::builder().build()),
            Arc::new(RecordingCallMaker::new()),
        ));
        let d = LogDispatcher::new(correlator);
        assert!(d.supports(OcppVersion::V201));
        assert!(!d.supports(OcppVersion::V16));
    }

    #[tokio::test]
    async fn sends_security_log_request_by_default() {
        let call_maker = Arc::new(RecordingCallMaker::new());
        let correlator = Arc::new(ResultCorrelator::new(
            Arc::new(HandlerRegistry::builder().build()),
            call_maker.clone(),
        ));
        let d = LogDispatcher::new(correlator.clone());

        let id = d
            .dispatch(&CallContext::new(), &op(), OcppVersion::V201)
            .await
            .unwrap();

        let sent = call_maker.sent();
        assert_eq!(sent[0].1.action, ActionId::new(OcppVersion::V201, "GetLog"));
        assert_eq!(sent[0].1.message_id, id);
        let payload = &sent[0].1.payload;
        assert_eq!(payload["logType"], json!("SecurityLog"));
        assert_eq!(payload["requestId"], json!(31));
        assert_eq!(payload["retries"], json!(2));
        assert_eq!(
            payload["log"]["remoteLocation"],
            json!("https://logs.example.com/upload")
        );
        assert!(correlator.is_pending("CS201", &id));
    }
}
