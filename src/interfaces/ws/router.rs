//! Inbound frame routing for one station session
//!
//! Calls go through the [`Dispatcher`] and are answered with a CallResult
//! or CallError. CallResult/CallError frames are handed to the
//! [`ResultCorrelator`]. Frames are handled one at a time, in arrival order.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::{
    CallContext, CorrelationError, Dispatcher, ProtocolError, ResultCorrelator,
};
use crate::domain::OcppVersion;
use crate::shared::ocpp_frame::{OcppFrame, OcppFrameError};

pub struct FrameRouter {
    dispatcher: Arc<Dispatcher>,
    correlator: Arc<ResultCorrelator>,
}

impl FrameRouter {
    pub fn new(dispatcher: Arc<Dispatcher>, correlator: Arc<ResultCorrelator>) -> Self {
        Self {
            dispatcher,
            correlator,
        }
    }

    pub fn correlator(&self) -> &Arc<ResultCorrelator> {
        &self.correlator
    }

    /// Handle one text frame. Returns the reply to send back, if any.
    pub async fn route(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        version: OcppVersion,
        text: &str,
    ) -> Option<String> {
        let frame = match OcppFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => return parse_error_reply(charge_station_id, version, text, e),
        };

        match frame {
            OcppFrame::Call {
                message_id,
                action,
                payload,
            } => {
                let reply = match self
                    .dispatcher
                    .dispatch(ctx, charge_station_id, version, &action, payload)
                    .await
                {
                    Ok(payload) => OcppFrame::CallResult {
                        message_id,
                        payload,
                    },
                    Err(e) => {
                        OcppFrame::error_response(message_id, e.ocpp_error_code(version), e.to_string())
                    }
                };
                Some(reply.serialize())
            }
            OcppFrame::CallResult {
                message_id,
                payload,
            } => {
                let result = self
                    .correlator
                    .on_result(ctx, charge_station_id, &message_id, payload)
                    .await;
                log_correlation_failure(charge_station_id, &message_id, result);
                None
            }
            OcppFrame::CallError {
                message_id,
                error_code,
                error_description,
                error_details,
            } => {
                let error = ProtocolError {
                    code: error_code,
                    description: error_description,
                    details: error_details,
                };
                let result = self
                    .correlator
                    .on_error(ctx, charge_station_id, &message_id, error)
                    .await;
                log_correlation_failure(charge_station_id, &message_id, result);
                None
            }
        }
    }

    /// Drop correlation state for a closed session.
    pub fn disconnected(&self, charge_station_id: &str) -> usize {
        self.correlator.forget_charge_station(charge_station_id)
    }
}

fn log_correlation_failure(
    charge_station_id: &str,
    message_id: &str,
    result: Result<(), CorrelationError>,
) {
    // Counted and reported by the correlator; nothing goes back on the wire.
    if let Err(e) = result {
        debug!(charge_station_id, message_id, error = %e, "Answer not applied");
    }
}

/// A frame we cannot parse can only be answered if its message id is
/// recoverable; otherwise it is dropped.
fn parse_error_reply(
    charge_station_id: &str,
    version: OcppVersion,
    text: &str,
    error: OcppFrameError,
) -> Option<String> {
    warn!(charge_station_id, error = %error, "Malformed OCPP frame");
    let message_id = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get(1).and_then(|id| id.as_str()).map(str::to_string))?;
    let code = match version {
        OcppVersion::V16 => "FormationViolation",
        OcppVersion::V201 => "FormatViolation",
    };
    Some(OcppFrame::error_response(message_id, code, error.to_string()).serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::actions::v16;
    use crate::application::handlers::HeartbeatHandler;
    use crate::application::testing::RecordingCallMaker;
    use crate::application::{CallState, HandlerError, HandlerRegistry, ResultHandler};
    use crate::infrastructure::InMemoryChargeStationStatusStore;
    use async_trait::async_trait;
    use rust_ocpp::v1_6::messages::get_diagnostics::{GetDiagnosticsRequest, GetDiagnosticsResponse};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResults(AtomicUsize);

    #[async_trait]
    impl ResultHandler<v16::GetDiagnostics> for CountingResults {
        async fn handle_result(
            &self,
            _ctx: &CallContext,
            _cs: &str,
            _request: GetDiagnosticsRequest,
            _result: GetDiagnosticsResponse,
            _state: CallState,
        ) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        router: FrameRouter,
        results: Arc<CountingResults>,
        calls: Arc<RecordingCallMaker>,
    }

    fn fixture() -> Fixture {
        let results = Arc::new(CountingResults(AtomicUsize::new(0)));
        let heartbeat = Arc::new(HeartbeatHandler::new(Arc::new(
            InMemoryChargeStationStatusStore::new(),
        )));
        let mut builder = HandlerRegistry::builder();
        builder.call::<v16::Heartbeat>(heartbeat).unwrap();
        builder.result::<v16::GetDiagnostics>(results.clone()).unwrap();
        let registry = Arc::new(builder.build());

        let calls = Arc::new(RecordingCallMaker::new());
        let router = FrameRouter::new(
            Arc::new(Dispatcher::new(registry.clone())),
            Arc::new(ResultCorrelator::new(registry, calls.clone())),
        );
        Fixture {
            router,
            results,
            calls,
        }
    }

    fn parse(reply: Option<String>) -> Value {
        serde_json::from_str(&reply.expect("expected a reply")).unwrap()
    }

    #[tokio::test]
    async fn call_is_answered_with_call_result() {
        let f = fixture();
        let reply = f
            .router
            .route(&CallContext::new(), "CS1", OcppVersion::V16, r#"[2,"m1","Heartbeat",{}]"#)
            .await;
        let value = parse(reply);
        assert_eq!(value[0], 3);
        assert_eq!(value[1], "m1");
        assert!(value[2]["currentTime"].is_string());
    }

    #[tokio::test]
    async fn unknown_action_is_answered_not_implemented() {
        let f = fixture();
        let reply = f
            .router
            .route(&CallContext::new(), "CS1", OcppVersion::V16, r#"[2,"m2","DataTransfer",{}]"#)
            .await;
        assert_eq!(
            parse(reply),
            json!([4, "m2", "NotImplemented", "No call handler for DataTransfer on OCPP 1.6", {}])
        );
    }

    #[tokio::test]
    async fn bad_payload_is_a_format_violation() {
        let f = fixture();
        let reply = f
            .router
            .route(
                &CallContext::new(),
                "CS1",
                OcppVersion::V16,
                r#"[2,"m3","Heartbeat","not an object"]"#,
            )
            .await;
        let value = parse(reply);
        assert_eq!(value[2], "FormationViolation");
    }

    #[tokio::test]
    async fn malformed_frame_with_message_id_gets_error_reply() {
        let f = fixture();
        let reply = f
            .router
            .route(&CallContext::new(), "CS1", OcppVersion::V201, r#"[9,"m4"]"#)
            .await;
        let value = parse(reply);
        assert_eq!(value[0], 4);
        assert_eq!(value[1], "m4");
        assert_eq!(value[2], "FormatViolation");
    }

    #[tokio::test]
    async fn unparseable_text_is_dropped() {
        let f = fixture();
        let reply = f
            .router
            .route(&CallContext::new(), "CS1", OcppVersion::V16, "{not json")
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn call_result_reaches_the_result_handler() {
        let f = fixture();
        let ctx = CallContext::new();
        let request = GetDiagnosticsRequest {
            location: "ftp://example.com/".into(),
            retries: None,
            retry_interval: None,
            start_time: None,
            stop_time: None,
        };
        let message_id = f
            .router
            .correlator()
            .send::<v16::GetDiagnostics>(&ctx, "CS1", request, None)
            .await
            .unwrap();
        assert_eq!(f.calls.sent_count(), 1);

        let text = json!([3, message_id, {"fileName": "diag.zip"}]).to_string();
        assert!(f.router.route(&ctx, "CS1", OcppVersion::V16, &text).await.is_none());
        assert_eq!(f.results.0.load(Ordering::SeqCst), 1);

        // a second copy is unsolicited and ignored
        assert!(f.router.route(&ctx, "CS1", OcppVersion::V16, &text).await.is_none());
        assert_eq!(f.results.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disconnect_forgets_pending_calls() {
        let f = fixture();
        let ctx = CallContext::new();
        let request = GetDiagnosticsRequest {
            location: "ftp://example.com/".into(),
            retries: None,
            retry_interval: None,
            start_time: None,
            stop_time: None,
        };
        f.router
            .correlator()
            .send::<v16::GetDiagnostics>(&ctx, "CS1", request, None)
            .await
            .unwrap();
        assert_eq!(f.router.disconnected("CS1"), 1);
        assert_eq!(f.router.correlator().pending_count(), 0);
    }
}
