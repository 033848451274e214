//! Result correlator
//!
//! Tracks CSMS-initiated calls until the station answers. Each successful
//! [`ResultCorrelator::send`] leaves exactly one entry keyed by
//! `(charge station id, message id)`; the matching CallResult or CallError
//! removes it and routes the decoded answer, together with the original
//! request and the caller's opaque state, to the action's result handler.
//!
//! Entries are never expired by time. They are dropped when the station
//! disconnects (see [`ResultCorrelator::forget_charge_station`]); durable
//! delivery is the sync engine's job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use metrics::{counter, gauge};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::codec::Codec;
use super::context::CallContext;
use super::errors::{CorrelationError, HandlerError, ProtocolError};
use super::ports::{CallMaker, OutboundCall};
use super::registry::{CallState, HandlerRegistry};
use crate::domain::{Action, ActionId};

/// What gets remembered for an in-flight call, with `A` erased.
trait PendingCall: Send + Sync {
    fn complete<'a>(
        self: Box<Self>,
        registry: &'a HandlerRegistry,
        ctx: &'a CallContext,
        charge_station_id: &'a str,
        payload: Value,
    ) -> BoxFuture<'a, Result<(), CorrelationError>>;

    fn fail<'a>(
        self: Box<Self>,
        registry: &'a HandlerRegistry,
        ctx: &'a CallContext,
        charge_station_id: &'a str,
        error: ProtocolError,
    ) -> BoxFuture<'a, Result<(), CorrelationError>>;
}

struct TypedPendingCall<A: Action> {
    request: A::Request,
    state: CallState,
}

impl<A: Action> PendingCall for TypedPendingCall<A> {
    fn complete<'a>(
        self: Box<Self>,
        registry: &'a HandlerRegistry,
        ctx: &'a CallContext,
        charge_station_id: &'a str,
        payload: Value,
    ) -> BoxFuture<'a, Result<(), CorrelationError>> {
        Box::pin(async move {
            let result = Codec::<A>::decode_response(payload).map_err(CorrelationError::Decode)?;
            let handler = registry
                .result_handler::<A>()
                .ok_or(CorrelationError::NotImplemented { action: A::id() })?;
            ctx.run(handler.handle_result(ctx, charge_station_id, self.request, result, self.state))
                .await
                .unwrap_or(Err(HandlerError::Cancelled))
                .map_err(|source| CorrelationError::Handler {
                    action: A::id(),
                    source,
                })
        })
    }

    fn fail<'a>(
        self: Box<Self>,
        registry: &'a HandlerRegistry,
        ctx: &'a CallContext,
        charge_station_id: &'a str,
        error: ProtocolError,
    ) -> BoxFuture<'a, Result<(), CorrelationError>> {
        Box::pin(async move {
            let Some(handler) = registry.result_handler::<A>() else {
                warn!(
                    charge_station_id,
                    action = %A::id(),
                    error = %error,
                    "CallError for action without result handler, dropping request"
                );
                return Ok(());
            };
            ctx.run(handler.handle_error(ctx, charge_station_id, self.request, error, self.state))
                .await
                .unwrap_or(Err(HandlerError::Cancelled))
                .map_err(|source| CorrelationError::Handler {
                    action: A::id(),
                    source,
                })
        })
    }
}

struct PendingCorrelation {
    action: ActionId,
    created_at: DateTime<Utc>,
    call: Box<dyn PendingCall>,
}

pub struct ResultCorrelator {
    registry: Arc<HandlerRegistry>,
    call_maker: Arc<dyn CallMaker>,
    pending: DashMap<(String, String), PendingCorrelation>,
}

impl ResultCorrelator {
    pub fn new(registry: Arc<HandlerRegistry>, call_maker: Arc<dyn CallMaker>) -> Self {
        Self {
            registry,
            call_maker,
            pending: DashMap::new(),
        }
    }

    /// Encode `request`, hand it to the call maker and remember it.
    ///
    /// Returns the message id the answer will carry. When the call maker
    /// fails nothing is remembered and the transport error is returned.
    pub async fn send<A: Action>(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        request: A::Request,
        state: CallState,
    ) -> Result<String, CorrelationError> {
        let payload = Codec::<A>::encode_request(&request).map_err(CorrelationError::Encode)?;
        let message_id = Uuid::new_v4().to_string();
        let key = (charge_station_id.to_string(), message_id.clone());

        // Registered before the frame leaves so a fast answer always finds it.
        self.pending.insert(
            key.clone(),
            PendingCorrelation {
                action: A::id(),
                created_at: Utc::now(),
                call: Box::new(TypedPendingCall::<A> { request, state }),
            },
        );
        self.update_gauge();

        let call = OutboundCall {
            message_id: message_id.clone(),
            action: A::id(),
            payload,
        };
        if let Err(e) = self.call_maker.send(ctx, charge_station_id, call).await {
            self.pending.remove(&key);
            self.update_gauge();
            warn!(charge_station_id, action = %A::id(), error = %e, "Failed to send call");
            return Err(e.into());
        }

        debug!(charge_station_id, action = %A::id(), message_id = %message_id, "Call sent, awaiting result");
        Ok(message_id)
    }

    /// Route a CallResult payload to the result handler of the matching call.
    pub async fn on_result(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        message_id: &str,
        payload: Value,
    ) -> Result<(), CorrelationError> {
        let entry = self.take(charge_station_id, message_id)?;
        let action = entry.action;
        debug!(
            charge_station_id,
            %action,
            message_id,
            waited_ms = (Utc::now() - entry.created_at).num_milliseconds(),
            "CallResult received"
        );
        let result = entry
            .call
            .complete(&self.registry, ctx, charge_station_id, payload)
            .await;
        self.record_outcome(charge_station_id, message_id, action, &result);
        result
    }

    /// Route a CallError to the error path of the matching call's result handler.
    pub async fn on_error(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        message_id: &str,
        error: ProtocolError,
    ) -> Result<(), CorrelationError> {
        let entry = self.take(charge_station_id, message_id)?;
        let action = entry.action;
        info!(
            charge_station_id,
            %action,
            message_id,
            code = %error.code,
            "CallError received"
        );
        let result = entry
            .call
            .fail(&self.registry, ctx, charge_station_id, error)
            .await;
        self.record_outcome(charge_station_id, message_id, action, &result);
        result
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, charge_station_id: &str, message_id: &str) -> bool {
        self.pending
            .contains_key(&(charge_station_id.to_string(), message_id.to_string()))
    }

    /// Drop every in-flight call to `charge_station_id`. Returns how many
    /// were dropped.
    pub fn forget_charge_station(&self, charge_station_id: &str) -> usize {
        let keys: Vec<(String, String)> = self
            .pending
            .iter()
            .filter(|entry| entry.key().0 == charge_station_id)
            .map(|entry| entry.key().clone())
            .collect();
        let dropped = keys
            .iter()
            .filter(|key| self.pending.remove(*key).is_some())
            .count();
        if dropped > 0 {
            self.update_gauge();
            info!(charge_station_id, dropped, "Dropped pending calls of disconnected station");
        }
        dropped
    }

    fn take(
        &self,
        charge_station_id: &str,
        message_id: &str,
    ) -> Result<PendingCorrelation, CorrelationError> {
        match self
            .pending
            .remove(&(charge_station_id.to_string(), message_id.to_string()))
        {
            Some((_, entry)) => {
                self.update_gauge();
                Ok(entry)
            }
            None => {
                counter!("ocpp_unsolicited_results_total").increment(1);
                warn!(charge_station_id, message_id, "Unsolicited result, no pending call");
                Err(CorrelationError::UnsolicitedResult {
                    charge_station_id: charge_station_id.to_string(),
                    message_id: message_id.to_string(),
                })
            }
        }
    }

    fn record_outcome(
        &self,
        charge_station_id: &str,
        message_id: &str,
        action: ActionId,
        result: &Result<(), CorrelationError>,
    ) {
        let outcome = match result {
            Ok(()) => "ok",
            Err(CorrelationError::Decode(_)) => "decode_error",
            Err(CorrelationError::NotImplemented { .. }) => "not_implemented",
            Err(_) => "handler_error",
        };
        if let Err(e) = result {
            error!(charge_station_id, %action, message_id, error = %e, "Result handling failed");
        }
        counter!(
            "ocpp_results_correlated_total",
            "action" => action.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    fn update_gauge(&self) {
        gauge!("ocpp_pending_correlations").set(self.pending.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::TransportError;
    use crate::application::registry::ResultHandler;
    use crate::application::testing::RecordingCallMaker;
    use crate::domain::OcppVersion;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct FetchRequest {
        request_id: i32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct FetchResponse {
        status: String,
    }

    struct Fetch;
    impl Action for Fetch {
        const NAME: &'static str = "Fetch";
        const VERSION: OcppVersion = OcppVersion::V201;
        type Request = FetchRequest;
        type Response = FetchResponse;
    }

    #[derive(Debug, PartialEq)]
    enum Seen {
        Result(String, FetchRequest, FetchResponse, CallState),
        Error(String, FetchRequest, String, CallState),
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Seen>>,
    }

    #[async_trait]
    impl ResultHandler<Fetch> for Recorder {
        async fn handle_result(
            &self,
            _ctx: &CallContext,
            cs: &str,
            request: FetchRequest,
            result: FetchResponse,
            state: CallState,
        ) -> Result<(), HandlerError> {
            if result.status == "Explode" {
                return Err(HandlerError::Other("explode".into()));
            }
            self.seen
                .lock()
                .unwrap()
                .push(Seen::Result(cs.into(), request, result, state));
            Ok(())
        }

        async fn handle_error(
            &self,
            _ctx: &CallContext,
            cs: &str,
            request: FetchRequest,
            error: ProtocolError,
            state: CallState,
        ) -> Result<(), HandlerError> {
            self.seen
                .lock()
                .unwrap()
                .push(Seen::Error(cs.into(), request, error.code, state));
            Ok(())
        }
    }

    fn setup() -> (ResultCorrelator, Arc<RecordingCallMaker>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut builder = HandlerRegistry::builder();
        builder.result::<Fetch>(recorder.clone()).unwrap();
        let call_maker = Arc::new(RecordingCallMaker::new());
        let correlator = ResultCorrelator::new(Arc::new(builder.build()), call_maker.clone());
        (correlator, call_maker, recorder)
    }

    #[tokio::test]
    async fn result_reaches_handler_with_request_and_state() {
        let (correlator, call_maker, recorder) = setup();
        let ctx = CallContext::new();
        let state = Some(json!({"kind": "log", "requestId": 5}));

        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 5 }, state.clone())
            .await
            .unwrap();

        let sent = call_maker.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "CS1");
        assert_eq!(sent[0].1.message_id, id);
        assert_eq!(sent[0].1.action, Fetch::id());
        assert_eq!(sent[0].1.payload, json!({"requestId": 5}));
        assert!(correlator.is_pending("CS1", &id));

        correlator
            .on_result(&ctx, "CS1", &id, json!({"status": "Accepted"}))
            .await
            .unwrap();

        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Seen::Result(
                "CS1".into(),
                FetchRequest { request_id: 5 },
                FetchResponse { status: "Accepted".into() },
                state,
            )]
        );
    }

    #[tokio::test]
    async fn nil_state_round_trips_as_nil() {
        let (correlator, _, recorder) = setup();
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 1 }, None)
            .await
            .unwrap();
        correlator
            .on_result(&ctx, "CS1", &id, json!({"status": "Accepted"}))
            .await
            .unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert!(matches!(
            &seen[..],
            [Seen::Result(_, FetchRequest { request_id: 1 }, _, None)]
        ));
    }

    #[tokio::test]
    async fn unknown_message_id_is_unsolicited() {
        let (correlator, _, recorder) = setup();
        let err = correlator
            .on_result(&CallContext::new(), "CS1", "nope", json!({"status": "Accepted"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::UnsolicitedResult { .. }));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn result_is_handled_at_most_once() {
        let (correlator, _, recorder) = setup();
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 2 }, None)
            .await
            .unwrap();

        correlator
            .on_result(&ctx, "CS1", &id, json!({"status": "Accepted"}))
            .await
            .unwrap();
        let again = correlator
            .on_result(&ctx, "CS1", &id, json!({"status": "Accepted"}))
            .await;
        let error_after = correlator
            .on_error(
                &ctx,
                "CS1",
                &id,
                ProtocolError {
                    code: "InternalError".into(),
                    description: String::new(),
                    details: json!({}),
                },
            )
            .await;

        assert!(matches!(again, Err(CorrelationError::UnsolicitedResult { .. })));
        assert!(matches!(error_after, Err(CorrelationError::UnsolicitedResult { .. })));
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn message_id_is_scoped_to_the_station() {
        let (correlator, _, _) = setup();
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 3 }, None)
            .await
            .unwrap();
        let err = correlator
            .on_result(&ctx, "CS2", &id, json!({"status": "Accepted"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::UnsolicitedResult { .. }));
        assert!(correlator.is_pending("CS1", &id));
    }

    #[tokio::test]
    async fn transport_failure_leaves_no_entry() {
        let (correlator, call_maker, _) = setup();
        call_maker.make_unreachable("CS1");
        let err = correlator
            .send::<Fetch>(&CallContext::new(), "CS1", FetchRequest { request_id: 4 }, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::Transport(TransportError::NotConnected(_))
        ));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn call_error_goes_to_the_error_path() {
        let (correlator, _, recorder) = setup();
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 6 }, Some(json!(6)))
            .await
            .unwrap();
        correlator
            .on_error(
                &ctx,
                "CS1",
                &id,
                ProtocolError {
                    code: "NotSupported".into(),
                    description: "no logs here".into(),
                    details: json!({}),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![Seen::Error(
                "CS1".into(),
                FetchRequest { request_id: 6 },
                "NotSupported".into(),
                Some(json!(6)),
            )]
        );
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn malformed_result_consumes_the_entry_and_reports_decode_error() {
        let (correlator, _, recorder) = setup();
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 7 }, None)
            .await
            .unwrap();
        let err = correlator
            .on_result(&ctx, "CS1", &id, json!({"status": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::Decode(_)));
        assert_eq!(correlator.pending_count(), 0);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_error_is_returned_to_the_caller() {
        let (correlator, _, _) = setup();
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 8 }, None)
            .await
            .unwrap();
        let err = correlator
            .on_result(&ctx, "CS1", &id, json!({"status": "Explode"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CorrelationError::Handler {
                source: HandlerError::Other(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_result_handler_is_not_implemented() {
        let call_maker = Arc::new(RecordingCallMaker::new());
        let correlator =
            ResultCorrelator::new(Arc::new(HandlerRegistry::builder().build()), call_maker);
        let ctx = CallContext::new();
        let id = correlator
            .send::<Fetch>(&ctx, "CS1", FetchRequest { request_id: 9 }, None)
            .await
            .unwrap();
        let err = correlator
            .on_result(&ctx, "CS1", &id, json!({"status": "Accepted"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::NotImplemented { .. }));
    }

    #[tokio::test]
    async fn disconnect_drops_only_that_stations_entries() {
        let (correlator, _, _) = setup();
        let ctx = CallContext::new();
        for (cs, id) in [("CS1", 1), ("CS1", 2), ("CS2", 3)] {
            correlator
                .send::<Fetch>(&ctx, cs, FetchRequest { request_id: id }, None)
                .await
                .unwrap();
        }
        assert_eq!(correlator.forget_charge_station("CS1"), 2);
        assert_eq!(correlator.pending_count(), 1);
    }
}
