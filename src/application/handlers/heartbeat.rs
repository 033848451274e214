//! Heartbeat (1.6 and 2.0.1)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::messages::heart_beat as v16_msg;
use rust_ocpp::v2_0_1::messages::heartbeat as v201_msg;
use tracing::{debug, warn};

use crate::application::actions::{v16, v201};
use crate::application::context::CallContext;
use crate::application::errors::HandlerError;
use crate::application::registry::CallHandler;
use crate::domain::ChargeStationStatusStore;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Answers heartbeats with the current time.
///
/// Recording the heartbeat is a non-critical side effect: a store failure
/// is logged at warn and the response still goes out.
pub struct HeartbeatHandler {
    status_store: Arc<dyn ChargeStationStatusStore>,
    clock: Clock,
}

impl HeartbeatHandler {
    pub fn new(status_store: Arc<dyn ChargeStationStatusStore>) -> Self {
        Self {
            status_store,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn beat(&self, charge_station_id: &str) -> DateTime<Utc> {
        let now = (self.clock)();
        debug!(charge_station_id, "Heartbeat");
        if let Err(e) = self.status_store.set_heartbeat(charge_station_id, now).await {
            warn!(charge_station_id, error = %e, "Failed to record heartbeat");
        }
        now
    }
}

#[async_trait]
impl CallHandler<v16::Heartbeat> for HeartbeatHandler {
    async fn handle_call(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        _request: v16_msg::HeartbeatRequest,
    ) -> Result<v16_msg::HeartbeatResponse, HandlerError> {
        Ok(v16_msg::HeartbeatResponse {
            current_time: self.beat(charge_station_id).await,
        })
    }
}

#[async_trait]
impl CallHandler<v201::Heartbeat> for HeartbeatHandler {
    async fn handle_call(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        _request: v201_msg::HeartbeatRequest,
    ) -> Result<v201_msg::HeartbeatResponse, HandlerError> {
        Ok(v201_msg::HeartbeatResponse {
            current_time: self.beat(charge_station_id).await,
        })
    }
}
