//! Test doubles shared by the application tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::context::CallContext;
use super::errors::TransportError;
use super::ports::{CallMaker, OutboundCall};

/// Records every call handed to it, in completion order. Stations listed
/// in `unreachable` fail with `NotConnected`; stations in `delays` sleep
/// before the call is recorded.
#[derive(Default)]
pub struct RecordingCallMaker {
    sent: Mutex<Vec<(String, OutboundCall)>>,
    unreachable: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl RecordingCallMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_unreachable(&self, charge_station_id: &str) {
        self.unreachable
            .lock()
            .unwrap()
            .insert(charge_station_id.to_string());
    }

    pub fn delay(&self, charge_station_id: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(charge_station_id.to_string(), delay);
    }

    pub fn sent_stations(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(cs, _)| cs.clone()).collect()
    }

    pub fn sent(&self) -> Vec<(String, OutboundCall)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl CallMaker for RecordingCallMaker {
    async fn send(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        call: OutboundCall,
    ) -> Result<(), TransportError> {
        if self.unreachable.lock().unwrap().contains(charge_station_id) {
            return Err(TransportError::NotConnected(charge_station_id.to_string()));
        }
        let delay = self.delays.lock().unwrap().get(charge_station_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((charge_station_id.to_string(), call));
        Ok(())
    }
}
