//! Session registry
//!
//! Live station connections keyed by charge station id. It is the
//! transport behind [`CallMaker`] and the source of runtime details
//! (negotiated protocol version) for the sync loops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::{Connection, EvictedSession};
use crate::application::{CallContext, CallMaker, OutboundCall, TransportError};
use crate::domain::{OcppVersion, RuntimeDetails, RuntimeDetailsLookup, StoreResult};
use crate::shared::ocpp_frame::OcppFrame;

pub struct SessionRegistry {
    sessions: DashMap<String, Connection>,
    next_connection_id: AtomicU64,
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn shared() -> SharedSessionRegistry {
        Arc::new(Self::new())
    }

    /// Register a connection. A previous session of the same station is
    /// replaced and returned.
    pub fn register(
        &self,
        charge_station_id: &str,
        sender: mpsc::UnboundedSender<String>,
        ocpp_version: OcppVersion,
    ) -> (u64, Option<EvictedSession>) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        let connection = Connection::new(connection_id, charge_station_id, sender, ocpp_version);
        let evicted = self
            .sessions
            .insert(charge_station_id.to_string(), connection)
            .map(|old| old.evicted());

        info!(charge_station_id, %ocpp_version, connection_id, "Registered charge station session");
        if let Some(old) = &evicted {
            warn!(
                charge_station_id,
                evicted_connection_id = old.connection_id,
                evicted_age_secs = old.age(Utc::now()).num_seconds(),
                "Replaced existing session"
            );
        }
        (connection_id, evicted)
    }

    /// Remove the session if it still belongs to `connection_id`. Returns
    /// false when a newer connection has taken over.
    pub fn unregister(&self, charge_station_id: &str, connection_id: u64) -> bool {
        let removed = self
            .sessions
            .remove_if(charge_station_id, |_, conn| conn.connection_id == connection_id)
            .is_some();
        if removed {
            info!(charge_station_id, connection_id, "Unregistered charge station session");
        } else {
            debug!(charge_station_id, connection_id, "Session already replaced, nothing to unregister");
        }
        removed
    }

    pub fn send_to(&self, charge_station_id: &str, message: String) -> Result<(), TransportError> {
        let conn = self
            .sessions
            .get(charge_station_id)
            .ok_or_else(|| TransportError::NotConnected(charge_station_id.to_string()))?;
        conn.send(message).map_err(|reason| TransportError::SendFailed {
            charge_station_id: charge_station_id.to_string(),
            reason,
        })
    }

    pub fn is_connected(&self, charge_station_id: &str) -> bool {
        self.sessions.contains_key(charge_station_id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn get_version(&self, charge_station_id: &str) -> Option<OcppVersion> {
        self.sessions
            .get(charge_station_id)
            .map(|conn| conn.ocpp_version)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallMaker for SessionRegistry {
    async fn send(
        &self,
        _ctx: &CallContext,
        charge_station_id: &str,
        call: OutboundCall,
    ) -> Result<(), TransportError> {
        let version = self
            .get_version(charge_station_id)
            .ok_or_else(|| TransportError::NotConnected(charge_station_id.to_string()))?;
        if version != call.action.version {
            return Err(TransportError::SendFailed {
                charge_station_id: charge_station_id.to_string(),
                reason: format!("{} call on a {} session", call.action, version),
            });
        }

        let frame = OcppFrame::Call {
            message_id: call.message_id,
            action: call.action.name.to_string(),
            payload: call.payload,
        };
        self.send_to(charge_station_id, frame.serialize())
    }
}

#[async_trait]
impl RuntimeDetailsLookup for SessionRegistry {
    async fn lookup(&self, charge_station_id: &str) -> StoreResult<Option<RuntimeDetails>> {
        Ok(self.sessions.get(charge_station_id).map(|conn| RuntimeDetails {
            charge_station_id: conn.charge_station_id.clone(),
            ocpp_version: conn.ocpp_version.version_string().to_string(),
            connected_at: conn.connected_at,
        }))
    }
}
