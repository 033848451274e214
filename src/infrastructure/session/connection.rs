//! One live WebSocket connection to a charge station

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::domain::OcppVersion;

#[derive(Debug)]
pub struct Connection {
    /// Distinguishes a reconnect from the session it replaced
    pub connection_id: u64,
    pub charge_station_id: String,
    /// Outbound text frames, drained by the connection's writer task
    pub sender: mpsc::UnboundedSender<String>,
    pub ocpp_version: OcppVersion,
    pub connected_at: DateTime<Utc>,
}

/// Session replaced by a newer connection from the same station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictedSession {
    pub connection_id: u64,
    pub connected_at: DateTime<Utc>,
}

impl EvictedSession {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.connected_at
    }
}

impl Connection {
    pub fn new(
        connection_id: u64,
        charge_station_id: impl Into<String>,
        sender: mpsc::UnboundedSender<String>,
        ocpp_version: OcppVersion,
    ) -> Self {
        Self {
            connection_id,
            charge_station_id: charge_station_id.into(),
            sender,
            ocpp_version,
            connected_at: Utc::now(),
        }
    }

    pub fn send(&self, message: String) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|e| format!("connection closed: {}", e))
    }

    pub fn evicted(&self) -> EvictedSession {
        EvictedSession {
            connection_id: self.connection_id,
            connected_at: self.connected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_to_closed_channel_returns_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(1, "CS001", tx, OcppVersion::V16);
        drop(rx);
        assert!(conn.send("msg".into()).is_err());
    }

    #[test]
    fn evicted_session_reports_its_age() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut conn = Connection::new(7, "CS001", tx, OcppVersion::V201);
        conn.connected_at = Utc::now() - chrono::Duration::seconds(90);

        let evicted = conn.evicted();
        assert_eq!(evicted.connection_id, 7);
        assert_eq!(
            evicted.age(conn.connected_at + chrono::Duration::seconds(90)),
            chrono::Duration::seconds(90)
        );
    }
}
