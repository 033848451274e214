//! Charge station lookup and status interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::RuntimeDetails;
use crate::domain::StoreResult;

/// Read-only lookup of a station's negotiated session details.
#[async_trait]
pub trait RuntimeDetailsLookup: Send + Sync {
    async fn lookup(&self, charge_station_id: &str) -> StoreResult<Option<RuntimeDetails>>;
}

#[async_trait]
pub trait ChargeStationStatusStore: Send + Sync {
    /// Record the time of the latest heartbeat
    async fn set_heartbeat(&self, charge_station_id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    async fn last_heartbeat(&self, charge_station_id: &str) -> StoreResult<Option<DateTime<Utc>>>;
}
