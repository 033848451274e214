//! Pending operation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_operations")]
pub struct Model {
    /// DiagnosticsRetrieval, LogRetrieval
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub charge_station_id: String,

    pub request_id: i32,

    /// Pending, SentAwaitingCompletion, Done
    pub status: String,

    pub send_after: DateTimeUtc,
    pub retry_count: i32,

    /// Optimistic concurrency token
    pub version: i64,

    /// JSON-encoded `OperationPayload`
    pub payload: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
