//! SeaORM implementation of PendingOperationStore

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::domain::{
    OperationKind, OperationPayload, OperationStatus, PendingOperation, PendingOperationStore,
    StoreError, StoreResult,
};
use crate::infrastructure::database::entities::pending_operation;

const ENTITY: &str = "pending operation";

pub struct SeaOrmPendingOperationStore {
    db: DatabaseConnection,
}

impl SeaOrmPendingOperationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn key_of(kind: OperationKind, charge_station_id: &str) -> String {
    format!("{}/{}", kind, charge_station_id)
}

fn model_to_domain(m: pending_operation::Model) -> StoreResult<PendingOperation> {
    let kind = OperationKind::from_str(&m.kind)
        .ok_or_else(|| StoreError::Backend(format!("Unknown operation kind: {}", m.kind)))?;
    let payload: OperationPayload = serde_json::from_str(&m.payload).map_err(|e| {
        StoreError::Backend(format!(
            "Corrupt payload for {}: {}",
            key_of(kind, &m.charge_station_id),
            e
        ))
    })?;
    Ok(PendingOperation {
        charge_station_id: m.charge_station_id,
        kind,
        request_id: m.request_id,
        status: OperationStatus::from_str(&m.status),
        send_after: m.send_after,
        retry_count: u32::try_from(m.retry_count).unwrap_or(0),
        version: m.version,
        payload,
        created_at: m.created_at,
    })
}

fn domain_to_active(op: PendingOperation, version: i64) -> StoreResult<pending_operation::ActiveModel> {
    let payload = serde_json::to_string(&op.payload)
        .map_err(|e| StoreError::Backend(format!("Failed to encode payload: {}", e)))?;
    Ok(pending_operation::ActiveModel {
        kind: Set(op.kind.as_str().to_string()),
        charge_station_id: Set(op.charge_station_id),
        request_id: Set(op.request_id),
        status: Set(op.status.as_str().to_string()),
        send_after: Set(op.send_after),
        retry_count: Set(i32::try_from(op.retry_count).unwrap_or(i32::MAX)),
        version: Set(version),
        payload: Set(payload),
        created_at: Set(op.created_at),
    })
}

// ── PendingOperationStore impl ──────────────────────────────────

#[async_trait]
impl PendingOperationStore for SeaOrmPendingOperationStore {
    async fn put(&self, op: PendingOperation) -> StoreResult<()> {
        debug!(charge_station_id = %op.charge_station_id, kind = %op.kind, "Saving pending operation");

        let txn = self.db.begin().await?;
        let existing = pending_operation::Entity::find_by_id((
            op.kind.as_str().to_string(),
            op.charge_station_id.clone(),
        ))
        .one(&txn)
        .await?;

        match existing {
            Some(current) => {
                domain_to_active(op, current.version + 1)?.update(&txn).await?;
            }
            None => {
                domain_to_active(op, 1)?.insert(&txn).await?;
            }
        }
        txn.commit().await?;
        Ok(())
    }

    async fn get(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
    ) -> StoreResult<Option<PendingOperation>> {
        pending_operation::Entity::find_by_id((
            kind.as_str().to_string(),
            charge_station_id.to_string(),
        ))
        .one(&self.db)
        .await?
        .map(model_to_domain)
        .transpose()
    }

    async fn reschedule(&self, op: &PendingOperation) -> StoreResult<PendingOperation> {
        let result = pending_operation::Entity::update_many()
            .col_expr(pending_operation::Column::SendAfter, Expr::value(op.send_after))
            .col_expr(
                pending_operation::Column::RetryCount,
                Expr::value(i32::try_from(op.retry_count).unwrap_or(i32::MAX)),
            )
            .col_expr(
                pending_operation::Column::Status,
                Expr::value(op.status.as_str()),
            )
            .col_expr(pending_operation::Column::Version, Expr::value(op.version + 1))
            .filter(pending_operation::Column::Kind.eq(op.kind.as_str()))
            .filter(pending_operation::Column::ChargeStationId.eq(op.charge_station_id.as_str()))
            .filter(pending_operation::Column::Version.eq(op.version))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            let key = key_of(op.kind, &op.charge_station_id);
            return match self.get(op.kind, &op.charge_station_id).await? {
                Some(_) => Err(StoreError::Conflict { entity: ENTITY, key }),
                None => Err(StoreError::NotFound { entity: ENTITY, key }),
            };
        }

        Ok(PendingOperation {
            version: op.version + 1,
            ..op.clone()
        })
    }

    async fn delete(
        &self,
        kind: OperationKind,
        charge_station_id: &str,
        expected_version: Option<i64>,
    ) -> StoreResult<bool> {
        let mut query = pending_operation::Entity::delete_many()
            .filter(pending_operation::Column::Kind.eq(kind.as_str()))
            .filter(pending_operation::Column::ChargeStationId.eq(charge_station_id));
        if let Some(version) = expected_version {
            query = query.filter(pending_operation::Column::Version.eq(version));
        }
        let result = query.exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list(
        &self,
        kind: OperationKind,
        page_size: usize,
        previous_charge_station_id: &str,
    ) -> StoreResult<Vec<PendingOperation>> {
        pending_operation::Entity::find()
            .filter(pending_operation::Column::Kind.eq(kind.as_str()))
            .filter(pending_operation::Column::ChargeStationId.gt(previous_charge_station_id))
            .order_by_asc(pending_operation::Column::ChargeStationId)
            .limit(page_size as u64)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}
