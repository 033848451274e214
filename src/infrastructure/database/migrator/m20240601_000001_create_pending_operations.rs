//! Create pending_operations table
//!
//! One row per (kind, charge station): deferred GetDiagnostics / GetLog
//! requests waiting for the sync loops.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PendingOperations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PendingOperations::Kind).string().not_null())
                    .col(
                        ColumnDef::new(PendingOperations::ChargeStationId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingOperations::RequestId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingOperations::Status)
                            .string()
                            .not_null()
                            .default("Pending"),
                    )
                    .col(
                        ColumnDef::new(PendingOperations::SendAfter)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingOperations::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PendingOperations::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(PendingOperations::Payload).text().not_null())
                    .col(
                        ColumnDef::new(PendingOperations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PendingOperations::Kind)
                            .col(PendingOperations::ChargeStationId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_operations_send_after")
                    .table(PendingOperations::Table)
                    .col(PendingOperations::SendAfter)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PendingOperations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PendingOperations {
    Table,
    Kind,
    ChargeStationId,
    RequestId,
    Status,
    SendAfter,
    RetryCount,
    Version,
    Payload,
    CreatedAt,
}
