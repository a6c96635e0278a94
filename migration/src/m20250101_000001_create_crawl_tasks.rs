// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CrawlTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlTasks::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlTasks::Status).string().not_null())
                    .col(ColumnDef::new(CrawlTasks::Request).json().not_null())
                    .col(
                        ColumnDef::new(CrawlTasks::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CrawlTasks::LastModifiedTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CrawlTasks::FinishTime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CrawlTasks::MaxExecutionTimeMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CrawlTasks::LogEntries).json().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrawlTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum CrawlTasks {
    Table,
    Id,
    Status,
    Request,
    CreateTime,
    LastModifiedTime,
    FinishTime,
    MaxExecutionTimeMs,
    LogEntries,
}
