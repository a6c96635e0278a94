// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

use crate::m20250101_000001_create_crawl_tasks::CrawlTasks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_tasks_status")
                    .table(CrawlTasks::Table)
                    .col(CrawlTasks::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_tasks_last_modified")
                    .table(CrawlTasks::Table)
                    .col(CrawlTasks::LastModifiedTime)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_crawl_tasks_last_modified")
                    .table(CrawlTasks::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_crawl_tasks_status")
                    .table(CrawlTasks::Table)
                    .to_owned(),
            )
            .await
    }
}
