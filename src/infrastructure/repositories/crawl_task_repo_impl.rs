// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::warn;

use crate::domain::models::crawl_task::{CrawlRequest, CrawlTask, TaskStatus};
use crate::domain::repositories::keyed_store::{KeyedStore, StoreError};
use crate::infrastructure::database::entities::crawl_task as crawl_task_entity;

/// 爬取任务持久存储
///
/// 基于SeaORM实现，`update` 为插入或更新，
/// 持久记录由终态写入创建。
#[derive(Clone)]
pub struct SeaOrmTaskStore {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SeaOrmTaskStore {
    /// 创建新的持久存储实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<crawl_task_entity::Model> for CrawlTask {
    type Error = StoreError;

    fn try_from(model: crawl_task_entity::Model) -> Result<Self, Self::Error> {
        let request: CrawlRequest = serde_json::from_value(model.request)?;
        let log_entries: Vec<String> = serde_json::from_value(model.log_entries)?;
        let status = model.status.parse().unwrap_or_else(|_| {
            warn!(id = %model.id, status = %model.status, "Unknown status in durable store");
            TaskStatus::default()
        });

        Ok(Self {
            id: model.id,
            request,
            status,
            create_time: model.create_time.with_timezone(&Utc),
            last_modified_time: model.last_modified_time.with_timezone(&Utc),
            finish_time: model.finish_time.map(|t| t.with_timezone(&Utc)),
            max_execution_time_ms: u64::try_from(model.max_execution_time_ms).unwrap_or(0),
            log_entries,
        })
    }
}

impl TryFrom<&CrawlTask> for crawl_task_entity::ActiveModel {
    type Error = StoreError;

    fn try_from(task: &CrawlTask) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Set(task.id.clone()),
            status: Set(task.status.to_string()),
            request: Set(serde_json::to_value(&task.request)?),
            create_time: Set(task.create_time.into()),
            last_modified_time: Set(task.last_modified_time.into()),
            finish_time: Set(task.finish_time.map(Into::into)),
            max_execution_time_ms: Set(i64::try_from(task.max_execution_time_ms).unwrap_or(i64::MAX)),
            log_entries: Set(serde_json::to_value(&task.log_entries)?),
        })
    }
}

#[async_trait]
impl KeyedStore<CrawlTask> for SeaOrmTaskStore {
    async fn create(&self, task: &CrawlTask) -> Result<(), StoreError> {
        let model = crawl_task_entity::ActiveModel::try_from(task)?;
        crawl_task_entity::Entity::insert(model)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<CrawlTask>, StoreError> {
        crawl_task_entity::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await?
            .map(CrawlTask::try_from)
            .transpose()
    }

    async fn update(&self, id: &str, task: &CrawlTask) -> Result<(), StoreError> {
        let mut model = crawl_task_entity::ActiveModel::try_from(task)?;
        model.id = Set(id.to_string());

        crawl_task_entity::Entity::insert(model)
            .on_conflict(
                OnConflict::column(crawl_task_entity::Column::Id)
                    .update_columns([
                        crawl_task_entity::Column::Status,
                        crawl_task_entity::Column::Request,
                        crawl_task_entity::Column::LastModifiedTime,
                        crawl_task_entity::Column::FinishTime,
                        crawl_task_entity::Column::MaxExecutionTimeMs,
                        crawl_task_entity::Column::LogEntries,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected_status: &str,
        task: &CrawlTask,
    ) -> Result<bool, StoreError> {
        let mut model = crawl_task_entity::ActiveModel::try_from(task)?;
        model.id = Set(id.to_string());

        let result = crawl_task_entity::Entity::update_many()
            .set(model)
            .filter(crawl_task_entity::Column::Id.eq(id))
            .filter(crawl_task_entity::Column::Status.eq(expected_status))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected > 0 {
            return Ok(true);
        }

        match crawl_task_entity::Entity::find_by_id(id.to_string())
            .one(self.db.as_ref())
            .await?
        {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn get_all(&self) -> Result<Vec<CrawlTask>, StoreError> {
        crawl_task_entity::Entity::find()
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(CrawlTask::try_from)
            .collect()
    }
}
