// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::crawl_task::{CrawlTask, TaskStatus};
use crate::domain::models::robot_status::RobotStatus;
use crate::domain::repositories::keyed_store::{KeyedStore, StoreError};

/// 遥测查询服务
///
/// 读取机器人上报的状态以及快速存储中的任务状态分布
pub struct TelemetryService {
    statuses: Arc<dyn KeyedStore<RobotStatus>>,
    tasks: Arc<dyn KeyedStore<CrawlTask>>,
}

impl TelemetryService {
    pub fn new(
        statuses: Arc<dyn KeyedStore<RobotStatus>>,
        tasks: Arc<dyn KeyedStore<CrawlTask>>,
    ) -> Self {
        Self { statuses, tasks }
    }

    /// 所有已上报的机器人状态，按名称排序
    pub async fn robot_statuses(&self) -> Result<Vec<RobotStatus>, StoreError> {
        let mut statuses = self.statuses.get_all().await?;
        statuses.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(statuses)
    }

    /// 快速存储中各状态的任务数
    pub async fn task_status_counts(&self) -> Result<HashMap<TaskStatus, usize>, StoreError> {
        let mut counts = HashMap::new();
        for task in self.tasks.get_all().await? {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
