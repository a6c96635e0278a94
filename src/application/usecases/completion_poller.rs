// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::models::crawl_task::{CrawlTask, TaskStatus};
use crate::domain::repositories::keyed_store::KeyedStore;

/// 完成轮询器
///
/// 反复读取快速存储，直到任务完成或轮询次数耗尽
pub struct CompletionPoller {
    store: Arc<dyn KeyedStore<CrawlTask>>,
}

impl CompletionPoller {
    pub fn new(store: Arc<dyn KeyedStore<CrawlTask>>) -> Self {
        Self { store }
    }

    /// 轮询任务直到完成
    ///
    /// 只有 `Completed` 视为完成。读取错误会被忽略，
    /// 但仍消耗一次轮询并照常等待。
    ///
    /// # 参数
    ///
    /// * `id` - 任务ID
    /// * `max_attempts` - 最大读取次数
    /// * `interval` - 两次读取之间的等待时间
    ///
    /// # 返回值
    ///
    /// * `Some(CrawlTask)` - 已完成的任务
    /// * `None` - 轮询次数耗尽
    pub async fn poll_until_complete(
        &self,
        id: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Option<CrawlTask> {
        for attempt in 1..=max_attempts {
            match self.store.read(id).await {
                Ok(Some(task)) if task.status == TaskStatus::Completed => return Some(task),
                Ok(_) => {}
                Err(e) => debug!(task_id = %id, attempt, "Polling read failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
        None
    }
}
