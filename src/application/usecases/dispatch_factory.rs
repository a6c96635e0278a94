// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use metrics::counter;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::usecases::completion_poller::CompletionPoller;
use crate::config::settings::DispatchSettings;
use crate::domain::models::crawl_task::{CrawlRequest, CrawlTask, TaskStatus};
use crate::domain::repositories::keyed_store::KeyedStore;
use crate::domain::services::request_source::RequestSource;
use crate::queue::channel::QueueChannel;

/// 进度回调，接收可读的进度消息
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// 任务所在的通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// 普通通道
    Normal,
    /// 高优先级通道
    HighPriority,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Normal => "normal",
            Lane::HighPriority => "high_priority",
        }
    }
}

/// 单个任务的完成跟踪结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionResult {
    /// 在轮询预算内完成
    Completed,
    /// 轮询次数耗尽仍未完成
    NotCompleted,
    /// 到达外层超时
    TimedOut,
}

/// 调度参数
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// 高优先级任务占比（百分比）
    pub high_priority_percent: u32,
    /// 分发阶段最大并发数
    pub max_concurrency: usize,
    /// 完成轮询最大次数
    pub poll_max_attempts: u32,
    /// 完成轮询间隔
    pub poll_interval: Duration,
    /// 完成轮询外层超时
    pub poll_timeout: Duration,
}

impl DispatchOptions {
    pub fn from_settings(settings: &DispatchSettings) -> Self {
        Self {
            high_priority_percent: settings.high_priority_percent,
            max_concurrency: settings.max_concurrency,
            poll_max_attempts: settings.poll_max_attempts,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            poll_timeout: Duration::from_millis(settings.poll_timeout_ms),
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            high_priority_percent: 20,
            max_concurrency: 20,
            poll_max_attempts: 120,
            poll_interval: Duration::from_millis(1000),
            poll_timeout: Duration::from_millis(120_000),
        }
    }
}

/// 一批调度的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 计划发送的任务数
    pub planned: usize,
    /// 普通通道发送成功数
    pub sent_normal: usize,
    /// 高优先级通道发送成功数
    pub sent_high_priority: usize,
    /// 创建或发送失败数
    pub send_failures: usize,
    /// 已完成数
    pub completed: usize,
    /// 轮询耗尽未完成数
    pub not_completed: usize,
    /// 到达外层超时数
    pub timed_out: usize,
    /// 整批耗时
    pub elapsed: Duration,
}

/// 按高优先级占比拆分批次，向下取整
///
/// # 返回值
///
/// 返回 `(普通任务数, 高优先级任务数)`
pub fn split_batch(total: usize, high_priority_percent: u32) -> (usize, usize) {
    let percent = high_priority_percent.min(100) as usize;
    (total * (100 - percent) / 100, total * percent / 100)
}

/// 调度工厂
///
/// 生成一批请求，打乱后分发到两条通道，并跟踪每个已发送任务直到完成
pub struct DispatchFactory {
    source: Arc<dyn RequestSource>,
    store: Arc<dyn KeyedStore<CrawlTask>>,
    normal: Arc<dyn QueueChannel>,
    high_priority: Arc<dyn QueueChannel>,
    poller: Arc<CompletionPoller>,
    options: DispatchOptions,
}

impl DispatchFactory {
    /// 创建调度工厂
    ///
    /// # 参数
    ///
    /// * `source` - 请求来源
    /// * `store` - 快速存储，轮询也从这里读取
    /// * `normal` - 普通通道
    /// * `high_priority` - 高优先级通道
    /// * `options` - 调度参数
    pub fn new(
        source: Arc<dyn RequestSource>,
        store: Arc<dyn KeyedStore<CrawlTask>>,
        normal: Arc<dyn QueueChannel>,
        high_priority: Arc<dyn QueueChannel>,
        options: DispatchOptions,
    ) -> Self {
        let poller = Arc::new(CompletionPoller::new(store.clone()));
        Self {
            source,
            store,
            normal,
            high_priority,
            poller,
            options,
        }
    }

    /// 分发一批任务并等待全部跟踪结束
    ///
    /// # 参数
    ///
    /// * `total` - 本批任务总数
    /// * `on_update` - 进度回调
    ///
    /// # 返回值
    ///
    /// 返回本批的发送与完成统计
    pub async fn dispatch_batch(&self, total: usize, on_update: ProgressCallback) -> DispatchReport {
        let started = Instant::now();
        let (normal_count, high_count) = split_batch(total, self.options.high_priority_percent);

        let mut plan: Vec<(CrawlRequest, Lane)> = self
            .source
            .generate(normal_count)
            .into_iter()
            .map(|request| (request, Lane::Normal))
            .chain(
                self.source
                    .generate(high_count)
                    .into_iter()
                    .map(|request| (request, Lane::HighPriority)),
            )
            .collect();
        plan.shuffle(&mut rand::rng());

        info!(
            total = plan.len(),
            normal = normal_count,
            high_priority = high_count,
            "Dispatching batch"
        );
        let mut report = DispatchReport {
            planned: plan.len(),
            ..Default::default()
        };

        let sent: Vec<Option<(Lane, JoinHandle<CompletionResult>)>> = stream::iter(plan)
            .map(|(request, lane)| self.send_one(request, lane, &on_update))
            .buffer_unordered(self.options.max_concurrency.max(1))
            .collect()
            .await;

        let mut trackers = Vec::with_capacity(sent.len());
        for entry in sent {
            match entry {
                Some((Lane::Normal, tracker)) => {
                    report.sent_normal += 1;
                    trackers.push(tracker);
                }
                Some((Lane::HighPriority, tracker)) => {
                    report.sent_high_priority += 1;
                    trackers.push(tracker);
                }
                None => report.send_failures += 1,
            }
        }

        for result in join_all(trackers).await {
            match result {
                Ok(CompletionResult::Completed) => report.completed += 1,
                Ok(CompletionResult::NotCompleted) => report.not_completed += 1,
                Ok(CompletionResult::TimedOut) => report.timed_out += 1,
                Err(e) => {
                    error!("Completion tracker did not finish: {}", e);
                    report.not_completed += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        on_update(format!("End in {} seconds", report.elapsed.as_secs()));
        report
    }

    async fn send_one(
        &self,
        request: CrawlRequest,
        lane: Lane,
        on_update: &ProgressCallback,
    ) -> Option<(Lane, JoinHandle<CompletionResult>)> {
        let started = Instant::now();
        let mut task = CrawlTask::new(request);

        if let Err(e) = self.store.create(&task).await {
            error!(task_id = %task.id, "Failed to create task in fast store: {}", e);
            return None;
        }

        let channel = match lane {
            Lane::Normal => &self.normal,
            Lane::HighPriority => &self.high_priority,
        };
        match channel.send(&task).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(task_id = %task.id, lane = channel.topic_name(), "Channel refused task");
                return None;
            }
            Err(e) => {
                error!(task_id = %task.id, lane = channel.topic_name(), "Failed to send task: {}", e);
                return None;
            }
        }
        counter!("dispatch_tasks_sent_total", "lane" => lane.as_str()).increment(1);

        self.mark_queueing(&mut task).await;
        on_update(format!("done sending out task message {}", task.id));

        let tracker = tokio::spawn(track_completion(
            self.poller.clone(),
            task.id,
            self.options.clone(),
            started,
            on_update.clone(),
        ));
        Some((lane, tracker))
    }

    async fn mark_queueing(&self, task: &mut CrawlTask) {
        if let Err(e) = task.transition_to(TaskStatus::Queueing, Utc::now()) {
            warn!(task_id = %task.id, "{}", e);
            return;
        }

        // a fast robot may already have moved the stored record past New
        let expected = TaskStatus::New.to_string();
        match self.store.update_if_status(&task.id, &expected, &*task).await {
            Ok(true) => {}
            Ok(false) => debug!(task_id = %task.id, "Task already picked up, keeping stored status"),
            Err(e) => warn!(task_id = %task.id, "Failed to mark task as queueing: {}", e),
        }
    }
}

async fn track_completion(
    poller: Arc<CompletionPoller>,
    id: String,
    options: DispatchOptions,
    started: Instant,
    on_update: ProgressCallback,
) -> CompletionResult {
    let poll = poller.poll_until_complete(&id, options.poll_max_attempts, options.poll_interval);

    match tokio::time::timeout(options.poll_timeout, poll).await {
        Ok(Some(_)) => {
            on_update(format!(
                "Task {} completed in {:.2}",
                id,
                started.elapsed().as_secs_f64()
            ));
            CompletionResult::Completed
        }
        Ok(None) => {
            on_update(format!(
                "Task {} not completed after {} polling attempts",
                id, options.poll_max_attempts
            ));
            CompletionResult::NotCompleted
        }
        Err(_) => {
            on_update(format!(
                "Task {} reached max timeout of {}ms. ",
                id,
                options.poll_timeout.as_millis()
            ));
            CompletionResult::TimedOut
        }
    }
}
