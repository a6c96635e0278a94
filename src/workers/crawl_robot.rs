// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::RobotSettings;
use crate::crawlers::{Crawler, CrawlerRegistry};
use crate::domain::models::crawl_task::{CrawlTask, TaskStatus, NO_CRAWLER_APPLICABLE};
use crate::domain::models::robot_status::RobotStatus;
use crate::domain::repositories::keyed_store::KeyedStore;
use crate::queue::channel::{HandlerOutcome, MessageHandler, QueueChannel};
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;

/// 执行机器人参数
#[derive(Debug, Clone)]
pub struct RobotOptions {
    /// 超时后是否中止仍在运行的爬虫
    pub cancel_on_timeout: bool,
    /// 状态上报间隔
    pub status_report_interval: Duration,
}

impl RobotOptions {
    pub fn from_settings(settings: &RobotSettings) -> Self {
        Self {
            cancel_on_timeout: settings.cancel_on_timeout,
            status_report_interval: Duration::from_secs(settings.status_report_interval_secs.max(1)),
        }
    }
}

impl Default for RobotOptions {
    fn default() -> Self {
        Self {
            cancel_on_timeout: false,
            status_report_interval: Duration::from_secs(10),
        }
    }
}

/// 执行机器人使用的存储
#[derive(Clone)]
pub struct RobotStores {
    /// 快速存储，每次状态转换都写入
    pub fast: Arc<dyn KeyedStore<CrawlTask>>,
    /// 持久存储，仅在终态写入
    pub durable: Arc<dyn KeyedStore<CrawlTask>>,
    /// 机器人状态上报
    pub status: Arc<dyn KeyedStore<RobotStatus>>,
}

/// 单次投递的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 任务到达终态
    Finished(TaskStatus),
    /// 没有可用爬虫，投递需要重新排队
    NoCrawler,
    /// 任务已在别处完成，跳过
    Duplicate,
}

impl ProcessOutcome {
    /// 转换为通道确认结果
    pub fn handler_outcome(self) -> HandlerOutcome {
        match self {
            ProcessOutcome::NoCrawler => HandlerOutcome::Abandon,
            ProcessOutcome::Finished(_) | ProcessOutcome::Duplicate => HandlerOutcome::Ack,
        }
    }
}

/// 爬取执行机器人
///
/// 订阅一条通道，把每次投递交给匹配的爬虫执行，并与任务的执行预算赛跑。
/// 超时后爬虫默认继续在后台运行，任务被标记为 `TimedOut`。
pub struct CrawlRobot {
    name: String,
    channel: Arc<dyn QueueChannel>,
    stores: RobotStores,
    registry: Arc<CrawlerRegistry>,
    options: RobotOptions,
    received: AtomicU64,
    in_flight: AtomicU64,
    status: parking_lot::RwLock<RobotStatus>,
    reporter: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// 离开作用域时减少在途计数
struct InFlightGuard<'a> {
    robot: &'a CrawlRobot,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.robot.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.robot.refresh_status();
    }
}

impl CrawlRobot {
    /// 创建新的执行机器人
    ///
    /// # 参数
    ///
    /// * `channel` - 订阅的通道
    /// * `stores` - 快速、持久和状态存储
    /// * `registry` - 爬虫注册表
    /// * `options` - 机器人参数
    ///
    /// # 返回值
    ///
    /// 返回新的执行机器人实例
    pub fn new(
        channel: Arc<dyn QueueChannel>,
        stores: RobotStores,
        registry: Arc<CrawlerRegistry>,
        options: RobotOptions,
    ) -> Self {
        let name = format!("CrawlRobot | {}", channel.topic_name());
        let status = RobotStatus::new(Uuid::new_v4(), name.clone());
        Self {
            name,
            channel,
            stores,
            registry,
            options,
            received: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            status: parking_lot::RwLock::new(status),
            reporter: parking_lot::Mutex::new(None),
        }
    }

    /// 当前状态快照
    pub fn status(&self) -> RobotStatus {
        self.status.read().clone()
    }

    fn refresh_status(&self) {
        let in_flight = self.in_flight.load(Ordering::SeqCst);
        {
            let mut status = self.status.write();
            status.task_received_count = self.received.load(Ordering::SeqCst);
            status.concurrent_job_count = in_flight;
            status.last_reported_time = Utc::now();
        }
        gauge!("crawl_robot_in_flight", "robot" => self.name.clone()).set(in_flight as f64);
    }

    async fn publish_status(&self) {
        self.refresh_status();
        let snapshot = self.status();
        if let Err(e) = self.stores.status.create(&snapshot).await {
            warn!(robot = %self.name, "Failed to publish robot status: {}", e);
        }
    }

    /// 处理一次投递
    ///
    /// 不会返回错误：存储错误被记录后继续，爬虫错误记录在任务日志中。
    ///
    /// # 参数
    ///
    /// * `task` - 投递的任务
    ///
    /// # 返回值
    ///
    /// 返回处理结果，调用方据此确认或放弃投递
    #[instrument(skip(self, task), fields(robot = %self.name, task_id = %task.id))]
    pub async fn process_task(&self, mut task: CrawlTask) -> ProcessOutcome {
        if self.is_already_finished(&task.id).await {
            debug!("Task already finished, skipping duplicate delivery");
            return ProcessOutcome::Duplicate;
        }

        self.received.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = InFlightGuard { robot: self };
        self.refresh_status();
        counter!("crawl_tasks_received_total", "lane" => self.channel.topic_name().to_string())
            .increment(1);

        let started = Instant::now();
        task.status = TaskStatus::Processing;
        task.touch(Utc::now());
        if let Err(e) = self.stores.fast.update(&task.id, &task).await {
            warn!("Failed to mark task as processing: {}", e);
        }

        let budget = task.resolve_max_execution_time();
        let outcome = match self.registry.resolve(&task) {
            Some(crawler) => self.execute(crawler, &mut task, budget).await,
            None => {
                let now = Utc::now();
                task.status = TaskStatus::Failed;
                task.finish_time = Some(now);
                task.touch(now);
                task.append_log(now, NO_CRAWLER_APPLICABLE);
                warn!(site = %task.request.site, "{}", NO_CRAWLER_APPLICABLE);
                ProcessOutcome::NoCrawler
            }
        };
        drop(in_flight);

        histogram!("crawl_task_duration_seconds").record(started.elapsed().as_secs_f64());
        counter!("crawl_tasks_finished_total", "status" => task.status.to_string()).increment(1);
        info!(status = %task.status, "Task processed");

        self.persist(&task).await;
        outcome
    }

    async fn is_already_finished(&self, id: &str) -> bool {
        match self.stores.fast.read(id).await {
            Ok(Some(stored)) => stored.status.is_terminal() && !stored.is_awaiting_crawler(),
            Ok(None) => false,
            Err(e) => {
                warn!(task_id = %id, "Failed to read task before processing: {}", e);
                false
            }
        }
    }

    async fn execute(
        &self,
        mut crawler: Box<dyn Crawler>,
        task: &mut CrawlTask,
        budget: Duration,
    ) -> ProcessOutcome {
        let mut working = task.clone();
        let known_entries = working.log_entries.len();
        let crawler_name = crawler.name().to_string();

        let mut execution = tokio::spawn(async move {
            let result = match crawler.initialize(&working).await {
                Ok(()) => crawler.start_processing(&mut working).await,
                Err(e) => Err(e),
            };
            (working, result)
        });

        match tokio::time::timeout(budget, &mut execution).await {
            Ok(Ok((working, result))) => {
                let now = Utc::now();
                task.finish_time = Some(now);
                task.touch(now);
                let reported = working.status;
                task.log_entries
                    .extend(working.log_entries.into_iter().skip(known_entries));
                match result {
                    Ok(()) => {
                        task.status = if reported.is_terminal() {
                            reported
                        } else {
                            TaskStatus::Completed
                        };
                    }
                    Err(e) => {
                        task.status = TaskStatus::Failed;
                        task.append_log(now, error_chain(&e));
                        warn!(crawler = %crawler_name, "Crawler failed: {}", e);
                    }
                }
            }
            Ok(Err(e)) => {
                let now = Utc::now();
                task.status = TaskStatus::Failed;
                task.finish_time = Some(now);
                task.touch(now);
                task.append_log(now, format!("Crawler {} did not finish: {}", crawler_name, e));
                error!(crawler = %crawler_name, "Crawler execution aborted: {}", e);
            }
            Err(_) => {
                task.status = TaskStatus::TimedOut;
                task.touch(Utc::now());
                if self.options.cancel_on_timeout {
                    execution.abort();
                }
                warn!(
                    crawler = %crawler_name,
                    budget_ms = task.max_execution_time_ms,
                    cancelled = self.options.cancel_on_timeout,
                    "Task reached its execution budget"
                );
            }
        }

        ProcessOutcome::Finished(task.status)
    }

    async fn persist(&self, task: &CrawlTask) {
        if let Err(e) = self.stores.fast.update(&task.id, task).await {
            warn!("Failed to write task to fast store: {}", e);
        }
        if let Err(e) = self.stores.durable.update(&task.id, task).await {
            error!("Failed to write task to durable store: {}", e);
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(", ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl MessageHandler for CrawlRobot {
    async fn handle(&self, task: CrawlTask) -> HandlerOutcome {
        let task_id = task.id.clone();
        match AssertUnwindSafe(self.process_task(task)).catch_unwind().await {
            Ok(outcome) => outcome.handler_outcome(),
            Err(_) => {
                error!(robot = %self.name, task_id = %task_id, "Task processing panicked");
                HandlerOutcome::Ack
            }
        }
    }
}

#[async_trait]
impl Worker for CrawlRobot {
    async fn start(self: Arc<Self>) -> Result<(), WorkerError> {
        self.status.write().start_time = Some(Utc::now());
        self.publish_status().await;

        self.channel
            .start_receiving(self.clone() as Arc<dyn MessageHandler>)
            .await?;

        let robot: Weak<Self> = Arc::downgrade(&self);
        let interval = self.options.status_report_interval;
        let reporter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(robot) = robot.upgrade() else {
                    break;
                };
                robot.publish_status().await;
            }
        });
        *self.reporter.lock() = Some(reporter);

        info!(robot = %self.name, "Robot started");
        Ok(())
    }

    async fn stop(&self) {
        self.channel.stop().await;
        let reporter = self.reporter.lock().take();
        if let Some(reporter) = reporter {
            reporter.abort();
        }
        self.publish_status().await;
        info!(robot = %self.name, "Robot stopped");
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "crawl_robot_test.rs"]
mod tests;
