// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::config::settings::QueueSettings;
use crate::domain::models::crawl_task::CrawlTask;

/// 高优先级通道的名称后缀
pub const HIGH_PRIORITY_SUFFIX: &str = "-p0";

/// 通道错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    /// 后端错误
    #[error("Backend error: {0}")]
    Backend(String),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 已在接收
    #[error("Channel {0} is already receiving")]
    AlreadyReceiving(String),
}

impl From<anyhow::Error> for ChannelError {
    fn from(err: anyhow::Error) -> Self {
        ChannelError::Backend(err.to_string())
    }
}

/// 消息处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 确认，消息从通道移除
    Ack,
    /// 放弃，消息稍后重新投递
    Abandon,
}

/// 消息处理器特质
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// 处理一次投递
    async fn handle(&self, task: CrawlTask) -> HandlerOutcome;
}

/// 队列通道特质
///
/// 至少一次投递：被放弃的消息会重新投递，
/// 直到达到最大投递次数后进入死信。
#[async_trait]
pub trait QueueChannel: Send + Sync {
    /// 通道名
    fn topic_name(&self) -> &str;

    /// 发送任务
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 任务已入队
    /// * `Ok(false)` - 通道不再接受消息
    /// * `Err(ChannelError)` - 传输错误
    async fn send(&self, task: &CrawlTask) -> Result<bool, ChannelError>;

    /// 启动后台接收循环
    ///
    /// 每次投递都在独立的任务中交给 `handler`，接收循环不等待处理完成。
    async fn start_receiving(&self, handler: Arc<dyn MessageHandler>) -> Result<(), ChannelError>;

    /// 停止接收，并等待在途的处理完成确认或放弃
    async fn stop(&self);
}

#[async_trait]
impl<T: QueueChannel + ?Sized> QueueChannel for Arc<T> {
    fn topic_name(&self) -> &str {
        (**self).topic_name()
    }

    async fn send(&self, task: &CrawlTask) -> Result<bool, ChannelError> {
        (**self).send(task).await
    }

    async fn start_receiving(&self, handler: Arc<dyn MessageHandler>) -> Result<(), ChannelError> {
        (**self).start_receiving(handler).await
    }

    async fn stop(&self) {
        (**self).stop().await
    }
}

/// 根据基础主题和优先级得到通道名
pub fn lane_name(base_topic: &str, high_priority: bool) -> String {
    if high_priority {
        format!("{}{}", base_topic, HIGH_PRIORITY_SUFFIX)
    } else {
        base_topic.to_string()
    }
}

/// 单个通道的参数
#[derive(Debug, Clone)]
pub struct QueueProfile {
    /// 通道名
    pub lane: String,
    /// 是否为高优先级通道
    pub high_priority: bool,
    /// 最大投递次数
    pub max_delivery_count: u32,
    /// 最大并发处理数
    pub max_concurrent_calls: usize,
    /// 空通道轮询间隔
    pub poll_interval: Duration,
    /// 消费者心跳过期时间
    pub consumer_ttl: Duration,
}

impl QueueProfile {
    /// 从队列配置创建通道参数
    ///
    /// # 参数
    ///
    /// * `settings` - 队列配置
    /// * `high_priority` - 是否为高优先级通道
    pub fn from_settings(settings: &QueueSettings, high_priority: bool) -> Self {
        Self {
            lane: lane_name(&settings.base_topic, high_priority),
            high_priority,
            max_delivery_count: settings.max_delivery_count.max(1),
            max_concurrent_calls: settings.max_concurrent_calls.max(1),
            poll_interval: Duration::from_millis(settings.receive_poll_interval_ms),
            consumer_ttl: Duration::from_secs(settings.consumer_ttl_secs.max(1)),
        }
    }
}

/// 在独立任务中执行处理器
///
/// 处理器崩溃视为放弃，消息会被重新投递。
pub(crate) async fn run_handler(handler: Arc<dyn MessageHandler>, task: CrawlTask) -> HandlerOutcome {
    let task_id = task.id.clone();
    match tokio::spawn(async move { handler.handle(task).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(task_id = %task_id, "Message handler did not finish: {}", e);
            HandlerOutcome::Abandon
        }
    }
}
