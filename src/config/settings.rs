// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、Redis、队列、缓存、机器人和调度等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置（持久存储）
    pub database: DatabaseSettings,
    /// Redis配置（快速存储与队列）
    pub redis: RedisSettings,
    /// 队列配置
    pub queue: QueueSettings,
    /// 缓存配置
    pub cache: CacheSettings,
    /// 执行机器人配置
    pub robot: RobotSettings,
    /// 调度配置
    pub dispatch: DispatchSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// Redis配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

/// 队列配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// 基础主题名，高优先级通道在其后追加 `-p0`
    pub base_topic: String,
    /// 最大投递次数，超过后进入死信
    pub max_delivery_count: u32,
    /// 单个接收循环允许的最大并发处理数
    pub max_concurrent_calls: usize,
    /// 通道为空时的轮询间隔（毫秒）
    pub receive_poll_interval_ms: u64,
    /// 消费者心跳过期时间（秒），过期后其处理中的消息被回收
    pub consumer_ttl_secs: u64,
}

/// 缓存配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// 任务键前缀
    pub task_key_prefix: String,
    /// 任务记录过期时间（秒）
    pub task_ttl_secs: u64,
    /// 机器人状态键前缀
    pub status_key_prefix: String,
    /// 机器人状态过期时间（秒）
    pub status_ttl_secs: u64,
}

/// 执行机器人配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RobotSettings {
    /// 普通通道机器人数量
    pub normal_robots: usize,
    /// 高优先级通道机器人数量
    pub high_priority_robots: usize,
    /// 超时后是否中止仍在运行的爬虫
    pub cancel_on_timeout: bool,
    /// 状态上报间隔（秒）
    pub status_report_interval_secs: u64,
}

/// 调度配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// 单批任务数
    pub batch_size: usize,
    /// 高优先级任务占比（百分比）
    pub high_priority_percent: u32,
    /// 分发阶段最大并发数
    pub max_concurrency: usize,
    /// 完成轮询最大次数
    pub poll_max_attempts: u32,
    /// 完成轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 完成轮询的外层超时（毫秒）
    pub poll_timeout_ms: u64,
    /// 生成请求使用的站点
    pub sites: Vec<String>,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 导出监听地址
    pub listen_addr: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从默认值、配置文件和环境变量加载配置
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("CRAWLFARM").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 仅包含默认值的配置
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.url", "sqlite://crawlfarm.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            // Queue lanes
            .set_default("queue.base_topic", "crawl-tasks")?
            .set_default("queue.max_delivery_count", 10)?
            .set_default("queue.max_concurrent_calls", 256)?
            .set_default("queue.receive_poll_interval_ms", 100)?
            .set_default("queue.consumer_ttl_secs", 30)?
            // Fast store
            .set_default("cache.task_key_prefix", "crawl-task")?
            .set_default("cache.task_ttl_secs", 300)?
            .set_default("cache.status_key_prefix", "Telemetry-DaemonStatus")?
            .set_default("cache.status_ttl_secs", 600)?
            // Robots
            .set_default("robot.normal_robots", 2)?
            .set_default("robot.high_priority_robots", 1)?
            .set_default("robot.cancel_on_timeout", false)?
            .set_default("robot.status_report_interval_secs", 10)?
            // Dispatch
            .set_default("dispatch.batch_size", 100)?
            .set_default("dispatch.high_priority_percent", 20)?
            .set_default("dispatch.max_concurrency", 20)?
            .set_default("dispatch.poll_max_attempts", 120)?
            .set_default("dispatch.poll_interval_ms", 1000)?
            .set_default("dispatch.poll_timeout_ms", 120_000)?
            .set_default("dispatch.sites", vec!["fake-air"])?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
