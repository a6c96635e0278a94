// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::crawl_task::CrawlTask;

/// 爬虫错误类型
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// 初始化失败
    #[error("Initialization failed: {0}")]
    Initialization(String),
    /// 上游请求失败
    #[error("Request failed: {0}")]
    Request(String),
    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 爬虫特质
///
/// 每个任务创建一个独立实例。爬虫可以自行设置任务状态，
/// 若返回时任务仍为 `Processing`，执行机器人会将其视为完成。
#[async_trait]
pub trait Crawler: Send {
    /// 爬虫名称
    fn name(&self) -> &str;

    /// 绑定任务并准备执行
    async fn initialize(&mut self, task: &CrawlTask) -> Result<(), CrawlerError>;

    /// 执行爬取
    ///
    /// # 参数
    ///
    /// * `task` - 正在执行的任务，爬虫可追加日志或修改状态
    async fn start_processing(&mut self, task: &mut CrawlTask) -> Result<(), CrawlerError>;
}

/// 爬虫提供者
///
/// 为可处理的任务创建爬虫实例
pub trait CrawlerProvider: Send + Sync {
    /// 提供者名称
    fn name(&self) -> &str;

    /// 对任务的支持程度，0 表示不支持
    fn support_score(&self, task: &CrawlTask) -> u8;

    /// 创建新的爬虫实例
    fn create(&self) -> Box<dyn Crawler>;
}
