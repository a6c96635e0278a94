// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tracing::debug;

use crate::crawlers::traits::{Crawler, CrawlerProvider};
use crate::domain::models::crawl_task::CrawlTask;

/// 爬虫注册表
///
/// 根据支持分数为任务选择爬虫
#[derive(Clone, Default)]
pub struct CrawlerRegistry {
    providers: Vec<Arc<dyn CrawlerProvider>>,
}

impl CrawlerRegistry {
    /// 创建新的爬虫注册表
    ///
    /// # 参数
    ///
    /// * `providers` - 爬虫提供者列表
    pub fn new(providers: Vec<Arc<dyn CrawlerProvider>>) -> Self {
        Self { providers }
    }

    /// 为任务解析爬虫
    ///
    /// # 返回值
    ///
    /// * `Some(Box<dyn Crawler>)` - 支持分数最高的提供者创建的爬虫
    /// * `None` - 没有提供者支持该任务
    pub fn resolve(&self, task: &CrawlTask) -> Option<Box<dyn Crawler>> {
        let (provider, score) = self
            .providers
            .iter()
            .map(|p| (p, p.support_score(task)))
            .filter(|(_, score)| *score > 0)
            .max_by_key(|(_, score)| *score)?;

        debug!(
            provider = provider.name(),
            score,
            site = %task.request.site,
            "Selected crawler"
        );
        Some(provider.create())
    }
}
