// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::crawlers::traits::{Crawler, CrawlerError, CrawlerProvider};
use crate::domain::models::crawl_task::CrawlTask;

/// 模拟爬虫配置
#[derive(Debug, Clone)]
pub struct SimulatedCrawlerConfig {
    /// 处理的站点
    pub site: String,
    /// 最短模拟耗时（毫秒）
    pub min_delay_ms: u64,
    /// 最长模拟耗时（毫秒）
    pub max_delay_ms: u64,
    /// 失败概率 (0.0 - 1.0)
    pub failure_rate: f64,
}

impl Default for SimulatedCrawlerConfig {
    fn default() -> Self {
        Self {
            site: "fake-air".to_string(),
            min_delay_ms: 200,
            max_delay_ms: 2_000,
            failure_rate: 0.0,
        }
    }
}

/// 模拟爬虫
///
/// 等待一段随机时间后按配置的概率失败，成功时只追加日志并保持
/// `Processing` 状态，由执行机器人补全为 `Completed`。
pub struct SimulatedCrawler {
    config: SimulatedCrawlerConfig,
    fares: u32,
}

impl SimulatedCrawler {
    pub fn new(config: SimulatedCrawlerConfig) -> Self {
        Self { config, fares: 0 }
    }

    fn delay(&self) -> Duration {
        let min = self.config.min_delay_ms.min(self.config.max_delay_ms);
        let max = self.config.max_delay_ms.max(min);
        Duration::from_millis(rand::random_range(min..=max))
    }
}

#[async_trait]
impl Crawler for SimulatedCrawler {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn initialize(&mut self, task: &CrawlTask) -> Result<(), CrawlerError> {
        if task.request.site != self.config.site {
            return Err(CrawlerError::Initialization(format!(
                "site {} is not handled by this crawler",
                task.request.site
            )));
        }
        self.fares = rand::random_range(1..=40);
        Ok(())
    }

    async fn start_processing(&mut self, task: &mut CrawlTask) -> Result<(), CrawlerError> {
        tokio::time::sleep(self.delay()).await;

        if rand::random::<f64>() < self.config.failure_rate {
            return Err(CrawlerError::Request(format!(
                "upstream rejected {}",
                task.request.url
            )));
        }

        task.append_log(Utc::now(), format!("Fetched {} fares", self.fares));
        Ok(())
    }
}

/// 模拟爬虫提供者
#[derive(Debug, Clone, Default)]
pub struct SimulatedCrawlerProvider {
    config: SimulatedCrawlerConfig,
}

impl SimulatedCrawlerProvider {
    pub fn new(config: SimulatedCrawlerConfig) -> Self {
        Self { config }
    }
}

impl CrawlerProvider for SimulatedCrawlerProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    fn support_score(&self, task: &CrawlTask) -> u8 {
        if task.request.site == self.config.site {
            10
        } else {
            0
        }
    }

    fn create(&self) -> Box<dyn Crawler> {
        Box::new(SimulatedCrawler::new(self.config.clone()))
    }
}
