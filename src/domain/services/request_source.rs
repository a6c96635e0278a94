// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{Duration, Utc};

use crate::domain::models::crawl_task::CrawlRequest;

/// 爬取请求来源
///
/// 调度工厂通过它获得一批待分发的请求。
pub trait RequestSource: Send + Sync {
    /// 生成指定数量的请求
    fn generate(&self, count: usize) -> Vec<CrawlRequest>;
}

const AIRPORTS: &[&str] = &[
    "PEK", "PVG", "CAN", "SZX", "HKG", "NRT", "SFO", "LAX", "JFK", "LHR", "CDG", "SIN",
];

/// 随机请求来源
///
/// 生成航线搜索请求，用于演示和压测。
#[derive(Debug, Clone)]
pub struct RandomRequestSource {
    sites: Vec<String>,
    max_days_ahead: i64,
}

impl RandomRequestSource {
    /// 创建随机请求来源
    ///
    /// # 参数
    ///
    /// * `sites` - 可选的目标站点
    pub fn new(sites: Vec<String>) -> Self {
        Self {
            sites,
            max_days_ahead: 90,
        }
    }

    fn pick<'a>(items: &'a [&'a str]) -> &'a str {
        items[rand::random_range(0..items.len())]
    }
}

impl Default for RandomRequestSource {
    fn default() -> Self {
        Self::new(vec!["fake-air".to_string()])
    }
}

impl RequestSource for RandomRequestSource {
    fn generate(&self, count: usize) -> Vec<CrawlRequest> {
        if self.sites.is_empty() {
            return Vec::new();
        }

        (0..count)
            .map(|_| {
                let site = &self.sites[rand::random_range(0..self.sites.len())];
                let from = Self::pick(AIRPORTS);
                let mut to = Self::pick(AIRPORTS);
                while to == from {
                    to = Self::pick(AIRPORTS);
                }
                let date = Utc::now().date_naive()
                    + Duration::days(rand::random_range(1..=self.max_days_ahead));
                // nonce keeps a batch from collapsing onto duplicate ids
                let nonce: u64 = rand::random();

                CrawlRequest::new(site.clone(), format!("https://{}/search", site))
                    .with_param("from", from)
                    .with_param("to", to)
                    .with_param("date", date.format("%Y-%m-%d").to_string())
                    .with_param("nonce", format!("{:016x}", nonce))
            })
            .collect()
    }
}
