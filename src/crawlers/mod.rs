// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 爬虫模块
///
/// 定义爬虫接口、按任务选择爬虫的注册表以及内置的模拟爬虫
pub mod registry;
pub mod simulated;
pub mod traits;

pub use registry::CrawlerRegistry;
pub use traits::{Crawler, CrawlerError, CrawlerProvider};
