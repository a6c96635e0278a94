// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 请求来源（request_source）：为调度工厂生成爬取请求
pub mod request_source;
