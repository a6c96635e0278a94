// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，依赖于领域层的抽象接口。
///
/// 包含的子模块：
/// - 缓存（cache）：Redis客户端与快速存储
/// - 数据库（database）：数据库连接和实体映射
/// - 指标（metrics）：Prometheus 指标导出
/// - 存储实现（repositories）：`KeyedStore` 的内存与数据库实现
pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
