// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 调度分发、完成轮询和遥测查询
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 爬虫模块
///
/// 爬虫接口、注册表和模拟爬虫
pub mod crawlers;

/// 领域模块
///
/// 包含核心业务实体、服务和存储接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、缓存和指标
pub mod infrastructure;

/// 队列模块
///
/// 普通与高优先级投递通道
pub mod queue;

/// 工具模块
///
/// 提供错误类型和日志初始化
pub mod utils;

/// 工作器模块
///
/// 执行机器人和工作器管理
pub mod workers;
