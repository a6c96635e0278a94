// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 爬取任务（crawl_task）：调度和跟踪的基本单元及其状态机
/// - 机器人状态（robot_status）：执行机器人的遥测快照
pub mod crawl_task;
pub mod robot_status;
