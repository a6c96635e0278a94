// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供执行机器人和工作器管理功能
/// 包括任务执行、超时竞争和生命周期管理
pub mod crawl_robot;
pub mod manager;
pub mod worker;

pub use worker::Worker;
