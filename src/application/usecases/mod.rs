// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// 调度分发、完成轮询和遥测查询
pub mod completion_poller;
pub mod dispatch_factory;
pub mod telemetry_service;
