// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Worker trait定义
///
/// 所有后台工作器都必须实现此trait
#[async_trait]
pub trait Worker: Send + Sync {
    /// 启动工作器，后台循环在返回后继续运行
    async fn start(self: Arc<Self>) -> Result<(), WorkerError>;

    /// 停止工作器
    async fn stop(&self);

    /// 获取工作器名称
    fn name(&self) -> &str;
}
