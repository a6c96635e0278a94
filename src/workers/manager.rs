// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crate::workers::worker::Worker;

/// 工作管理器
///
/// 持有一组执行机器人，统一启动并在收到关闭信号后停止
#[derive(Default)]
pub struct RobotManager {
    workers: Vec<Arc<dyn Worker>>,
}

impl RobotManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加工作器
    pub fn add(&mut self, worker: Arc<dyn Worker>) {
        self.workers.push(worker);
    }

    /// 已管理的工作器数量
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 启动所有工作器
    ///
    /// 单个工作器启动失败只记录日志，不影响其他工作器
    ///
    /// # 返回值
    ///
    /// 返回成功启动的数量
    pub async fn start_all(&self) -> usize {
        let mut started = 0;
        for worker in &self.workers {
            match worker.clone().start().await {
                Ok(()) => started += 1,
                Err(e) => error!(worker = worker.name(), "Failed to start worker: {}", e),
            }
        }
        info!("Started {} of {} workers", started, self.workers.len());
        started
    }

    /// 停止所有工作器
    pub async fn stop_all(&self) {
        info!("Shutting down workers...");
        for worker in &self.workers {
            worker.stop().await;
        }
        info!("Workers shut down successfully");
    }

    /// 等待关闭信号并关闭工作进程
    ///
    /// 监听关闭信号并优雅地关闭所有工作进程
    pub async fn wait_for_shutdown(&self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.stop_all().await;
    }
}
