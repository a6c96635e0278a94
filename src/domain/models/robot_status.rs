// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::repositories::keyed_store::Keyed;

/// 执行机器人状态快照
///
/// 由单个机器人独占写入，观察者只能拿到不可变副本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    /// 机器人ID
    pub id: Uuid,
    /// 显示名称，包含所订阅的通道名
    pub name: String,
    /// 启动时间
    pub start_time: Option<DateTime<Utc>>,
    /// 累计接收任务数
    pub task_received_count: u64,
    /// 当前并发执行任务数
    pub concurrent_job_count: u64,
    /// 最近一次上报时间
    pub last_reported_time: DateTime<Utc>,
}

impl RobotStatus {
    /// 创建新的状态记录
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            start_time: None,
            task_received_count: 0,
            concurrent_job_count: 0,
            last_reported_time: Utc::now(),
        }
    }
}

impl Keyed for RobotStatus {
    fn key(&self) -> String {
        self.id.to_string()
    }
}
