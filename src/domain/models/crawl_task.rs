// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::repositories::keyed_store::Keyed;

/// 未设置执行预算时使用的默认最大执行时间（毫秒）
pub const DEFAULT_MAX_EXECUTION_TIME_MS: u64 = 50_000;

/// 找不到可用爬虫时写入日志的标记
pub const NO_CRAWLER_APPLICABLE: &str = "No crawler applicable";

/// 爬取请求
///
/// 任务的负载数据。`params` 使用 `BTreeMap` 保证序列化顺序稳定，
/// 使得相同内容的请求总是得到相同的内容哈希。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    /// 目标站点（用于选择爬虫）
    pub site: String,
    /// 目标URL
    pub url: String,
    /// 请求参数
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl CrawlRequest {
    /// 创建新的爬取请求
    pub fn new(site: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            url: url.into(),
            params: BTreeMap::new(),
        }
    }

    /// 附加一个请求参数
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// 计算请求内容的哈希
    ///
    /// 依次对站点、URL和排序后的参数做SHA-256，字段以NUL分隔，返回小写十六进制字符串。
    /// 该值作为任务ID，相同请求会折叠为同一个任务。
    pub fn distinct_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.site.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.url.as_bytes());
        for (key, value) in &self.params {
            hasher.update([0u8]);
            hasher.update(key.as_bytes());
            hasher.update([b'=']);
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// 爬取任务实体
///
/// 调度和跟踪的基本单元。优先级不保存在实体上，
/// 而是由任务被发送到的通道隐式决定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlTask {
    /// 任务ID，等于请求内容哈希，创建后不可变
    pub id: String,
    /// 任务负载
    pub request: CrawlRequest,
    /// 任务状态
    pub status: TaskStatus,
    /// 创建时间
    pub create_time: DateTime<Utc>,
    /// 最后修改时间
    pub last_modified_time: DateTime<Utc>,
    /// 完成时间，仅在非超时的终态写入
    pub finish_time: Option<DateTime<Utc>>,
    /// 最大执行时间（毫秒），0 表示使用默认值
    pub max_execution_time_ms: u64,
    /// 追加式诊断日志
    #[serde(default)]
    pub log_entries: Vec<String>,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// New → Queueing → Processing → Completed/Failed/TimedOut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 新建，尚未发送
    #[default]
    New,
    /// 已发送到队列，等待执行
    Queueing,
    /// 执行中
    Processing,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 执行超时
    TimedOut,
}

impl TaskStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }

    /// 判断状态转换是否合法
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (New, Queueing)
                | (New, Processing)
                | (Queueing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, TimedOut)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::New => write!(f, "new"),
            TaskStatus::Queueing => write!(f, "queueing"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TaskStatus::New),
            "queueing" => Ok(TaskStatus::Queueing),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "timed_out" => Ok(TaskStatus::TimedOut),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    /// 未知的状态字符串
    #[error("Unknown task status: {0}")]
    UnknownStatus(String),
}

impl CrawlTask {
    /// 根据请求创建新任务
    ///
    /// 任务ID取自请求内容哈希，状态为 `New`。
    pub fn new(request: CrawlRequest) -> Self {
        let now = Utc::now();
        Self {
            id: request.distinct_hash(),
            request,
            status: TaskStatus::New,
            create_time: now,
            last_modified_time: now,
            finish_time: None,
            max_execution_time_ms: 0,
            log_entries: Vec::new(),
        }
    }

    /// 设置执行预算
    pub fn with_max_execution_time_ms(mut self, ms: u64) -> Self {
        self.max_execution_time_ms = ms;
        self
    }

    /// 更新最后修改时间，保证单调不减
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_modified_time {
            self.last_modified_time = now;
        }
    }

    /// 按状态机转换状态，并在同一操作中更新最后修改时间
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 转换成功
    /// * `Err(DomainError)` - 转换不合法，任务保持不变
    pub fn transition_to(
        &mut self,
        next: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch(now);
        Ok(())
    }

    /// 解析实际使用的执行预算，未设置时写回默认值
    pub fn resolve_max_execution_time(&mut self) -> Duration {
        if self.max_execution_time_ms == 0 {
            self.max_execution_time_ms = DEFAULT_MAX_EXECUTION_TIME_MS;
        }
        Duration::from_millis(self.max_execution_time_ms)
    }

    /// 追加一条带时间戳的日志
    pub fn append_log(&mut self, now: DateTime<Utc>, message: impl AsRef<str>) {
        self.log_entries
            .push(format!("{}, {}", now.to_rfc3339(), message.as_ref()));
    }

    /// 是否因缺少可用爬虫而失败
    ///
    /// 这类失败会通过通道重投递重试。
    pub fn is_awaiting_crawler(&self) -> bool {
        self.status == TaskStatus::Failed
            && self
                .log_entries
                .last()
                .is_some_and(|entry| entry.ends_with(NO_CRAWLER_APPLICABLE))
    }
}

impl Keyed for CrawlTask {
    fn key(&self) -> String {
        self.id.clone()
    }

    fn status_tag(&self) -> Option<String> {
        Some(self.status.to_string())
    }
}
