// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use sea_orm::DbErr;
use std::sync::Arc;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 缓存/后端错误
    #[error("Backend error: {0}")]
    Backend(String),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 记录未找到
    #[error("Record not found: {0}")]
    NotFound(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// 可按键存储的实体
pub trait Keyed {
    /// 实体在存储中的键
    fn key(&self) -> String;

    /// 条件更新所比较的状态，序列化后位于 `status` 字段
    ///
    /// 没有状态的实体返回 `None`，对它们的条件更新总是不匹配。
    fn status_tag(&self) -> Option<String> {
        None
    }
}

/// 键值存储特质
///
/// 快速存储（缓存）与持久存储都实现此接口，两者之间没有事务耦合，
/// 由调用方决定写入顺序。
#[async_trait]
pub trait KeyedStore<T>: Send + Sync
where
    T: Send + Sync,
{
    /// 创建实体
    async fn create(&self, entity: &T) -> Result<(), StoreError>;
    /// 根据键读取实体
    async fn read(&self, id: &str) -> Result<Option<T>, StoreError>;
    /// 更新实体，键不存在时的行为由具体存储决定
    async fn update(&self, id: &str, entity: &T) -> Result<(), StoreError>;
    /// 仅当已存储实体的状态等于 `expected_status` 时原子地更新
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 已写入
    /// * `Ok(false)` - 已存储的状态不同，未写入
    /// * `Err(StoreError::NotFound)` - 键不存在
    async fn update_if_status(
        &self,
        id: &str,
        expected_status: &str,
        entity: &T,
    ) -> Result<bool, StoreError>;
    /// 读取全部实体
    async fn get_all(&self) -> Result<Vec<T>, StoreError>;
}

#[async_trait]
impl<T, S> KeyedStore<T> for Arc<S>
where
    T: Send + Sync + 'static,
    S: KeyedStore<T> + ?Sized,
{
    async fn create(&self, entity: &T) -> Result<(), StoreError> {
        (**self).create(entity).await
    }

    async fn read(&self, id: &str) -> Result<Option<T>, StoreError> {
        (**self).read(id).await
    }

    async fn update(&self, id: &str, entity: &T) -> Result<(), StoreError> {
        (**self).update(id, entity).await
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected_status: &str,
        entity: &T,
    ) -> Result<bool, StoreError> {
        (**self).update_if_status(id, expected_status, entity).await
    }

    async fn get_all(&self) -> Result<Vec<T>, StoreError> {
        (**self).get_all().await
    }
}
