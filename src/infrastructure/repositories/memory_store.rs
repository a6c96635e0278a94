// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::repositories::keyed_store::{Keyed, KeyedStore, StoreError};

/// 内存键值存储
///
/// 基于 `DashMap`，用于单进程部署和测试。
pub struct MemoryKeyedStore<T> {
    entries: DashMap<String, T>,
}

impl<T> MemoryKeyedStore<T> {
    /// 创建空的内存存储
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 当前记录数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for MemoryKeyedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> KeyedStore<T> for MemoryKeyedStore<T>
where
    T: Keyed + Clone + Send + Sync,
{
    async fn create(&self, entity: &T) -> Result<(), StoreError> {
        self.entries.insert(entity.key(), entity.clone());
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, id: &str, entity: &T) -> Result<(), StoreError> {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                *entry = entity.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected_status: &str,
        entity: &T,
    ) -> Result<bool, StoreError> {
        // the shard write lock is held from comparison to write
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                if entry.status_tag().as_deref() != Some(expected_status) {
                    return Ok(false);
                }
                *entry = entity.clone();
                Ok(true)
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn get_all(&self) -> Result<Vec<T>, StoreError> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
