// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use tracing::warn;

use crate::domain::repositories::keyed_store::{Keyed, KeyedStore, StoreError};
use crate::infrastructure::cache::redis_client::{ConditionalWrite, RedisClient};

/// Redis键值存储
///
/// 以 JSON 保存实体，键为 `{prefix}:{id}`，并维护 `{prefix}:index`
/// 集合以支持 `get_all`。所有记录带过期时间。
pub struct RedisKeyedStore<T> {
    client: RedisClient,
    prefix: String,
    ttl_secs: u64,
    _entity: PhantomData<fn() -> T>,
}

impl<T> RedisKeyedStore<T> {
    /// 创建Redis键值存储
    ///
    /// # 参数
    ///
    /// * `client` - Redis客户端
    /// * `prefix` - 键前缀
    /// * `ttl_secs` - 记录过期时间（秒）
    pub fn new(client: RedisClient, prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            ttl_secs,
            _entity: PhantomData,
        }
    }

    fn entity_key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.prefix)
    }
}

#[async_trait]
impl<T> KeyedStore<T> for RedisKeyedStore<T>
where
    T: Keyed + Serialize + DeserializeOwned + Send + Sync,
{
    async fn create(&self, entity: &T) -> Result<(), StoreError> {
        let id = entity.key();
        let payload = serde_json::to_string(entity)?;
        self.client
            .set(&self.entity_key(&id), &payload, self.ttl_secs)
            .await?;
        self.client.sadd(&self.index_key(), &id).await?;
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.client.get(&self.entity_key(id)).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &str, entity: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_string(entity)?;
        let written = self
            .client
            .set_existing(&self.entity_key(id), &payload, self.ttl_secs)
            .await?;
        if written {
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected_status: &str,
        entity: &T,
    ) -> Result<bool, StoreError> {
        let payload = serde_json::to_string(entity)?;
        match self
            .client
            .set_if_status(&self.entity_key(id), expected_status, &payload, self.ttl_secs)
            .await?
        {
            ConditionalWrite::Written => Ok(true),
            ConditionalWrite::Mismatch => Ok(false),
            ConditionalWrite::Missing => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn get_all(&self) -> Result<Vec<T>, StoreError> {
        let ids = self.client.smembers(&self.index_key()).await?;
        let mut entities = Vec::with_capacity(ids.len());

        for id in ids {
            match self.client.get(&self.entity_key(&id)).await? {
                Some(payload) => match serde_json::from_str(&payload) {
                    Ok(entity) => entities.push(entity),
                    Err(e) => warn!(key = %id, "Skipping undecodable record: {}", e),
                },
                None => {
                    // expired record, drop it from the index
                    self.client.srem(&self.index_key(), &id).await?;
                }
            }
        }

        Ok(entities)
    }
}
