// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use redis::aio::MultiplexedConnection;
use redis::{FromRedisValue, RedisResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// 仅当记录的 `status` 字段等于期望值时覆盖写入
///
/// 返回 1 表示已写入，0 表示状态不匹配，-1 表示键不存在
const SET_IF_STATUS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
local ok, record = pcall(cjson.decode, current)
if not ok or record['status'] ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

/// 条件写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalWrite {
    /// 已写入
    Written,
    /// 当前状态与期望不符，未写入
    Mismatch,
    /// 键不存在
    Missing,
}

/// Redis客户端
///
/// 提供对Redis数据库的异步操作接口。所有克隆共享同一个多路复用连接，
/// 连接在首次使用时建立，出现连接错误后重建。
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
    /// 共享连接
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(anyhow::Error)` - 创建过程中出现的错误
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut cached = self.connection.lock().await;
        if let Some(con) = cached.as_ref() {
            return Ok(con.clone());
        }
        let con = self.client.get_multiplexed_async_connection().await?;
        *cached = Some(con.clone());
        Ok(con)
    }

    async fn discard_connection(&self, err: &redis::RedisError) {
        if err.is_connection_dropped() || err.is_io_error() {
            warn!("Redis connection lost, reconnecting on next command: {}", err);
            self.connection.lock().await.take();
        }
    }

    async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T> {
        let mut con = self.connection().await?;
        match cmd.query_async(&mut con).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.discard_connection(&e).await;
                Err(e.into())
            }
        }
    }

    /// 获取指定键的值
    ///
    /// # 参数
    ///
    /// * `key` - 键
    ///
    /// # 返回值
    ///
    /// * `Ok(Option<String>)` - 键对应的值，如果不存在则返回None
    /// * `Err(anyhow::Error)` - 获取过程中出现的错误
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    /// 设置键值对并指定过期时间
    ///
    /// # 参数
    ///
    /// * `key` - 键
    /// * `value` - 值
    /// * `ttl_seconds` - 过期时间（秒）
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.query(redis::cmd("SET").arg(key).arg(value).arg("EX").arg(ttl_seconds))
            .await
    }

    /// 仅当键已存在时覆盖其值并刷新过期时间
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 键存在且已更新
    /// * `Ok(false)` - 键不存在，未写入
    pub async fn set_existing(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let reply: Option<String> = self
            .query(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("XX")
                    .arg("EX")
                    .arg(ttl_seconds),
            )
            .await?;
        Ok(reply.is_some())
    }

    /// 原子地比较 JSON 记录的 `status` 字段并覆盖写入
    ///
    /// # 参数
    ///
    /// * `key` - 键
    /// * `expected_status` - 期望的当前状态
    /// * `value` - 新值
    /// * `ttl_seconds` - 过期时间（秒）
    pub async fn set_if_status(
        &self,
        key: &str,
        expected_status: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<ConditionalWrite> {
        let mut con = self.connection().await?;
        let script = redis::Script::new(SET_IF_STATUS_SCRIPT);
        let reply: RedisResult<i64> = script
            .key(key)
            .arg(expected_status)
            .arg(value)
            .arg(ttl_seconds)
            .invoke_async(&mut con)
            .await;
        match reply {
            Ok(1) => Ok(ConditionalWrite::Written),
            Ok(-1) => Ok(ConditionalWrite::Missing),
            Ok(_) => Ok(ConditionalWrite::Mismatch),
            Err(e) => {
                self.discard_connection(&e).await;
                Err(e.into())
            }
        }
    }

    /// 删除键
    pub async fn del(&self, key: &str) -> Result<()> {
        self.query(redis::cmd("DEL").arg(key)).await
    }

    /// 键是否存在
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.query(redis::cmd("EXISTS").arg(key)).await
    }

    /// 向集合添加成员
    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.query(redis::cmd("SADD").arg(key).arg(member)).await
    }

    /// 从集合移除成员
    pub async fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.query(redis::cmd("SREM").arg(key).arg(member)).await
    }

    /// 读取集合全部成员
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.query(redis::cmd("SMEMBERS").arg(key)).await
    }

    /// 从列表头部推入元素
    pub async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        self.query(redis::cmd("LPUSH").arg(key).arg(value)).await
    }

    /// 从 `source` 尾部弹出元素并推入 `destination` 头部
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(String))` - 弹出的元素
    /// * `Ok(None)` - 列表为空
    pub async fn rpoplpush(&self, source: &str, destination: &str) -> Result<Option<String>> {
        self.query(redis::cmd("RPOPLPUSH").arg(source).arg(destination))
            .await
    }

    /// 从列表中移除一个匹配的元素
    pub async fn lrem(&self, key: &str, value: &str) -> Result<()> {
        self.query(redis::cmd("LREM").arg(key).arg(1).arg(value)).await
    }

    /// 读取列表全部元素
    pub async fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        self.query(redis::cmd("LRANGE").arg(key).arg(0).arg(-1)).await
    }

    /// 哈希字段自增
    pub async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.query(redis::cmd("HINCRBY").arg(key).arg(field).arg(delta))
            .await
    }

    /// 删除哈希字段
    pub async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        self.query(redis::cmd("HDEL").arg(key).arg(field)).await
    }
}
