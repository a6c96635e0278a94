// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::models::crawl_task::CrawlTask;
use crate::infrastructure::cache::redis_client::RedisClient;
use crate::queue::channel::{
    run_handler, ChannelError, HandlerOutcome, MessageHandler, QueueChannel, QueueProfile,
};

/// Redis队列通道
///
/// 消息以 JSON 保存在列表 `{lane}` 中。接收时原子地移入当前消费者的
/// `{lane}:processing:{consumer}`，确认后删除；放弃时递增 `{lane}:deliveries`
/// 中的投递计数并重新入队，超过上限后移入 `{lane}:deadletter`。
///
/// 每个消费者登记在 `{lane}:consumers` 中并维持一个带过期时间的心跳键。
/// 心跳过期的消费者被视为已崩溃，其处理中的消息由存活的消费者回收。
pub struct RedisQueueChannel {
    client: RedisClient,
    profile: QueueProfile,
    keys: LaneKeys,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    receive_loop: parking_lot::Mutex<Option<JoinHandle<()>>>,
    keeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// 一个消费者在一条通道上涉及的Redis键
#[derive(Clone)]
struct LaneKeys {
    consumer: String,
    pending: String,
    processing: String,
    deliveries: String,
    dead_letter: String,
    consumers: String,
    heartbeat: String,
}

impl LaneKeys {
    fn new(lane: &str, consumer: &str) -> Self {
        Self {
            consumer: consumer.to_string(),
            pending: lane.to_string(),
            processing: format!("{}:processing:{}", lane, consumer),
            deliveries: format!("{}:deliveries", lane),
            dead_letter: format!("{}:deadletter", lane),
            consumers: format!("{}:consumers", lane),
            heartbeat: format!("{}:consumer:{}", lane, consumer),
        }
    }
}

impl RedisQueueChannel {
    /// 创建新的Redis通道
    ///
    /// # 参数
    ///
    /// * `client` - Redis客户端
    /// * `profile` - 通道参数
    pub fn new(client: RedisClient, profile: QueueProfile) -> Self {
        let (shutdown, _) = watch::channel(false);
        let keys = LaneKeys::new(&profile.lane, &Uuid::new_v4().to_string());
        let permits = Arc::new(Semaphore::new(profile.max_concurrent_calls));
        Self {
            client,
            profile,
            keys,
            permits,
            shutdown,
            receive_loop: parking_lot::Mutex::new(None),
            keeper: parking_lot::Mutex::new(None),
        }
    }

    /// 当前消费者ID
    pub fn consumer_id(&self) -> &str {
        &self.keys.consumer
    }

    /// 读取死信中的任务
    pub async fn dead_letters(&self) -> Result<Vec<CrawlTask>, ChannelError> {
        self.read_list(&self.keys.dead_letter).await
    }

    /// 读取当前消费者处理中的任务
    pub async fn in_flight(&self) -> Result<Vec<CrawlTask>, ChannelError> {
        self.read_list(&self.keys.processing).await
    }

    async fn read_list(&self, key: &str) -> Result<Vec<CrawlTask>, ChannelError> {
        self.client
            .lrange_all(key)
            .await?
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(ChannelError::from))
            .collect()
    }

    async fn settle(
        client: &RedisClient,
        keys: &LaneKeys,
        profile: &QueueProfile,
        task_id: &str,
        payload: &str,
        outcome: HandlerOutcome,
    ) -> anyhow::Result<()> {
        match outcome {
            HandlerOutcome::Ack => {
                client.lrem(&keys.processing, payload).await?;
                client.hdel(&keys.deliveries, task_id).await?;
                debug!(lane = %profile.lane, task_id = %task_id, "Message acknowledged");
            }
            HandlerOutcome::Abandon => {
                let deliveries = client.hincr(&keys.deliveries, task_id, 1).await?;
                if deliveries >= i64::from(profile.max_delivery_count) {
                    warn!(
                        lane = %profile.lane,
                        task_id = %task_id,
                        deliveries,
                        "Max delivery count reached, moving to dead letters"
                    );
                    client.lpush(&keys.dead_letter, payload).await?;
                    client.hdel(&keys.deliveries, task_id).await?;
                } else {
                    client.lpush(&keys.pending, payload).await?;
                }
                client.lrem(&keys.processing, payload).await?;
            }
        }
        Ok(())
    }

    async fn dead_letter_undecodable(
        client: &RedisClient,
        keys: &LaneKeys,
        payload: &str,
    ) -> anyhow::Result<()> {
        client.lpush(&keys.dead_letter, payload).await?;
        client.lrem(&keys.processing, payload).await
    }

    async fn heartbeat(client: &RedisClient, keys: &LaneKeys, ttl: Duration) -> anyhow::Result<()> {
        client
            .set(&keys.heartbeat, "alive", ttl.as_secs().max(1))
            .await?;
        client.sadd(&keys.consumers, &keys.consumer).await
    }

    /// 回收心跳已过期的消费者处理中的消息
    ///
    /// 每条被回收的消息计为一次被放弃的投递。
    async fn reclaim_stranded(
        client: &RedisClient,
        keys: &LaneKeys,
        profile: &QueueProfile,
    ) -> anyhow::Result<usize> {
        let mut reclaimed = 0;
        for consumer in client.smembers(&keys.consumers).await? {
            if consumer == keys.consumer {
                continue;
            }
            let peer = LaneKeys::new(&profile.lane, &consumer);
            if client.exists(&peer.heartbeat).await? {
                continue;
            }

            while let Some(payload) = client.rpoplpush(&peer.processing, &keys.processing).await? {
                match serde_json::from_str::<CrawlTask>(&payload) {
                    Ok(task) => {
                        Self::settle(client, keys, profile, &task.id, &payload, HandlerOutcome::Abandon)
                            .await?;
                    }
                    Err(e) => {
                        error!(lane = %profile.lane, "Undecodable stranded message moved to dead letters: {}", e);
                        Self::dead_letter_undecodable(client, keys, &payload).await?;
                    }
                }
                reclaimed += 1;
            }
            client.srem(&keys.consumers, &consumer).await?;
            warn!(lane = %profile.lane, consumer = %consumer, "Removed expired consumer");
        }

        if reclaimed > 0 {
            warn!(lane = %profile.lane, reclaimed, "Reclaimed messages from expired consumers");
        }
        Ok(reclaimed)
    }

    /// 把自身处理列表中剩余的消息放回通道
    async fn requeue_own(&self) -> anyhow::Result<usize> {
        let mut returned = 0;
        while self
            .client
            .rpoplpush(&self.keys.processing, &self.keys.pending)
            .await?
            .is_some()
        {
            returned += 1;
        }
        Ok(returned)
    }

    async fn deregister(&self) -> anyhow::Result<()> {
        let returned = self.requeue_own().await?;
        if returned > 0 {
            warn!(lane = %self.profile.lane, returned, "Returned unsettled messages to the lane");
        }
        self.client.del(&self.keys.heartbeat).await?;
        self.client
            .srem(&self.keys.consumers, &self.keys.consumer)
            .await
    }
}

#[async_trait]
impl QueueChannel for RedisQueueChannel {
    fn topic_name(&self) -> &str {
        &self.profile.lane
    }

    async fn send(&self, task: &CrawlTask) -> Result<bool, ChannelError> {
        let payload = serde_json::to_string(task)?;
        self.client.lpush(&self.profile.lane, &payload).await?;
        Ok(true)
    }

    async fn start_receiving(&self, handler: Arc<dyn MessageHandler>) -> Result<(), ChannelError> {
        if self.receive_loop.lock().is_some() {
            return Err(ChannelError::AlreadyReceiving(self.profile.lane.clone()));
        }

        // heartbeat before registering so peers never see a live consumer as expired
        Self::heartbeat(&self.client, &self.keys, self.profile.consumer_ttl).await?;
        Self::reclaim_stranded(&self.client, &self.keys, &self.profile).await?;

        let mut receive_loop = self.receive_loop.lock();
        if receive_loop.is_some() {
            return Err(ChannelError::AlreadyReceiving(self.profile.lane.clone()));
        }

        let keeper = {
            let client = self.client.clone();
            let keys = self.keys.clone();
            let profile = self.profile.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval((profile.consumer_ttl / 3).max(Duration::from_millis(100)));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = Self::heartbeat(&client, &keys, profile.consumer_ttl).await {
                        error!(lane = %profile.lane, "Failed to refresh consumer heartbeat: {}", e);
                    }
                    if let Err(e) = Self::reclaim_stranded(&client, &keys, &profile).await {
                        error!(lane = %profile.lane, "Failed to reclaim stranded messages: {}", e);
                    }
                }
            })
        };
        *self.keeper.lock() = Some(keeper);

        let client = self.client.clone();
        let profile = self.profile.clone();
        let keys = self.keys.clone();
        let mut shutdown = self.shutdown.subscribe();
        let permits = self.permits.clone();

        info!(lane = %profile.lane, consumer = %keys.consumer, "Starting receive loop");
        *receive_loop = Some(tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    _ = shutdown.changed() => break,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let received = tokio::select! {
                    _ = shutdown.changed() => break,
                    received = client.rpoplpush(&keys.pending, &keys.processing) => received,
                };

                let payload = match received {
                    Ok(Some(payload)) => payload,
                    Ok(None) => {
                        drop(permit);
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(profile.poll_interval) => continue,
                        }
                    }
                    Err(e) => {
                        error!(lane = %profile.lane, "Failed to receive message: {}", e);
                        drop(permit);
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(profile.poll_interval) => continue,
                        }
                    }
                };

                let task: CrawlTask = match serde_json::from_str(&payload) {
                    Ok(task) => task,
                    Err(e) => {
                        error!(lane = %profile.lane, "Undecodable message moved to dead letters: {}", e);
                        if let Err(e) = Self::dead_letter_undecodable(&client, &keys, &payload).await {
                            error!(lane = %profile.lane, "Failed to dead-letter message: {}", e);
                        }
                        continue;
                    }
                };

                let client = client.clone();
                let keys = keys.clone();
                let profile = profile.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let task_id = task.id.clone();
                    let outcome = run_handler(handler, task).await;
                    if let Err(e) =
                        Self::settle(&client, &keys, &profile, &task_id, &payload, outcome).await
                    {
                        error!(lane = %profile.lane, task_id = %task_id, "Failed to settle message: {}", e);
                    }
                    drop(permit);
                });
            }
            info!(lane = %profile.lane, "Receive loop stopped");
        }));
        Ok(())
    }

    async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.receive_loop.lock().take();
        let Some(handle) = handle else {
            return;
        };
        let _ = handle.await;

        // every handler holds a permit until its message is settled
        let all = u32::try_from(self.profile.max_concurrent_calls).unwrap_or(u32::MAX);
        match self.permits.acquire_many(all).await {
            Ok(drained) => drop(drained),
            Err(e) => error!(lane = %self.profile.lane, "Failed to drain in-flight handlers: {}", e),
        }

        let keeper = self.keeper.lock().take();
        if let Some(keeper) = keeper {
            keeper.abort();
        }
        if let Err(e) = self.deregister().await {
            error!(lane = %self.profile.lane, "Failed to deregister consumer: {}", e);
        }
        info!(lane = %self.profile.lane, consumer = %self.keys.consumer, "Consumer stopped");
    }
}
