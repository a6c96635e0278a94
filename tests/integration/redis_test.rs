// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 需要 Docker 的 Redis 测试，使用 `cargo test -- --ignored` 运行

use async_trait::async_trait;
use crawlfarm::domain::models::crawl_task::{CrawlRequest, CrawlTask, TaskStatus};
use crawlfarm::domain::repositories::keyed_store::{KeyedStore, StoreError};
use crawlfarm::infrastructure::cache::redis_client::RedisClient;
use crawlfarm::infrastructure::cache::redis_store::RedisKeyedStore;
use crawlfarm::queue::channel::{HandlerOutcome, MessageHandler, QueueChannel, QueueProfile};
use crawlfarm::queue::redis_channel::RedisQueueChannel;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::core::WaitFor;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

async fn start_redis() -> (ContainerAsync<GenericImage>, RedisClient) {
    let node = GenericImage::new("redis", "7-alpine")
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis");
    let port = node
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");
    let client = RedisClient::new(&format!("redis://127.0.0.1:{}", port))
        .await
        .expect("Failed to create Redis client");
    (node, client)
}

fn task(n: u32) -> CrawlTask {
    CrawlTask::new(
        CrawlRequest::new("fake-air", "https://fake-air/search").with_param("n", n.to_string()),
    )
}

struct ScriptedHandler {
    calls: AtomicU32,
    outcome: HandlerOutcome,
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    async fn handle(&self, _task: CrawlTask) -> HandlerOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
    }
}

fn lane_profile(lane: &str) -> QueueProfile {
    QueueProfile {
        lane: lane.into(),
        high_priority: false,
        max_delivery_count: 3,
        max_concurrent_calls: 4,
        poll_interval: Duration::from_millis(10),
        consumer_ttl: Duration::from_secs(1),
    }
}

/// 处理前等待一段时间再返回固定结果
struct SlowHandler {
    started: AtomicU32,
    finished: AtomicU32,
    outcome: HandlerOutcome,
}

#[async_trait]
impl MessageHandler for SlowHandler {
    async fn handle(&self, _task: CrawlTask) -> HandlerOutcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.outcome
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
#[ignore]
async fn test_redis_store_update_requires_existing_key() {
    let (_node, client) = start_redis().await;
    let store = RedisKeyedStore::<CrawlTask>::new(client, "crawl-task", 300);
    let mut t = task(1);

    let missing = store.update(&t.id, &t).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));

    store.create(&t).await.unwrap();
    t.status = TaskStatus::Queueing;
    store.update(&t.id, &t).await.unwrap();

    let stored = store.read(&t.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Queueing);
    assert_eq!(store.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_redis_store_drops_expired_records_from_index() {
    let (_node, client) = start_redis().await;
    let store = RedisKeyedStore::<CrawlTask>::new(client, "short-lived", 1);
    store.create(&task(2)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    assert!(store.get_all().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_redis_channel_dead_letters_after_max_deliveries() {
    let (_node, client) = start_redis().await;
    let channel = RedisQueueChannel::new(
        client,
        QueueProfile {
            lane: "crawl-tasks".into(),
            high_priority: false,
            max_delivery_count: 3,
            max_concurrent_calls: 4,
            poll_interval: Duration::from_millis(10),
            consumer_ttl: Duration::from_secs(30),
        },
    );
    let handler = Arc::new(ScriptedHandler {
        calls: AtomicU32::new(0),
        outcome: HandlerOutcome::Abandon,
    });

    let t = task(3);
    assert!(channel.send(&t).await.unwrap());
    channel.start_receiving(handler.clone()).await.unwrap();
    wait_until(|| handler.calls.load(Ordering::SeqCst) >= 3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    channel.stop().await;

    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    let dead = channel.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, t.id);
}

#[tokio::test]
#[ignore]
async fn test_redis_channel_acks_once() {
    let (_node, client) = start_redis().await;
    let channel = RedisQueueChannel::new(
        client,
        QueueProfile {
            lane: "crawl-tasks-p0".into(),
            high_priority: true,
            max_delivery_count: 3,
            max_concurrent_calls: 4,
            poll_interval: Duration::from_millis(10),
            consumer_ttl: Duration::from_secs(30),
        },
    );
    let handler = Arc::new(ScriptedHandler {
        calls: AtomicU32::new(0),
        outcome: HandlerOutcome::Ack,
    });

    channel.start_receiving(handler.clone()).await.unwrap();
    for n in 0..5 {
        channel.send(&task(n)).await.unwrap();
    }
    wait_until(|| handler.calls.load(Ordering::SeqCst) >= 5).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    channel.stop().await;

    assert_eq!(handler.calls.load(Ordering::SeqCst), 5);
    assert!(channel.dead_letters().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_redis_channel_stop_settles_in_flight_message() {
    let (_node, client) = start_redis().await;
    let first = RedisQueueChannel::new(client.clone(), lane_profile("stopping"));
    let slow = Arc::new(SlowHandler {
        started: AtomicU32::new(0),
        finished: AtomicU32::new(0),
        outcome: HandlerOutcome::Abandon,
    });

    let t = task(10);
    first.send(&t).await.unwrap();
    first.start_receiving(slow.clone()).await.unwrap();
    wait_until(|| slow.started.load(Ordering::SeqCst) == 1).await;
    first.stop().await;

    assert_eq!(slow.finished.load(Ordering::SeqCst), 1);
    assert!(first.in_flight().await.unwrap().is_empty());

    let second = RedisQueueChannel::new(client, lane_profile("stopping"));
    let handler = Arc::new(ScriptedHandler {
        calls: AtomicU32::new(0),
        outcome: HandlerOutcome::Ack,
    });
    second.start_receiving(handler.clone()).await.unwrap();
    wait_until(|| handler.calls.load(Ordering::SeqCst) >= 1).await;
    second.stop().await;

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert!(second.dead_letters().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_redis_channel_reclaims_messages_of_expired_consumer() {
    let (_node, client) = start_redis().await;
    let t = task(11);
    let payload = serde_json::to_string(&t).unwrap();
    // a consumer that crashed mid-handler: registered, no heartbeat
    client.lpush("reclaim:processing:crashed", &payload).await.unwrap();
    client.sadd("reclaim:consumers", "crashed").await.unwrap();

    let channel = RedisQueueChannel::new(client.clone(), lane_profile("reclaim"));
    let handler = Arc::new(ScriptedHandler {
        calls: AtomicU32::new(0),
        outcome: HandlerOutcome::Ack,
    });
    channel.start_receiving(handler.clone()).await.unwrap();
    wait_until(|| handler.calls.load(Ordering::SeqCst) >= 1).await;
    channel.stop().await;

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert!(client
        .lrange_all("reclaim:processing:crashed")
        .await
        .unwrap()
        .is_empty());
    assert!(client.smembers("reclaim:consumers").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_redis_channel_leaves_live_consumer_messages_alone() {
    let (_node, client) = start_redis().await;
    let busy = RedisQueueChannel::new(client.clone(), lane_profile("shared"));
    let slow = Arc::new(SlowHandler {
        started: AtomicU32::new(0),
        finished: AtomicU32::new(0),
        outcome: HandlerOutcome::Ack,
    });
    busy.start_receiving(slow.clone()).await.unwrap();
    busy.send(&task(12)).await.unwrap();
    wait_until(|| slow.started.load(Ordering::SeqCst) == 1).await;

    let idle = RedisQueueChannel::new(client, lane_profile("shared"));
    let handler = Arc::new(ScriptedHandler {
        calls: AtomicU32::new(0),
        outcome: HandlerOutcome::Ack,
    });
    idle.start_receiving(handler.clone()).await.unwrap();
    busy.stop().await;
    idle.stop().await;

    assert_eq!(slow.finished.load(Ordering::SeqCst), 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}
