// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use crawlfarm::application::usecases::dispatch_factory::{
    DispatchFactory, DispatchOptions, ProgressCallback,
};
use crawlfarm::crawlers::simulated::{SimulatedCrawlerConfig, SimulatedCrawlerProvider};
use crawlfarm::crawlers::CrawlerRegistry;
use crawlfarm::domain::models::crawl_task::{CrawlRequest, CrawlTask, TaskStatus};
use crawlfarm::domain::models::robot_status::RobotStatus;
use crawlfarm::domain::repositories::keyed_store::{KeyedStore, StoreError};
use crawlfarm::domain::services::request_source::RequestSource;
use crawlfarm::infrastructure::repositories::memory_store::MemoryKeyedStore;
use crawlfarm::queue::channel::{ChannelError, MessageHandler, QueueChannel, QueueProfile};
use crawlfarm::queue::memory_channel::MemoryQueueChannel;
use crawlfarm::workers::crawl_robot::{CrawlRobot, RobotOptions, RobotStores};
use crawlfarm::workers::Worker;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 生成互不相同的请求
struct SequentialSource {
    next: AtomicUsize,
}

impl RequestSource for SequentialSource {
    fn generate(&self, count: usize) -> Vec<CrawlRequest> {
        (0..count)
            .map(|_| {
                let n = self.next.fetch_add(1, Ordering::SeqCst);
                CrawlRequest::new("fake-air", "https://fake-air/search").with_param("n", n.to_string())
            })
            .collect()
    }
}

struct UnreachableChannel;

#[async_trait]
impl QueueChannel for UnreachableChannel {
    fn topic_name(&self) -> &str {
        "unreachable"
    }

    async fn send(&self, _task: &CrawlTask) -> Result<bool, ChannelError> {
        Err(ChannelError::Backend("connection refused".into()))
    }

    async fn start_receiving(&self, _handler: Arc<dyn MessageHandler>) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn stop(&self) {}
}

/// 读写前后都有延迟的快速存储视图
struct LaggingStore {
    inner: Arc<MemoryKeyedStore<CrawlTask>>,
    lag: Duration,
}

#[async_trait]
impl KeyedStore<CrawlTask> for LaggingStore {
    async fn create(&self, entity: &CrawlTask) -> Result<(), StoreError> {
        self.inner.create(entity).await
    }

    async fn read(&self, id: &str) -> Result<Option<CrawlTask>, StoreError> {
        let stored = self.inner.read(id).await;
        tokio::time::sleep(self.lag).await;
        stored
    }

    async fn update(&self, id: &str, entity: &CrawlTask) -> Result<(), StoreError> {
        tokio::time::sleep(self.lag).await;
        self.inner.update(id, entity).await
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected_status: &str,
        entity: &CrawlTask,
    ) -> Result<bool, StoreError> {
        tokio::time::sleep(self.lag).await;
        self.inner.update_if_status(id, expected_status, entity).await
    }

    async fn get_all(&self) -> Result<Vec<CrawlTask>, StoreError> {
        self.inner.get_all().await
    }
}

fn lane(name: &str, high_priority: bool) -> Arc<MemoryQueueChannel> {
    Arc::new(MemoryQueueChannel::new(QueueProfile {
        lane: name.to_string(),
        high_priority,
        max_delivery_count: 3,
        max_concurrent_calls: 8,
        poll_interval: Duration::from_millis(10),
        consumer_ttl: Duration::from_secs(30),
    }))
}

fn options() -> DispatchOptions {
    DispatchOptions {
        poll_max_attempts: 2,
        poll_interval: Duration::from_millis(100),
        ..Default::default()
    }
}

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let callback: ProgressCallback = Arc::new(move |line: String| sink.lock().unwrap().push(line));
    (callback, lines)
}

fn source() -> Arc<SequentialSource> {
    Arc::new(SequentialSource {
        next: AtomicUsize::new(0),
    })
}

#[tokio::test(start_paused = true)]
async fn test_batch_is_split_across_lanes() {
    let store = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let normal = lane("crawl-tasks", false);
    let high = lane("crawl-tasks-p0", true);
    let factory = DispatchFactory::new(source(), store.clone(), normal.clone(), high.clone(), options());
    let (callback, lines) = recorder();

    let report = factory.dispatch_batch(100, callback).await;

    assert_eq!(report.planned, 100);
    assert_eq!(report.sent_normal, 80);
    assert_eq!(report.sent_high_priority, 20);
    assert_eq!(normal.sent_ids().len(), 80);
    assert_eq!(high.sent_ids().len(), 20);
    assert_eq!(report.send_failures, 0);
    assert_eq!(report.not_completed, 100);

    let stored = store.get_all().await.unwrap();
    assert_eq!(stored.len(), 100);
    assert!(stored.iter().all(|t| t.status == TaskStatus::Queueing));

    let lines = lines.lock().unwrap();
    let sent_lines = lines
        .iter()
        .filter(|l| l.starts_with("done sending out task message "))
        .count();
    assert_eq!(sent_lines, 100);
    assert!(lines
        .iter()
        .any(|l| l.ends_with("not completed after 2 polling attempts")));
    assert!(lines.last().unwrap().starts_with("End in "));
}

#[tokio::test(start_paused = true)]
async fn test_completed_task_is_reported() {
    let store = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let normal = lane("crawl-tasks", false);
    let high = lane("crawl-tasks-p0", true);
    let factory = DispatchFactory::new(
        source(),
        store.clone(),
        normal.clone(),
        high,
        DispatchOptions {
            high_priority_percent: 0,
            ..options()
        },
    );

    // completes the only task while it is being polled
    let completer = {
        let store = store.clone();
        let normal = normal.clone();
        tokio::spawn(async move {
            loop {
                if let Some(id) = normal.sent_ids().first().cloned() {
                    if let Ok(Some(mut task)) = store.read(&id).await {
                        if task.status == TaskStatus::Queueing {
                            task.status = TaskStatus::Completed;
                            store.update(&id, &task).await.unwrap();
                            break;
                        }
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    };
    let (callback, lines) = recorder();

    let report = factory.dispatch_batch(1, callback).await;
    completer.await.unwrap();

    assert_eq!(report.completed, 1);
    assert!(lines.lock().unwrap().iter().any(|l| l.contains(" completed in ")));
}

#[tokio::test(start_paused = true)]
async fn test_outer_timeout_stops_polling() {
    let store = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let factory = DispatchFactory::new(
        source(),
        store,
        lane("crawl-tasks", false),
        lane("crawl-tasks-p0", true),
        DispatchOptions {
            poll_max_attempts: 1_000,
            poll_interval: Duration::from_millis(100),
            poll_timeout: Duration::from_secs(1),
            ..Default::default()
        },
    );
    let (callback, lines) = recorder();

    let report = factory.dispatch_batch(5, callback).await;

    assert_eq!(report.timed_out, 5);
    assert!(lines
        .lock()
        .unwrap()
        .iter()
        .any(|l| l.ends_with("reached max timeout of 1000ms. ")));
}

#[tokio::test(start_paused = true)]
async fn test_failed_sends_are_not_polled() {
    let store = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let factory = DispatchFactory::new(
        source(),
        store.clone(),
        Arc::new(UnreachableChannel),
        lane("crawl-tasks-p0", true),
        options(),
    );
    let (callback, lines) = recorder();

    let report = factory.dispatch_batch(10, callback).await;

    assert_eq!(report.send_failures, 8);
    assert_eq!(report.sent_high_priority, 2);
    assert_eq!(report.not_completed, 2);
    let polled = lines
        .lock()
        .unwrap()
        .iter()
        .filter(|l| l.contains("polling attempts"))
        .count();
    assert_eq!(polled, 2);

    let new_tasks = store
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.status == TaskStatus::New)
        .count();
    assert_eq!(new_tasks, 8);
}

#[tokio::test(start_paused = true)]
async fn test_queueing_write_never_overwrites_finished_task() {
    let fast = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let normal = lane("crawl-tasks", false);
    let high = lane("crawl-tasks-p0", true);

    let registry = CrawlerRegistry::new(vec![Arc::new(SimulatedCrawlerProvider::new(
        SimulatedCrawlerConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..Default::default()
        },
    ))]);
    let robot = Arc::new(CrawlRobot::new(
        normal.clone(),
        RobotStores {
            fast: fast.clone(),
            durable: Arc::new(MemoryKeyedStore::<CrawlTask>::new()),
            status: Arc::new(MemoryKeyedStore::<RobotStatus>::new()),
        },
        Arc::new(registry),
        RobotOptions::default(),
    ));
    robot.clone().start().await.unwrap();

    let lagging = Arc::new(LaggingStore {
        inner: fast.clone(),
        lag: Duration::from_millis(50),
    });
    let factory = DispatchFactory::new(
        source(),
        lagging,
        normal.clone(),
        high,
        DispatchOptions {
            high_priority_percent: 0,
            ..options()
        },
    );
    let (callback, _lines) = recorder();

    let report = factory.dispatch_batch(1, callback).await;
    robot.stop().await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.not_completed, 0);
    let stored = fast.get_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, TaskStatus::Completed);
}
