// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::sqlite_memory_db;
use crawlfarm::application::usecases::dispatch_factory::{DispatchFactory, DispatchOptions};
use crawlfarm::application::usecases::telemetry_service::TelemetryService;
use crawlfarm::crawlers::simulated::{SimulatedCrawlerConfig, SimulatedCrawlerProvider};
use crawlfarm::crawlers::CrawlerRegistry;
use crawlfarm::domain::models::crawl_task::{CrawlTask, TaskStatus};
use crawlfarm::domain::models::robot_status::RobotStatus;
use crawlfarm::domain::repositories::keyed_store::KeyedStore;
use crawlfarm::domain::services::request_source::RandomRequestSource;
use crawlfarm::infrastructure::repositories::crawl_task_repo_impl::SeaOrmTaskStore;
use crawlfarm::infrastructure::repositories::memory_store::MemoryKeyedStore;
use crawlfarm::queue::channel::QueueProfile;
use crawlfarm::queue::memory_channel::MemoryQueueChannel;
use crawlfarm::workers::crawl_robot::{CrawlRobot, RobotOptions, RobotStores};
use crawlfarm::workers::manager::RobotManager;
use std::sync::Arc;
use std::time::Duration;

fn profile(lane: &str, high_priority: bool) -> QueueProfile {
    QueueProfile {
        lane: lane.to_string(),
        high_priority,
        max_delivery_count: 5,
        max_concurrent_calls: 16,
        poll_interval: Duration::from_millis(10),
        consumer_ttl: Duration::from_secs(30),
    }
}

/// 测试完整链路：调度两条通道，机器人执行，持久存储记录终态
#[tokio::test]
async fn test_batch_runs_to_completion_on_both_lanes() {
    let fast = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let durable = Arc::new(SeaOrmTaskStore::new(sqlite_memory_db().await));
    let statuses = Arc::new(MemoryKeyedStore::<RobotStatus>::new());
    let stores = RobotStores {
        fast: fast.clone(),
        durable: durable.clone(),
        status: statuses.clone(),
    };
    let registry = Arc::new(CrawlerRegistry::new(vec![Arc::new(
        SimulatedCrawlerProvider::new(SimulatedCrawlerConfig {
            min_delay_ms: 5,
            max_delay_ms: 30,
            ..Default::default()
        }),
    )]));

    let normal = Arc::new(MemoryQueueChannel::new(profile("crawl-tasks", false)));
    let high = Arc::new(MemoryQueueChannel::new(profile("crawl-tasks-p0", true)));

    let mut manager = RobotManager::new();
    for lane in [&normal, &high, &normal] {
        manager.add(Arc::new(CrawlRobot::new(
            Arc::new(lane.subscriber()),
            stores.clone(),
            registry.clone(),
            RobotOptions::default(),
        )));
    }
    assert_eq!(manager.start_all().await, 3);

    let factory = DispatchFactory::new(
        Arc::new(RandomRequestSource::default()),
        fast.clone(),
        normal.clone(),
        high.clone(),
        DispatchOptions {
            poll_max_attempts: 200,
            poll_interval: Duration::from_millis(20),
            poll_timeout: Duration::from_secs(10),
            ..Default::default()
        },
    );
    let report = factory.dispatch_batch(20, Arc::new(|_line: String| {})).await;
    manager.stop_all().await;

    assert_eq!(report.sent_normal, 16);
    assert_eq!(report.sent_high_priority, 4);
    assert_eq!(report.completed, 20);

    let persisted = durable.get_all().await.unwrap();
    assert_eq!(persisted.len(), 20);
    assert!(persisted
        .iter()
        .all(|t| t.status == TaskStatus::Completed && t.finish_time.is_some()));

    let telemetry = TelemetryService::new(statuses, fast);
    let robots = telemetry.robot_statuses().await.unwrap();
    assert_eq!(robots.len(), 3);
    let received: u64 = robots.iter().map(|r| r.task_received_count).sum();
    assert_eq!(received, 20);
    assert!(robots.iter().all(|r| r.concurrent_job_count == 0));

    let counts = telemetry.task_status_counts().await.unwrap();
    assert_eq!(counts.get(&TaskStatus::Completed), Some(&20));
}

/// 测试没有可用爬虫的任务会被重新投递直到进入死信
#[tokio::test]
async fn test_unsupported_site_ends_in_dead_letters() {
    let fast = Arc::new(MemoryKeyedStore::<CrawlTask>::new());
    let stores = RobotStores {
        fast: fast.clone(),
        durable: Arc::new(MemoryKeyedStore::<CrawlTask>::new()),
        status: Arc::new(MemoryKeyedStore::<RobotStatus>::new()),
    };
    let normal = Arc::new(MemoryQueueChannel::new(profile("crawl-tasks", false)));
    let robot = Arc::new(CrawlRobot::new(
        Arc::new(normal.subscriber()),
        stores,
        Arc::new(CrawlerRegistry::default()),
        RobotOptions::default(),
    ));

    let mut manager = RobotManager::new();
    manager.add(robot.clone());
    manager.start_all().await;

    let factory = DispatchFactory::new(
        Arc::new(RandomRequestSource::new(vec!["demo-rail".to_string()])),
        fast.clone(),
        normal.clone(),
        Arc::new(MemoryQueueChannel::new(profile("crawl-tasks-p0", true))),
        DispatchOptions {
            high_priority_percent: 0,
            poll_max_attempts: 10,
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
    );
    let report = factory.dispatch_batch(1, Arc::new(|_line: String| {})).await;
    manager.stop_all().await;

    assert_eq!(report.not_completed, 1);
    let dead = normal.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(robot.status().task_received_count, 5);

    let stored = fast.read(&dead[0].id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.is_awaiting_crawler());
}
