// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crawlfarm::config::settings::Settings;
use crawlfarm::crawlers::simulated::SimulatedCrawlerProvider;
use crawlfarm::crawlers::CrawlerRegistry;
use crawlfarm::domain::models::crawl_task::CrawlTask;
use crawlfarm::domain::models::robot_status::RobotStatus;
use crawlfarm::infrastructure::cache::redis_client::RedisClient;
use crawlfarm::infrastructure::cache::redis_store::RedisKeyedStore;
use crawlfarm::infrastructure::database::connection;
use crawlfarm::infrastructure::metrics::init_metrics;
use crawlfarm::infrastructure::repositories::crawl_task_repo_impl::SeaOrmTaskStore;
use crawlfarm::queue::channel::QueueProfile;
use crawlfarm::queue::redis_channel::RedisQueueChannel;
use crawlfarm::utils::telemetry;
use crawlfarm::workers::crawl_robot::{CrawlRobot, RobotOptions, RobotStores};
use crawlfarm::workers::manager::RobotManager;
use std::sync::Arc;
use tracing::info;

/// 主函数
///
/// 启动执行机器人集群，直到收到关闭信号
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting crawlfarm robots...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    if settings.metrics.enabled {
        init_metrics(&settings.metrics.listen_addr);
    }

    // 3. Connect to stores
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database connection established");

    let redis = RedisClient::new(&settings.redis.url).await?;
    info!("Redis client initialized");

    let stores = RobotStores {
        fast: Arc::new(RedisKeyedStore::<CrawlTask>::new(
            redis.clone(),
            &settings.cache.task_key_prefix,
            settings.cache.task_ttl_secs,
        )),
        durable: Arc::new(SeaOrmTaskStore::new(db)),
        status: Arc::new(RedisKeyedStore::<RobotStatus>::new(
            redis.clone(),
            &settings.cache.status_key_prefix,
            settings.cache.status_ttl_secs,
        )),
    };

    // 4. Register crawlers
    let registry = Arc::new(CrawlerRegistry::new(vec![Arc::new(
        SimulatedCrawlerProvider::default(),
    )]));

    // 5. Start robots on both lanes
    let options = RobotOptions::from_settings(&settings.robot);
    let mut manager = RobotManager::new();
    for (count, high_priority) in [
        (settings.robot.normal_robots, false),
        (settings.robot.high_priority_robots, true),
    ] {
        for _ in 0..count {
            let channel = Arc::new(RedisQueueChannel::new(
                redis.clone(),
                QueueProfile::from_settings(&settings.queue, high_priority),
            ));
            manager.add(Arc::new(CrawlRobot::new(
                channel,
                stores.clone(),
                registry.clone(),
                options.clone(),
            )));
        }
    }
    manager.start_all().await;

    manager.wait_for_shutdown().await;
    Ok(())
}
