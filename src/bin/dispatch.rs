// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crawlfarm::application::usecases::dispatch_factory::{DispatchFactory, DispatchOptions};
use crawlfarm::application::usecases::telemetry_service::TelemetryService;
use crawlfarm::config::settings::Settings;
use crawlfarm::domain::models::crawl_task::CrawlTask;
use crawlfarm::domain::models::robot_status::RobotStatus;
use crawlfarm::domain::repositories::keyed_store::KeyedStore;
use crawlfarm::domain::services::request_source::RandomRequestSource;
use crawlfarm::infrastructure::cache::redis_client::RedisClient;
use crawlfarm::infrastructure::cache::redis_store::RedisKeyedStore;
use crawlfarm::infrastructure::metrics::init_metrics;
use crawlfarm::queue::channel::QueueProfile;
use crawlfarm::queue::redis_channel::RedisQueueChannel;
use crawlfarm::utils::telemetry;
use std::sync::Arc;
use tracing::{info, warn};

/// 分发一批任务并输出进度
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();
    let settings = Settings::new()?;

    if settings.metrics.enabled {
        init_metrics(&settings.metrics.listen_addr);
    }

    let redis = RedisClient::new(&settings.redis.url).await?;
    let tasks: Arc<dyn KeyedStore<CrawlTask>> = Arc::new(RedisKeyedStore::<CrawlTask>::new(
        redis.clone(),
        &settings.cache.task_key_prefix,
        settings.cache.task_ttl_secs,
    ));
    let statuses: Arc<dyn KeyedStore<RobotStatus>> = Arc::new(RedisKeyedStore::<RobotStatus>::new(
        redis.clone(),
        &settings.cache.status_key_prefix,
        settings.cache.status_ttl_secs,
    ));

    let factory = DispatchFactory::new(
        Arc::new(RandomRequestSource::new(settings.dispatch.sites.clone())),
        tasks.clone(),
        Arc::new(RedisQueueChannel::new(
            redis.clone(),
            QueueProfile::from_settings(&settings.queue, false),
        )),
        Arc::new(RedisQueueChannel::new(
            redis.clone(),
            QueueProfile::from_settings(&settings.queue, true),
        )),
        DispatchOptions::from_settings(&settings.dispatch),
    );

    let report = factory
        .dispatch_batch(
            settings.dispatch.batch_size,
            Arc::new(|line: String| info!("{}", line)),
        )
        .await;
    info!(
        sent_normal = report.sent_normal,
        sent_high_priority = report.sent_high_priority,
        send_failures = report.send_failures,
        completed = report.completed,
        not_completed = report.not_completed,
        timed_out = report.timed_out,
        "Batch finished"
    );

    let telemetry = TelemetryService::new(statuses, tasks);
    match telemetry.robot_statuses().await {
        Ok(robots) => {
            for robot in robots {
                info!(
                    robot = %robot.name,
                    received = robot.task_received_count,
                    in_flight = robot.concurrent_job_count,
                    "Robot status"
                );
            }
        }
        Err(e) => warn!("Failed to read robot statuses: {}", e),
    }
    match telemetry.task_status_counts().await {
        Ok(counts) => {
            for (status, count) in counts {
                info!(%status, count, "Tasks by status");
            }
        }
        Err(e) => warn!("Failed to read task statuses: {}", e),
    }

    Ok(())
}
