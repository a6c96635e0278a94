// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 启动 Prometheus 指标导出
///
/// # 参数
///
/// * `listen_addr` - 导出监听地址，如 `0.0.0.0:9000`
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!(
        "crawl_tasks_received_total",
        "Crawl tasks accepted by execution robots"
    );
    describe_counter!(
        "crawl_tasks_finished_total",
        "Crawl tasks that reached a terminal status"
    );
    describe_gauge!(
        "crawl_robot_in_flight",
        "Crawl tasks currently executing per robot"
    );
    describe_histogram!(
        "crawl_task_duration_seconds",
        Unit::Seconds,
        "Time from Processing to the terminal status"
    );
    describe_counter!(
        "dispatch_tasks_sent_total",
        "Crawl tasks sent by the dispatch factory"
    );
}
