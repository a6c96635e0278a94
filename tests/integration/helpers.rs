// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crawlfarm::config::settings::DatabaseSettings;
use crawlfarm::infrastructure::database::connection;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// 创建已迁移的内存 SQLite 数据库
///
/// 连接池只保留一个连接，内存库才能在多次查询间共享
pub async fn sqlite_memory_db() -> Arc<DatabaseConnection> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
        min_connections: Some(1),
        connect_timeout: Some(5),
        idle_timeout: None,
    };
    let db = connection::connect_and_migrate(&settings)
        .await
        .expect("Failed to migrate in-memory database");
    Arc::new(db)
}
