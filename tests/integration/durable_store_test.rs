// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::sqlite_memory_db;
use chrono::Utc;
use crawlfarm::domain::models::crawl_task::{CrawlRequest, CrawlTask, TaskStatus};
use crawlfarm::domain::repositories::keyed_store::KeyedStore;
use crawlfarm::infrastructure::repositories::crawl_task_repo_impl::SeaOrmTaskStore;

fn finished_task(n: u32) -> CrawlTask {
    let mut task = CrawlTask::new(
        CrawlRequest::new("fake-air", "https://fake-air/search").with_param("n", n.to_string()),
    )
    .with_max_execution_time_ms(50_000);
    let now = Utc::now();
    task.status = TaskStatus::Completed;
    task.finish_time = Some(now);
    task.append_log(now, "Fetched 3 fares");
    task
}

#[tokio::test]
async fn test_update_creates_missing_record() {
    let store = SeaOrmTaskStore::new(sqlite_memory_db().await);
    let task = finished_task(1);

    assert!(store.read(&task.id).await.unwrap().is_none());
    store.update(&task.id, &task).await.unwrap();

    let stored = store.read(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.request, task.request);
    assert_eq!(stored.max_execution_time_ms, 50_000);
    assert_eq!(stored.log_entries, task.log_entries);
    assert!(stored.finish_time.is_some());
}

#[tokio::test]
async fn test_update_overwrites_existing_record() {
    let store = SeaOrmTaskStore::new(sqlite_memory_db().await);
    let mut task = finished_task(2);
    task.status = TaskStatus::Processing;
    task.finish_time = None;
    store.create(&task).await.unwrap();

    task.status = TaskStatus::TimedOut;
    task.append_log(Utc::now(), "second entry");
    store.update(&task.id, &task).await.unwrap();

    let all = store.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, TaskStatus::TimedOut);
    assert!(all[0].finish_time.is_none());
    assert_eq!(all[0].log_entries.len(), 2);
}

#[tokio::test]
async fn test_create_rejects_duplicate_id() {
    let store = SeaOrmTaskStore::new(sqlite_memory_db().await);
    let task = finished_task(3);

    store.create(&task).await.unwrap();
    assert!(store.create(&task).await.is_err());
}

#[tokio::test]
async fn test_conditional_update_only_matches_stored_status() {
    let store = SeaOrmTaskStore::new(sqlite_memory_db().await);
    let mut task = finished_task(4);
    store.create(&task).await.unwrap();

    task.status = TaskStatus::Queueing;
    task.finish_time = None;
    assert!(!store.update_if_status(&task.id, "new", &task).await.unwrap());
    let stored = store.read(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);

    assert!(store
        .update_if_status(&task.id, "completed", &task)
        .await
        .unwrap());
    let stored = store.read(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Queueing);

    let missing = finished_task(5);
    assert!(store
        .update_if_status(&missing.id, "new", &missing)
        .await
        .is_err());
}
