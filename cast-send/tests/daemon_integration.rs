//! Integration tests for the cast-send daemon

use std::sync::Arc;

use assert_cmd::Command;
use chrono::{Duration, Utc};
use libcastlane::{
    AdapterRegistry, ContentStatus, Database, NewContent, Platform, PublishingService,
    ScheduleStatus,
};
use predicates::prelude::*;
use tempfile::TempDir;

fn cast_send(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cast-send").unwrap();
    cmd.env("CASTLANE_CONFIG", dir.path().join("missing.toml"))
        .env("CASTLANE_DB_PATH", db_path(dir))
        .env_remove("TWITTER_BEARER_TOKEN");
    cmd
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("castlane.db").to_string_lossy().to_string()
}

async fn service(dir: &TempDir) -> PublishingService {
    let db = Database::new(&db_path(dir)).await.unwrap();
    PublishingService::with_parts(Arc::new(db), AdapterRegistry::new())
}

#[test]
fn test_help_documents_signals() {
    let dir = TempDir::new().unwrap();
    cast_send(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SIGTERM"))
        .stdout(predicate::str::contains("--once"));
}

#[test]
fn test_once_with_empty_queue() {
    let dir = TempDir::new().unwrap();
    cast_send(&dir)
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::contains("due=0 completed=0 failed=0"));
}

#[test]
fn test_invalid_config_file_exits_with_config_code() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "this is = = not toml").unwrap();

    cast_send(&dir)
        .env("CASTLANE_CONFIG", &config)
        .arg("--once")
        .assert()
        .code(2);
}

#[tokio::test]
async fn test_once_fails_due_post_without_credentials() {
    let dir = TempDir::new().unwrap();
    let (due_id, future_id, content_id) = {
        let service = service(&dir).await;
        let due = service
            .create_content(NewContent::new("Overdue tweet", Platform::Twitter))
            .await
            .unwrap();
        let future = service
            .create_content(NewContent::new("Tomorrow's tweet", Platform::Twitter))
            .await
            .unwrap();
        let due_schedule = service
            .schedule(&due.id, Utc::now() - Duration::minutes(5), None)
            .await
            .unwrap();
        let future_schedule = service
            .schedule(&future.id, Utc::now() + Duration::days(1), None)
            .await
            .unwrap();
        (due_schedule.id, future_schedule.id, due.id)
    };

    cast_send(&dir)
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::contains("due=1 completed=0 failed=1"));

    let service = service(&dir).await;
    let due = service.get_schedule(&due_id).await.unwrap();
    assert_eq!(due.status, ScheduleStatus::Failed);
    assert!(due.last_error.unwrap().contains("Configuration error"));

    let content = service.get_content(&content_id).await.unwrap();
    assert_eq!(content.status, ContentStatus::Failed);

    let future = service.get_schedule(&future_id).await.unwrap();
    assert_eq!(future.status, ScheduleStatus::Pending);
}
