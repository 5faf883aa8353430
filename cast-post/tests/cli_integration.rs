//! Integration tests for the cast-post CLI

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 8] = [
    "TWITTER_BEARER_TOKEN",
    "LINKEDIN_ACCESS_TOKEN",
    "LINKEDIN_AUTHOR_URN",
    "FACEBOOK_PAGE_ID",
    "FACEBOOK_PAGE_ACCESS_TOKEN",
    "FACEBOOK_ACCESS_TOKEN",
    "INSTAGRAM_ACCESS_TOKEN",
    "INSTAGRAM_BUSINESS_ACCOUNT_ID",
];

/// cast-post pointed at a throwaway database with no credentials
fn cast_post(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cast-post").unwrap();
    cmd.env("CASTLANE_CONFIG", dir.path().join("missing.toml"))
        .env("CASTLANE_DB_PATH", dir.path().join("castlane.db"));
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_exit_codes() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXIT CODES"))
        .stdout(predicate::str::contains("--schedule"));
}

#[test]
fn test_draft_from_argument() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .args(["Hello drafts", "--draft"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("draft:"));
}

#[test]
fn test_draft_from_stdin_as_json() {
    let dir = TempDir::new().unwrap();
    let output = cast_post(&dir)
        .args(["--draft", "--format", "json", "--hashtag", "rust", "--hashtag", "#Tokio"])
        .write_stdin("Piped content\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["text"], "Piped content");
    assert_eq!(json["status"], "draft");
    assert_eq!(json["hashtags"], serde_json::json!(["#rust", "#Tokio"]));
}

#[test]
fn test_empty_content_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .arg("   ")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn test_unknown_platform_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .args(["Hello", "--platform", "myspace"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("myspace"));
}

#[test]
fn test_bad_schedule_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .args(["Hello", "--schedule", "whenever you like"])
        .assert()
        .code(3);
}

#[test]
fn test_schedule_relative_time() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .args(["Later please", "--platform", "linkedin", "--schedule", "2h"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("scheduled:linkedin:"));
}

#[test]
fn test_schedule_on_another_platform() {
    let dir = TempDir::new().unwrap();
    let output = cast_post(&dir)
        .args([
            "Cross post",
            "--schedule",
            "in 1 day",
            "--schedule-platform",
            "facebook",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["platform"], "facebook");
    assert_eq!(json["status"], "pending");
}

#[test]
fn test_post_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .arg("Straight out")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("twitter"));
}

#[test]
fn test_draft_and_schedule_conflict() {
    let dir = TempDir::new().unwrap();
    cast_post(&dir)
        .args(["Hello", "--draft", "--schedule", "1h"])
        .assert()
        .failure();
}
