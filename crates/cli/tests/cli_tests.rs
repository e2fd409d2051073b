//! CLI integration tests

use std::process::{Command, Output};

fn rsz(args: &[&str]) -> Output {
    let home = tempfile::tempdir().expect("Failed to create temp home");
    Command::new(env!("CARGO_BIN_EXE_rsz"))
        .args(args)
        .env("HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("RSZ_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = rsz(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("CLI for the rightsizer service"),
        "Should show about text"
    );
    assert!(stdout.contains("harvest"), "Should show harvest command");
    assert!(stdout.contains("apply"), "Should show apply command");
    assert!(stdout.contains("pending"), "Should show pending command");
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("RSZ_API_URL"), "Should show env var");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = rsz(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("rsz"), "Should show binary name");
}

#[test]
fn test_harvest_help_lists_kinds() {
    let output = rsz(&["harvest", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("autoscaling-group"));
    assert!(stdout.contains("compute-instance"));
    assert!(stdout.contains("database-instance"));
    assert!(stdout.contains("function"));
}

#[test]
fn test_pending_list_help() {
    let output = rsz(&["pending", "list", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--kind"), "Should show kind filter");
}

#[test]
fn test_invalid_kind() {
    let output = rsz(&["harvest", "mainframe"]);
    assert!(!output.status.success(), "Unknown kind should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid value"), "stderr was: {}", stderr);
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = rsz(&["apply"]);
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

#[test]
fn test_pending_list_json() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/v1/pending")
        .match_query(mockito::Matcher::UrlEncoded(
            "kind".into(),
            "ComputeInstance".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "pending": [{
                    "resource_id": "i-0abc",
                    "resource_kind": "ComputeInstance",
                    "current_value": "m5.xlarge",
                    "recommended_value": "m5.large",
                    "last_updated": "2024-03-01T12:30:45Z"
                }],
                "total": 1
            }"#,
        )
        .create();

    let url = server.url();
    let output = rsz(&[
        "--api-url",
        &url,
        "--format",
        "json",
        "pending",
        "list",
        "--kind",
        "compute-instance",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    mock.assert();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("i-0abc"));
    assert!(stdout.contains("m5.large"));
}

#[test]
fn test_rejected_apply_reports_state() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/invoke")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "type": "change",
            "key": "DatabaseInstance/db-1"
        })))
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "status_code": 400,
                "message": "DatabaseInstance/db-1 is not eligible for resizing in state modifying",
                "current_state": "modifying",
                "timestamp": "2024-03-01T12:30:45Z"
            }"#,
        )
        .create();

    let url = server.url();
    let output = rsz(&["--api-url", &url, "apply", "DatabaseInstance/db-1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    mock.assert();
    assert!(!output.status.success(), "Rejected apply should fail");
    assert!(stdout.contains("not eligible"));
    assert!(stdout.contains("Current state: modifying"));
}

#[test]
fn test_unreachable_service() {
    let output = rsz(&["--api-url", "http://127.0.0.1:9", "status"]);
    assert!(!output.status.success());
}

#[test]
fn test_api_url_with_base_path() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/rightsizer/v1/pending")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"pending": [], "total": 0}"#)
        .create();

    let url = format!("{}/rightsizer", server.url());
    let output = rsz(&["--api-url", &url, "--format", "json", "pending", "list"]);

    mock.assert();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}
