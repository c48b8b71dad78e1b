//! Process-level tests against the `dispatchd` binary.

use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Minimal valid config: no auth, no channel credentials.
fn minimal_config(port: u16, db_path: &Path) -> String {
    format!(
        r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"
"#,
        port,
        db_path.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_dispatchd"))
        .env("DISPATCH_CONFIG", config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_degraded_without_channel_credentials() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &data_dir.path().join("dispatch.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(wait_for_server(port, 40).await, "Server did not start in time");

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["components"]["database"]["status"], "healthy");
    assert_eq!(json["components"]["telegram"]["status"], "degraded");
    assert_eq!(json["components"]["email"]["status"], "degraded");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &data_dir.path().join("dispatch.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(wait_for_server(port, 40).await, "Server did not start in time");

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["auth"]["method"], "none");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["rate_limit"]["enabled"], true);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_webhook_answers_without_telegram_credentials() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &data_dir.path().join("dispatch.db")));

    let mut server = spawn_server(config.path()).await;
    assert!(wait_for_server(port, 40).await, "Server did not start in time");

    let client = Client::new();
    let webhook = client
        .post(format!("http://127.0.0.1:{}/api/v1/telegram/webhook", port))
        .json(&serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "chat": {"id": 42, "type": "private"},
                "text": "/start"
            }
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(webhook.status(), 200);
    let json: serde_json::Value = webhook.json().await.expect("Failed to parse JSON");
    assert_eq!(json["ok"], true);

    let registration = client
        .get(format!(
            "http://127.0.0.1:{}/api/v1/telegram/registration/9a8b7c6d-5e4f-4a3b-9c1d-0e1f2a3b4c5d",
            port
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(registration.status(), 404);
    let json: serde_json::Value = registration.json().await.expect("Failed to parse JSON");
    assert_eq!(json["error"]["code"], "DRIVER_NOT_FOUND");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_dispatchd"))
            .env("DISPATCH_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_api_key_auth_without_keys_exits_with_error() {
    let port = get_available_port();
    let config = write_config(&format!(
        r#"
[auth]
method = "api_key"

[server]
port = {}
"#,
        port
    ));

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_dispatchd"))
            .env("DISPATCH_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
