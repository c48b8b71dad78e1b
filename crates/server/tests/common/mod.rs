//! Common test utilities for in-process API testing.
//!
//! Builds the real router over a file-backed dispatch store and the seeded
//! in-memory entity fixtures, with mock channel adapters standing in for
//! Telegram and email and a mock bot answering webhook updates.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dispatch_core::{
    config::{DatabaseConfig, ServerConfig, TelegramConfig},
    testing::{MockChannelAdapter, MockTelegramBot},
    AdapterRegistry, ApiKeyAuthenticator, AuthConfig, AuthMethod, Authenticator, BotService,
    ChannelAdapter, ChannelType, Config, DispatchOrchestrator, NoneAuthenticator,
    OrchestratorConfig, RateLimitConfig, SqliteDispatchStore, SqliteEntityStore,
};

/// Re-export fixtures for test convenience
pub use dispatch_core::testing::fixtures;

pub const TEST_API_KEY: &str = "test-api-key";

/// Test fixture holding an in-process server with controllable adapters.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub orchestrator: Arc<DispatchOrchestrator>,
    pub telegram: Arc<MockChannelAdapter>,
    pub email: Arc<MockChannelAdapter>,
    /// Answers webhook updates; `None` when built without a bot
    pub bot: Option<Arc<MockTelegramBot>>,
    pub entities: Arc<SqliteEntityStore>,
    pub dispatches: Arc<SqliteDispatchStore>,
    /// Sent as `X-API-Key` when set
    pub api_key: Option<String>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Require the API key on protected routes
    pub require_api_key: bool,
    pub orchestrator: OrchestratorConfig,
    /// Disabled unless a test sets limits
    pub rate_limit: RateLimitConfig,
    /// Expected webhook secret token
    pub webhook_secret: Option<String>,
    /// Wire a mock bot into the state
    pub with_bot: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            require_api_key: false,
            orchestrator: OrchestratorConfig::default(),
            rate_limit: RateLimitConfig::disabled(),
            webhook_secret: None,
            with_bot: true,
        }
    }
}

impl TestConfig {
    pub fn with_api_key() -> Self {
        Self {
            require_api_key: true,
            ..Default::default()
        }
    }

    pub fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        Self {
            rate_limit,
            ..Default::default()
        }
    }

    pub fn with_webhook_secret(secret: &str) -> Self {
        Self {
            webhook_secret: Some(secret.to_string()),
            ..Default::default()
        }
    }

    pub fn without_bot() -> Self {
        Self {
            with_bot: false,
            ..Default::default()
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let (auth, authenticator): (AuthConfig, Arc<dyn Authenticator>) =
            if test_config.require_api_key {
                (
                    AuthConfig {
                        method: AuthMethod::ApiKey,
                        api_keys: vec![TEST_API_KEY.to_string()],
                    },
                    Arc::new(ApiKeyAuthenticator::new(vec![TEST_API_KEY.to_string()])),
                )
            } else {
                (
                    AuthConfig {
                        method: AuthMethod::None,
                        api_keys: vec![],
                    },
                    Arc::new(NoneAuthenticator::new()),
                )
            };

        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            orchestrator: test_config.orchestrator.clone(),
            telegram: test_config
                .webhook_secret
                .clone()
                .map(|secret| TelegramConfig {
                    bot_token: "123:test-token".to_string(),
                    api_base: "http://127.0.0.1:1".to_string(),
                    timeout_secs: 1,
                    bot_username: None,
                    webhook_secret: Some(secret),
                }),
            email: None,
            rate_limit: test_config.rate_limit.clone(),
        };

        let entities = Arc::new(fixtures::seeded_entity_store());
        let dispatches = Arc::new(
            SqliteDispatchStore::new(&db_path).expect("Failed to create dispatch store"),
        );

        let telegram = Arc::new(MockChannelAdapter::new(ChannelType::Telegram));
        let email = Arc::new(MockChannelAdapter::new(ChannelType::Email));
        let registry = AdapterRegistry::new()
            .with(Arc::clone(&telegram) as Arc<dyn ChannelAdapter>)
            .with(Arc::clone(&email) as Arc<dyn ChannelAdapter>);

        let orchestrator = Arc::new(DispatchOrchestrator::new(
            test_config.orchestrator,
            dispatches.clone(),
            entities.clone(),
            registry,
        ));

        let mut state =
            dispatch_server::AppState::new(config, authenticator, Arc::clone(&orchestrator));
        let bot = test_config.with_bot.then(|| Arc::new(MockTelegramBot::new()));
        if let Some(ref bot) = bot {
            state = state.with_bot(Arc::new(BotService::new(
                bot.clone(),
                entities.clone(),
                dispatches.clone(),
            )));
        }
        let router = dispatch_server::create_router(Arc::new(state));

        Self {
            router,
            orchestrator,
            telegram,
            email,
            bot,
            entities,
            dispatches,
            api_key: test_config
                .require_api_key
                .then(|| TEST_API_KEY.to_string()),
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.request("POST", path, Some(bytes)).await
    }

    /// Send a POST request with a raw body (for malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request("POST", path, Some(body.as_bytes().to_vec()))
            .await
    }

    /// Send a POST request with JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let bytes = serde_json::to_vec(&body).unwrap();
        self.request_with_headers("POST", path, Some(bytes), headers)
            .await
    }

    /// Send a GET request without the fixture's API key.
    pub async fn get_anonymous(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Vec<u8>>) -> TestResponse {
        self.request_with_headers(method, path, body, &[]).await
    }

    async fn request_with_headers(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.header("X-API-Key", key);
        }
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = match body {
            Some(bytes) => {
                request_builder = request_builder.header("Content-Type", "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Poll the detail endpoint until the dispatch reaches a terminal status.
    pub async fn wait_for_terminal(&self, dispatch_id: &str, timeout: Duration) -> Value {
        let start = Instant::now();
        loop {
            let response = self.get(&format!("/api/v1/dispatch/{}", dispatch_id)).await;
            let status = response.body["status"].as_str().unwrap_or_default().to_string();
            if matches!(status.as_str(), "delivered" | "partial" | "failed") {
                return response.body;
            }
            assert!(
                start.elapsed() < timeout,
                "dispatch {} still {} after {:?}",
                dispatch_id,
                status,
                timeout
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
