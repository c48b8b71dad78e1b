//! Request id, authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use dispatch_core::{AuthError, AuthRequest, Identity};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id for one request, echoed in `X-Request-Id` and error bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId(uuid::Uuid::new_v4().to_string()));
        std::future::ready(Ok(request_id))
    }
}

/// Assigns a request id (caller-supplied `X-Request-Id` or a fresh UUID) and
/// echoes it on the response.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Authentication middleware that validates requests using the configured authenticator.
///
/// Failures are answered with a 401 `UNAUTHORIZED` envelope; a broken
/// authenticator configuration is a 500.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let authenticator = state.authenticator();

    if authenticator.method_name() == "none" {
        request.extensions_mut().insert(Identity::anonymous());
        return next.run(request).await;
    }

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId(uuid::Uuid::new_v4().to_string()));

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest::new(
        request
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        source_ip,
    );

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["not_authenticated"])
                .inc();
            warn!(request_id = %request_id.0, %source_ip, "Request without API key");
            ApiError::unauthorized(
                "Missing API key. Please provide a valid API key in the X-API-Key header.",
            )
            .with_request_id(&request_id)
            .into_response()
        }
        Err(AuthError::InvalidCredentials(_)) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["invalid_credentials"])
                .inc();
            warn!(request_id = %request_id.0, %source_ip, "Request with invalid API key");
            ApiError::unauthorized("Invalid API key. Please provide a valid API key.")
                .with_request_id(&request_id)
                .into_response()
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["internal_error"])
                .inc();
            tracing::error!(request_id = %request_id.0, "Authenticator failure: {}", e);
            ApiError::internal("Authentication is misconfigured")
                .with_request_id(&request_id)
                .into_response()
        }
    }
}

/// Extractor for authenticated user ID.
///
/// Falls back to "anonymous" if no identity is present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{header, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use dispatch_core::{
        config::{DatabaseConfig, ServerConfig},
        AdapterRegistry, ApiKeyAuthenticator, AuthConfig, AuthMethod, Config,
        DispatchOrchestrator, NoneAuthenticator, OrchestratorConfig, RateLimitConfig,
        SqliteDispatchStore, SqliteEntityStore,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn user_handler(AuthUser(user_id): AuthUser) -> String {
        user_id
    }

    fn create_test_state(method: AuthMethod, api_keys: Vec<String>) -> Arc<AppState> {
        let authenticator: Arc<dyn dispatch_core::Authenticator> = match method {
            AuthMethod::None => Arc::new(NoneAuthenticator::new()),
            AuthMethod::ApiKey => Arc::new(ApiKeyAuthenticator::new(api_keys.clone())),
        };
        let orchestrator = DispatchOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(SqliteDispatchStore::in_memory().unwrap()),
            Arc::new(SqliteEntityStore::in_memory().unwrap()),
            AdapterRegistry::new(),
        );
        let config = Config {
            auth: AuthConfig { method, api_keys },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            telegram: None,
            email: None,
            rate_limit: RateLimitConfig::disabled(),
        };

        Arc::new(AppState::new(config, authenticator, Arc::new(orchestrator)))
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(user_handler))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Response) {
        let response = app.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_none_auth_allows_all_as_anonymous() {
        let state = create_test_state(AuthMethod::None, vec![]);
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let (status, response) = send(app(state), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_bearer_and_x_api_key_accepted() {
        let state = create_test_state(AuthMethod::ApiKey, vec!["secret-key".to_string()]);

        let bearer = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer secret-key")
            .body(Body::empty())
            .unwrap();
        let (status, response) = send(app(state.clone()), bearer).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body_string(response).await.starts_with("api_key:"));

        let x_api_key = Request::builder()
            .uri("/test")
            .header("X-API-Key", "secret-key")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(state), x_api_key).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_key_gets_unauthorized_envelope() {
        let state = create_test_state(AuthMethod::ApiKey, vec!["secret-key".to_string()]);
        let request = Request::builder()
            .uri("/test")
            .header("X-Request-Id", "req-42")
            .body(Body::empty())
            .unwrap();

        let (status, response) = send(app(state), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Missing API key"));
        assert_eq!(body["requestId"], "req-42");
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let state = create_test_state(AuthMethod::ApiKey, vec!["secret-key".to_string()]);
        let request = Request::builder()
            .uri("/test")
            .header("X-API-Key", "wrong-key")
            .body(Body::empty())
            .unwrap();

        let (status, response) = send(app(state), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let state = create_test_state(AuthMethod::None, vec![]);
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let (_, response) = send(app(state), request).await;

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }
}
