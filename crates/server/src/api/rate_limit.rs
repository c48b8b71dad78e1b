//! Token bucket request limits for the API.
//!
//! Three tiers:
//! - general: every authenticated API route, per client IP
//! - dispatch: dispatch routes, per API key (or client IP without one)
//! - webhook: the Telegram webhook, one bucket for all callers

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::warn;

use dispatch_core::RateLimitConfig;

use super::error::ApiError;
use super::middleware::RequestId;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::state::AppState;

/// Buckets idle long enough to refill completely are dropped once a limiter
/// tracks this many keys.
const PRUNE_THRESHOLD: usize = 10_000;

const TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";
const WEBHOOK_LIMIT_EXCEEDED: &str = "Webhook rate limit exceeded";

/// Tokens refill continuously; a full bucket allows a burst of `capacity`.
#[derive(Debug)]
struct TokenBucket {
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, window: Duration) -> Self {
        let capacity = capacity as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / window.as_secs_f32(),
            last_refill: Instant::now(),
        }
    }

    /// Take a token, or report how long until one is available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f32(tokens_needed / self.refill_rate))
        }
    }

    fn is_full(&mut self) -> bool {
        self.refill();
        self.tokens >= self.capacity
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// One bucket per key.
pub struct RateLimiter {
    name: &'static str,
    capacity: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, capacity: u32, window: Duration) -> Self {
        Self {
            name,
            capacity,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `Err` carries the wait before the key may retry.
    pub async fn check(&self, key: &str) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= PRUNE_THRESHOLD && !buckets.contains_key(key) {
            buckets.retain(|_, bucket| !bucket.is_full());
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.window))
            .try_acquire()
    }
}

/// The limiters built from `[rate_limit]`.
pub struct RateLimits {
    pub general: RateLimiter,
    pub dispatch: RateLimiter,
    pub webhook: RateLimiter,
}

impl RateLimits {
    /// `None` when rate limiting is switched off.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            general: RateLimiter::new(
                "general",
                config.general_per_minute,
                Duration::from_secs(60),
            ),
            dispatch: RateLimiter::new(
                "dispatch",
                config.dispatch_per_minute,
                Duration::from_secs(60),
            ),
            webhook: RateLimiter::new(
                "webhook",
                config.webhook_per_second,
                Duration::from_secs(1),
            ),
        })
    }
}

fn client_ip(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rejection(limiter: &RateLimiter, message: &str, wait: Duration, request: &Request<Body>) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId(uuid::Uuid::new_v4().to_string()));
    let retry_after = wait.as_secs_f32().ceil().max(1.0) as u64;

    RATE_LIMITED_TOTAL
        .with_label_values(&[limiter.name()])
        .inc();
    warn!(
        request_id = %request_id.0,
        limiter = limiter.name(),
        path = %request.uri().path(),
        retry_after,
        "Rate limit exceeded"
    );

    let mut response = ApiError::rate_limited(message)
        .with_request_id(&request_id)
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// Per-IP limit, applied ahead of authentication.
pub async fn general_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limits) = state.rate_limits() else {
        return next.run(request).await;
    };

    match limits.general.check(&client_ip(&request)).await {
        Ok(()) => next.run(request).await,
        Err(wait) => rejection(&limits.general, TOO_MANY_REQUESTS, wait, &request),
    }
}

/// Per-client limit on dispatch routes, keyed by `X-API-Key` when present.
pub async fn dispatch_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limits) = state.rate_limits() else {
        return next.run(request).await;
    };

    let key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| format!("key:{}", v))
        .unwrap_or_else(|| format!("ip:{}", client_ip(&request)));

    match limits.dispatch.check(&key).await {
        Ok(()) => next.run(request).await,
        Err(wait) => rejection(&limits.dispatch, TOO_MANY_REQUESTS, wait, &request),
    }
}

/// Shared limit on the Telegram webhook.
pub async fn webhook_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limits) = state.rate_limits() else {
        return next.run(request).await;
    };

    match limits.webhook.check("telegram").await {
        Ok(()) => next.run(request).await,
        Err(wait) => rejection(&limits.webhook, WEBHOOK_LIMIT_EXCEEDED, wait, &request),
    }
}
