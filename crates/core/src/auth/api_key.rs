//! API Key authentication.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Authenticator that validates requests against a set of configured API keys.
///
/// Accepts the key in either:
/// - `Authorization: Bearer <key>` header
/// - `X-API-Key: <key>` header
///
/// Several keys can be valid at once so that clients can be rotated
/// independently. An authenticator with no keys rejects every request.
pub struct ApiKeyAuthenticator {
    keys: Vec<String>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Number of usable keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Extract API key from request headers.
    /// Checks Authorization: Bearer and X-API-Key headers.
    fn extract_key(&self, request: &AuthRequest) -> Option<String> {
        if let Some(auth_header) = request.headers.get("authorization") {
            let key = auth_header
                .strip_prefix("Bearer ")
                .or_else(|| auth_header.strip_prefix("bearer "));
            if let Some(key) = key {
                return Some(key.trim().to_string());
            }
        }

        request
            .headers
            .get("x-api-key")
            .map(|key| key.trim().to_string())
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided_key = self
            .extract_key(request)
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::NotAuthenticated)?;

        // Compare against every key so timing does not reveal which one matched
        let matched = self.keys.iter().fold(false, |found, expected| {
            constant_time_eq(provided_key.as_bytes(), expected.as_bytes()) | found
        });

        if matched {
            Ok(Identity {
                user_id: format!("api_key:{}", key_fingerprint(&provided_key)),
                method: "api_key".to_string(),
                claims: std::collections::HashMap::new(),
            })
        } else {
            Err(AuthError::InvalidCredentials("Invalid API key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Short, non-reversible identifier for a key, safe to log.
fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn make_request(headers: Vec<(&str, &str)>) -> AuthRequest {
        AuthRequest {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    fn authenticator() -> ApiKeyAuthenticator {
        ApiKeyAuthenticator::new(vec![
            "ops-dashboard-key".to_string(),
            "scheduler-key".to_string(),
        ])
    }

    #[tokio::test]
    async fn test_bearer_token_valid() {
        let request = make_request(vec![("Authorization", "Bearer ops-dashboard-key")]);

        let identity = authenticator().authenticate(&request).await.unwrap();

        assert!(identity.user_id.starts_with("api_key:"));
        assert_eq!(identity.method, "api_key");
    }

    #[tokio::test]
    async fn test_any_configured_key_is_accepted() {
        let request = make_request(vec![("X-API-Key", "scheduler-key")]);

        assert!(authenticator().authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_identities_differ_per_key() {
        let auth = authenticator();
        let a = auth
            .authenticate(&make_request(vec![("X-API-Key", "ops-dashboard-key")]))
            .await
            .unwrap();
        let b = auth
            .authenticate(&make_request(vec![("X-API-Key", "scheduler-key")]))
            .await
            .unwrap();

        assert_ne!(a.user_id, b.user_id);
        assert!(!a.user_id.contains("ops-dashboard-key"));
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let request = make_request(vec![("Authorization", "Bearer wrong-key")]);

        let result = authenticator().authenticate(&request).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_missing_or_blank_header() {
        let auth = authenticator();

        let result = auth.authenticate(&make_request(vec![])).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));

        let result = auth
            .authenticate(&make_request(vec![("X-API-Key", "   ")]))
            .await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_bearer_lowercase() {
        let request = make_request(vec![("Authorization", "bearer scheduler-key")]);

        assert!(authenticator().authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_key_set_rejects_everything() {
        let auth = ApiKeyAuthenticator::new(vec!["".to_string(), "  ".to_string()]);
        assert_eq!(auth.key_count(), 0);

        let result = auth
            .authenticate(&make_request(vec![("X-API-Key", "anything")]))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(constant_time_eq(b"", b""));
    }
}
