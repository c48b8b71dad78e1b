use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// The parts of an incoming HTTP request an authenticator may look at.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    pub fn new<'a, I>(headers: I, source_ip: IpAddr) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect(),
            source_ip,
        }
    }
}

/// Authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    #[serde(default)]
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            claims: HashMap::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.method == "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity.user_id, "anonymous");
        assert!(identity.is_anonymous());
        assert!(identity.claims.is_empty());
    }

    #[test]
    fn test_auth_request_lowercases_header_names() {
        let request = AuthRequest::new(
            [("X-API-Key", "abc"), ("Authorization", "Bearer xyz")],
            "10.0.0.1".parse().unwrap(),
        );

        assert_eq!(request.headers.get("x-api-key").map(String::as_str), Some("abc"));
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer xyz")
        );
    }
}
