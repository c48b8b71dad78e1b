//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the dispatch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound for a single channel send (milliseconds).
    /// A send that runs longer is recorded as a failed attempt.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Try one more channel when a single-channel dispatch fails.
    /// Also requires the driver to have fallback enabled.
    #[serde(default)]
    pub fallback_on_failure: bool,

    /// Base URL of the operations web app, used for route map links.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
}

fn default_send_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

fn default_app_base_url() -> String {
    "https://fleetillo.com".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            fallback_on_failure: false,
            app_base_url: default_app_base_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.send_timeout_ms, 30_000);
        assert!(!config.fallback_on_failure);
        assert_eq!(config.app_base_url, "https://fleetillo.com");
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config.send_timeout_ms, 30_000);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            send_timeout_ms = 2500
            fallback_on_failure = true
            app_base_url = "https://ops.example.com"
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.send_timeout_ms, 2500);
        assert!(config.fallback_on_failure);
        assert_eq!(config.app_base_url, "https://ops.example.com");
    }
}
