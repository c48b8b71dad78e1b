use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - api_key auth has at least one usable key
/// - Orchestrator send timeout is positive
/// - Configured channels carry credentials
/// - Enabled rate limits allow at least one request
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && !config.auth.api_keys.iter().any(|k| !k.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "auth.api_keys must contain at least one key when method = \"api_key\"".to_string(),
        ));
    }

    if config.orchestrator.send_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.send_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.orchestrator.app_base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "orchestrator.app_base_url cannot be empty".to_string(),
        ));
    }

    if let Some(ref telegram) = config.telegram {
        if telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "telegram.bot_token cannot be empty".to_string(),
            ));
        }
    }

    if let Some(ref email) = config.email {
        if email.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "email.api_key cannot be empty".to_string(),
            ));
        }
        if !email.from_address.contains('@') {
            return Err(ConfigError::ValidationError(format!(
                "email.from_address is not an email address: {}",
                email.from_address
            )));
        }
    }

    if config.rate_limit.enabled {
        let limits = [
            ("general_per_minute", config.rate_limit.general_per_minute),
            ("dispatch_per_minute", config.rate_limit.dispatch_per_minute),
            ("webhook_per_second", config.rate_limit.webhook_per_second),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, limit)| *limit == 0) {
            return Err(ConfigError::ValidationError(format!(
                "rate_limit.{} must be greater than 0 (set rate_limit.enabled = false instead)",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config(toml: &str) -> Config {
        load_config_from_str(toml).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        let config = config(
            r#"
[auth]
method = "api_key"
api_keys = ["k1"]

[telegram]
bot_token = "123:abc"
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = config(
            r#"
[auth]
method = "none"

[server]
port = 0
"#,
        );
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_api_key_auth_needs_keys() {
        let config = config(
            r#"
[auth]
method = "api_key"
api_keys = ["   "]
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("auth.api_keys"));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let config = config(
            r#"
[auth]
method = "none"

[orchestrator]
send_timeout_ms = 0
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("send_timeout_ms"));
    }

    #[test]
    fn test_validate_blank_channel_credentials_fail() {
        let telegram = config(
            r#"
[auth]
method = "none"

[telegram]
bot_token = ""
"#,
        );
        assert!(validate_config(&telegram).is_err());

        let email = config(
            r#"
[auth]
method = "none"

[email]
api_key = "SG.x"
from_address = "nobody"
"#,
        );
        let err = validate_config(&email).unwrap_err();
        assert!(err.to_string().contains("from_address"));
    }

    #[test]
    fn test_validate_zero_rate_limit_only_when_enabled() {
        let enabled = config(
            r#"
[auth]
method = "none"

[rate_limit]
webhook_per_second = 0
"#,
        );
        let err = validate_config(&enabled).unwrap_err();
        assert!(err.to_string().contains("rate_limit.webhook_per_second"));

        let disabled = config(
            r#"
[auth]
method = "none"

[rate_limit]
enabled = false
webhook_per_second = 0
"#,
        );
        assert!(validate_config(&disabled).is_ok());
    }
}
