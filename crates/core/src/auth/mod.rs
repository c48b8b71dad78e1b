mod api_key;
mod none;
mod traits;
mod types;

pub use api_key::*;
pub use none::*;
pub use traits::*;
pub use types::*;

use crate::config::{AuthConfig, AuthMethod};

/// Factory function to create authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let auth = ApiKeyAuthenticator::new(config.api_keys.clone());
            if auth.key_count() == 0 {
                return Err(AuthError::ConfigurationError(
                    "api_keys must contain at least one key when using ApiKey auth method"
                        .to_string(),
                ));
            }
            Ok(Box::new(auth))
        }
    }
}
