//! Token issuance configuration

use confique::Config;
use std::time::Duration;
use token_engine::TokenSettings;

/// Token issuance configuration
#[derive(Debug, Config, Clone)]
pub struct OAuthConfig {
    /// Issuer placed in the `iss` claim and checked on verification (default: "auth-service")
    #[config(env = "AUTH_OAUTH_ISSUER", default = "auth-service")]
    pub issuer: String,

    /// Access token lifetime in seconds (default: 900 = 15 minutes)
    #[config(env = "AUTH_OAUTH_ACCESS_TOKEN_TTL", default = 900)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds (default: 2592000 = 30 days)
    #[config(env = "AUTH_OAUTH_REFRESH_TOKEN_TTL", default = 2592000)]
    pub refresh_token_ttl: u64,

    /// Authorization code lifetime in seconds (default: 600 = 10 minutes)
    #[config(env = "AUTH_OAUTH_AUTH_CODE_TTL", default = 600)]
    pub auth_code_ttl: u64,
}

impl OAuthConfig {
    /// Lifetimes handed to the token engine
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl: Duration::from_secs(self.access_token_ttl),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl),
            code_ttl: Duration::from_secs(self.auth_code_ttl),
        }
    }
}
