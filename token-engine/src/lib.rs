//! # token-engine
//!
//! The token engine of a multi-tenant OAuth2 authorization server.
//!
//! ## Components
//!
//! - **Keys:** RSA key store that signs with an active `kid` and publishes every
//!   known public key as a JWKS document.
//! - **JWKS cache:** verifier-side cache of the published keys, refreshed on miss
//!   or expiry.
//! - **Grants:** client-credentials, password, authorization-code (with PKCE)
//!   and refresh-token flows.
//! - **Introspection:** token introspection and revocation, backed by storage
//!   plus an ephemeral denylist for access tokens.
//!
//! Storage and the denylist cache are collaborators supplied by the caller
//! through the traits in [`store`] and [`revocation`].

pub mod builder;
pub mod crypto;
pub mod error;
pub mod grants;
pub mod introspection;
pub mod jwks;
pub mod keys;
pub mod models;
pub mod revocation;
pub mod store;

pub use crate::builder::TokenEngineBuilder;
pub use crate::error::{
    EngineError, GrantError, JwksError, KeyError, PasswordHashError, StoreError,
};
pub use crate::grants::{AuthorizationGrant, AuthorizationRequest, ClientAuth, GrantRequest};
pub use crate::jwks::JwksCache;
pub use crate::keys::{Jwk, JwkSet, KeyPair, KeyStore};
pub use crate::revocation::{RevocationCache, RevocationCacheError};

use crate::store::{AuthCodeStore, ClientStore, TokenStore, UserStore};
use std::sync::Arc;
use std::time::Duration;

/// Credential lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub code_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(720 * 60 * 60),
            code_ttl: Duration::from_secs(10 * 60),
        }
    }
}

/// Longest lifetime a credential may be configured with: 100 years.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl TokenSettings {
    /// Every lifetime must be positive and no longer than [`MAX_TTL`].
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, ttl) in [
            ("access token", self.access_ttl),
            ("refresh token", self.refresh_ttl),
            ("authorization code", self.code_ttl),
        ] {
            if ttl.is_zero() || ttl > MAX_TTL {
                return Err(EngineError::Configuration(format!(
                    "{name} lifetime must be between 1 and {} seconds, got {}",
                    MAX_TTL.as_secs(),
                    ttl.as_secs()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn refresh_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.refresh_ttl).unwrap_or(chrono::Duration::MAX)
    }
}

/// Entry point for every grant, introspection and revocation call.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct TokenEngine {
    pub(crate) clients: Arc<dyn ClientStore>,
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) codes: Arc<dyn AuthCodeStore>,
    pub(crate) tokens: Arc<dyn TokenStore>,
    pub(crate) keys: Arc<KeyStore>,
    pub(crate) denylist: Arc<dyn RevocationCache>,
    pub(crate) settings: TokenSettings,
}

impl std::fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEngine")
            .field("issuer", &self.keys.issuer())
            .field("active_kid", &self.keys.active_kid())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenEngine {
    pub fn builder() -> TokenEngineBuilder<builder::Missing> {
        TokenEngineBuilder::new()
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Published key set for the JWKS endpoint.
    pub fn jwks(&self) -> JwkSet {
        self.keys.jwks()
    }
}
