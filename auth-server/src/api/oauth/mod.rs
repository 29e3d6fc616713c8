//! OAuth 2.0 authorization server endpoints
//!
//! ## Supported flows
//! - Client Credentials Grant (RFC 6749 Section 4.4)
//! - Resource Owner Password Credentials Grant (RFC 6749 Section 4.3)
//! - Authorization Code Grant with PKCE (RFC 6749 Section 4.1, RFC 7636)
//! - Refresh Token Grant (RFC 6749 Section 6)
//! - Token Introspection (RFC 7662) and Revocation (RFC 7009)
//!
//! Issued access tokens are RS256 JWTs; verifiers fetch the public keys from
//! `/oauth/jwks`. Grant logic lives in the `token-engine` crate, this module
//! only maps HTTP onto it.

mod client_auth;
pub(crate) mod handlers;
pub(crate) mod models;

use crate::state::AppState;
use axum::routing::{get, post, Router};

/// Creates OAuth 2.0 routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth/token", post(handlers::token))
        .route(
            "/oauth/authorize",
            get(handlers::authorize_page).post(handlers::authorize_decision),
        )
        .route("/oauth/introspect", post(handlers::introspect))
        .route("/oauth/revoke", post(handlers::revoke))
        .route("/oauth/jwks", get(handlers::jwks))
}
