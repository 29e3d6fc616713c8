//! Entities shared by the grant processor, the stores and the key store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Internal identifier, referenced by codes and tokens
    pub id: String,
    /// Public `client_id` presented on the wire
    pub client_id: String,
    /// Hex SHA-256 of the client secret. `None` marks a public client.
    pub secret_hash: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
    /// Default tenant used when a request does not name one
    pub tenant_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn is_public(&self) -> bool {
        self.secret_hash.is_none()
    }
}

/// A resource owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("s256") {
            Ok(PkceMethod::S256)
        } else if s.eq_ignore_ascii_case("plain") {
            Ok(PkceMethod::Plain)
        } else {
            Err(format!("unsupported code_challenge_method '{s}'"))
        }
    }
}

/// A single-use authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub user_id: String,
    /// Internal id of the client the code was issued to
    pub client_id: String,
    pub tenant_id: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<PkceMethod>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// A persisted token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    /// Internal id of the owning client
    pub client_id: String,
    pub tenant_id: String,
    pub scope: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Refresh deadline: the stored expiry, else `created_at + refresh_ttl`.
    pub fn refresh_deadline(&self, refresh_ttl: chrono::Duration) -> DateTime<Utc> {
        self.refresh_expires_at
            .unwrap_or(self.created_at + refresh_ttl)
    }

    /// Subject as it appears in the signed claims.
    pub fn subject(&self, client_public_id: &str) -> String {
        match &self.user_id {
            Some(user_id) if !user_id.is_empty() => format!("user:{user_id}"),
            _ => format!("client:{client_public_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// `token_type_hint` of the introspection and revocation endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    /// Parses a hint. Unknown or empty hints are treated as absent.
    pub fn parse(hint: Option<&str>) -> Option<Self> {
        match hint.map(str::trim) {
            Some(h) if h.eq_ignore_ascii_case("access_token") => Some(TokenTypeHint::AccessToken),
            Some(h) if h.eq_ignore_ascii_case("refresh_token") => Some(TokenTypeHint::RefreshToken),
            _ => None,
        }
    }
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    pub client_id: String,
    pub tenant_id: String,
    pub typ: TokenType,
    pub aud: Vec<String>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// Key id from the token header; filled in after signing or verification.
    #[serde(skip)]
    pub kid: String,
}

/// Input to the signer. Registered claims are filled in by the key store.
#[derive(Debug, Clone)]
pub struct ClaimSet {
    pub user_id: Option<String>,
    pub client_id: String,
    pub tenant_id: String,
    pub scope: Option<String>,
    pub token_type: TokenType,
}

impl ClaimSet {
    pub fn subject(&self) -> String {
        match &self.user_id {
            Some(user_id) => format!("user:{user_id}"),
            None => format!("client:{}", self.client_id),
        }
    }
}

/// Result of a successful grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Metadata returned for an active token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveToken {
    pub subject: String,
    pub scope: Option<String>,
    pub client_id: String,
    pub token_type: TokenType,
    pub issued_at: i64,
    pub expires_at: i64,
    pub audience: Vec<String>,
}

/// Identity of the caller, threaded explicitly through every call that needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub subject: String,
    pub client_id: String,
    pub tenant_id: Option<String>,
    pub scope: Option<String>,
}

impl CallerContext {
    /// Context for a client that authenticated with its own credentials.
    pub fn for_client(client: &Client) -> Self {
        Self {
            subject: format!("client:{}", client.client_id),
            client_id: client.client_id.clone(),
            tenant_id: client.tenant_id.clone(),
            scope: client.scopes.clone(),
        }
    }

    /// Context derived from verified token claims.
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self {
            subject: claims.sub.clone(),
            client_id: claims.client_id.clone(),
            tenant_id: Some(claims.tenant_id.clone()).filter(|t| !t.is_empty()),
            scope: Some(claims.scope.clone()).filter(|s| !s.is_empty()),
        }
    }
}
