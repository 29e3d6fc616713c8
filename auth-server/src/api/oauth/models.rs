//! OAuth 2.0 request and response structures
//!
//! Form bodies use the RFC 6749 snake_case names; JSON bodies may use the
//! camelCase spelling of the same fields.

use crate::errors::OAuthError;
use serde::{Deserialize, Serialize};
use token_engine::models::{ActiveToken, IssuedTokens};
use token_engine::{AuthorizationRequest as EngineAuthorizationRequest, ClientAuth, GrantRequest};
use utoipa::{IntoParams, ToSchema};

/// OAuth 2.0 Token Request, form or JSON encoded
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// "client_credentials", "password", "authorization_code" or "refresh_token"
    #[serde(alias = "grantType")]
    pub grant_type: Option<String>,
    /// Client identifier; may be sent with HTTP Basic instead
    #[serde(alias = "clientId")]
    pub client_id: Option<String>,
    /// Client secret; may be sent with HTTP Basic instead
    #[serde(alias = "clientSecret")]
    pub client_secret: Option<String>,
    /// Resource owner email (password grant)
    pub username: Option<String>,
    /// Resource owner password (password grant)
    pub password: Option<String>,
    /// Authorization code (authorization_code grant)
    pub code: Option<String>,
    /// Redirect URI used when the code was issued
    #[serde(alias = "redirectUri")]
    pub redirect_uri: Option<String>,
    /// PKCE code verifier
    #[serde(alias = "codeVerifier")]
    pub code_verifier: Option<String>,
    /// Refresh token (refresh_token grant)
    #[serde(alias = "refreshToken")]
    pub refresh_token: Option<String>,
    /// Requested scopes (space-separated)
    pub scope: Option<String>,
    /// Tenant the token is bound to; defaults to the client's tenant
    #[serde(alias = "tenantId", alias = "company_id", alias = "companyId")]
    pub tenant_id: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, OAuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_request(format!("{name} is required")))
}

impl TokenRequest {
    /// Builds the engine request. Credentials from an HTTP Basic header take
    /// precedence over the ones in the body.
    pub fn into_grant(self, basic: Option<ClientAuth>) -> Result<GrantRequest, OAuthError> {
        let grant_type = required(self.grant_type, "grant_type")?.to_ascii_lowercase();
        let client = match basic {
            Some(auth) => auth,
            None => ClientAuth::new(self.client_id.unwrap_or_default(), self.client_secret),
        };

        match grant_type.as_str() {
            "client_credentials" => Ok(GrantRequest::ClientCredentials {
                client,
                scope: self.scope,
                tenant_id: self.tenant_id,
            }),
            "password" => Ok(GrantRequest::Password {
                client,
                username: required(self.username, "username")?,
                password: required(self.password, "password")?,
                scope: self.scope,
                tenant_id: self.tenant_id,
            }),
            "authorization_code" => Ok(GrantRequest::AuthorizationCode {
                client,
                code: required(self.code, "code")?,
                redirect_uri: self.redirect_uri,
                code_verifier: self.code_verifier,
            }),
            "refresh_token" => Ok(GrantRequest::RefreshToken {
                client,
                refresh_token: required(self.refresh_token, "refresh_token")?,
            }),
            other => Err(OAuthError::unsupported_grant_type(other)),
        }
    }
}

/// OAuth 2.0 Token Response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(issued: IssuedTokens) -> Self {
        Self {
            access_token: issued.access_token,
            token_type: issued.token_type,
            expires_in: issued.expires_in,
            refresh_token: issued.refresh_token,
            scope: issued.scope,
        }
    }
}

/// Parameters of the authorization endpoint, from the query string (GET) or
/// the consent form (POST)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeParams {
    /// Must be "code"
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    /// Opaque value echoed back on the redirect
    pub state: Option<String>,
    /// Resource owner granting access
    pub user_id: Option<String>,
    pub code_challenge: Option<String>,
    /// "S256" or "plain"
    pub code_challenge_method: Option<String>,
    #[serde(alias = "company_id")]
    pub tenant_id: Option<String>,
    /// "none" issues the code without showing the consent page
    pub prompt: Option<String>,
    /// "1" issues the code without showing the consent page
    pub autoapprove: Option<String>,
    /// Consent answer: "1" approves, "0" denies
    pub approve: Option<String>,
}

impl AuthorizeParams {
    /// Whether the code may be issued without rendering the consent page
    pub fn skips_consent(&self) -> bool {
        self.prompt
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("none"))
            || self.autoapprove.as_deref() == Some("1")
    }

    pub fn denied(&self) -> bool {
        self.approve.as_deref() == Some("0")
    }

    pub fn has_code_response_type(&self) -> bool {
        self.response_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("code"))
    }

    pub fn into_engine_request(self) -> EngineAuthorizationRequest {
        let approved = !self.denied();
        EngineAuthorizationRequest {
            client_id: self.client_id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            redirect_uri: self.redirect_uri,
            scope: self.scope,
            state: self.state.filter(|s| !s.is_empty()),
            code_challenge: self.code_challenge,
            code_challenge_method: self.code_challenge_method,
            tenant_id: self.tenant_id,
            approved,
        }
    }
}

/// Body of the introspection and revocation endpoints (RFC 7662, RFC 7009)
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenReferenceRequest {
    pub token: Option<String>,
    /// "access_token" or "refresh_token"
    pub token_type_hint: Option<String>,
}

/// OAuth 2.0 Token Introspection Response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionResponse {
    /// Whether the token is active
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// "access" or "refresh"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiration (Unix time)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at (Unix time)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,
}

impl IntrospectionResponse {
    pub fn inactive() -> Self {
        Self::default()
    }
}

impl From<ActiveToken> for IntrospectionResponse {
    fn from(token: ActiveToken) -> Self {
        Self {
            active: true,
            scope: token.scope,
            client_id: Some(token.client_id),
            username: Some(token.subject.clone()),
            token_type: Some(token.token_type.to_string()),
            exp: Some(token.expires_at),
            iat: Some(token.issued_at),
            sub: Some(token.subject),
            aud: Some(token.audience),
        }
    }
}
