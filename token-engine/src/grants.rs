//! Grant processing: client-credentials, password, authorization code and
//! refresh token.

use crate::crypto;
use crate::error::{EngineError, GrantError};
use crate::models::{
    AuthorizationCode, CallerContext, ClaimSet, Client, IssuedTokens, PkceMethod, TokenRecord,
    TokenType,
};
use crate::TokenEngine;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Credentials a client presents on the token endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientAuth {
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl ClientAuth {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }

    fn secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// A parsed token-endpoint request.
#[derive(Debug, Clone)]
pub enum GrantRequest {
    ClientCredentials {
        client: ClientAuth,
        scope: Option<String>,
        tenant_id: Option<String>,
    },
    Password {
        client: ClientAuth,
        username: String,
        password: String,
        scope: Option<String>,
        tenant_id: Option<String>,
    },
    AuthorizationCode {
        client: ClientAuth,
        code: String,
        redirect_uri: Option<String>,
        code_verifier: Option<String>,
    },
    RefreshToken {
        client: ClientAuth,
        refresh_token: String,
    },
}

impl GrantRequest {
    pub fn grant_type(&self) -> &'static str {
        match self {
            GrantRequest::ClientCredentials { .. } => "client_credentials",
            GrantRequest::Password { .. } => "password",
            GrantRequest::AuthorizationCode { .. } => "authorization_code",
            GrantRequest::RefreshToken { .. } => "refresh_token",
        }
    }
}

/// The authorize step of the code flow, after the resource owner answered.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub tenant_id: Option<String>,
    pub approved: bool,
}

/// An issued authorization code and where to send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: String,
    pub state: Option<String>,
    #[serde(skip)]
    redirect_url: Url,
}

impl AuthorizationGrant {
    /// Redirect target with `code` and `state` appended to the query.
    pub fn location(&self) -> Url {
        let mut url = self.redirect_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                query.append_pair("state", state);
            }
        }
        url
    }
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub codes: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecretPolicy {
    /// Every client must prove its secret; public clients are rejected.
    Required,
    /// Public clients pass without a secret.
    SkipForPublic,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn chrono_duration(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}

fn timestamp(secs: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(fallback)
}

impl TokenEngine {
    /// Runs a token-endpoint grant.
    pub async fn grant(&self, request: GrantRequest) -> Result<IssuedTokens, EngineError> {
        let grant_type = request.grant_type();
        let result = match request {
            GrantRequest::ClientCredentials {
                client,
                scope,
                tenant_id,
            } => self.client_credentials(client, scope, tenant_id).await,
            GrantRequest::Password {
                client,
                username,
                password,
                scope,
                tenant_id,
            } => {
                self.password(client, &username, &password, scope, tenant_id)
                    .await
            }
            GrantRequest::AuthorizationCode {
                client,
                code,
                redirect_uri,
                code_verifier,
            } => {
                self.exchange_code(client, &code, non_empty(redirect_uri), non_empty(code_verifier))
                    .await
            }
            GrantRequest::RefreshToken {
                client,
                refresh_token,
            } => self.refresh(client, &refresh_token).await,
        };

        if let Err(e) = &result {
            if e.is_internal() {
                error!("{} grant failed: {}", grant_type, e);
            } else {
                warn!("{} grant rejected: {}", grant_type, e.error_code());
            }
        }
        result
    }

    /// Authenticates a confidential client by id and secret.
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<CallerContext, EngineError> {
        let auth = ClientAuth::new(client_id, client_secret.map(str::to_string));
        let client = self.authenticate(&auth, SecretPolicy::Required).await?;
        Ok(CallerContext::for_client(&client))
    }

    async fn authenticate(
        &self,
        auth: &ClientAuth,
        policy: SecretPolicy,
    ) -> Result<Client, EngineError> {
        let client = self
            .clients
            .find_by_client_id(&auth.client_id)
            .await?
            .ok_or_else(|| EngineError::InvalidClient("unknown client".to_string()))?;
        check_secret(&client, auth.secret(), policy)?;
        Ok(client)
    }

    fn resolve_tenant(
        &self,
        explicit: Option<String>,
        client: &Client,
    ) -> Result<String, GrantError> {
        non_empty(explicit)
            .or_else(|| non_empty(client.tenant_id.clone()))
            .ok_or(GrantError::TenantRequired)
    }

    fn resolve_scope(&self, requested: Option<String>, client: &Client) -> Option<String> {
        non_empty(requested).or_else(|| non_empty(client.scopes.clone()))
    }

    async fn client_credentials(
        &self,
        auth: ClientAuth,
        scope: Option<String>,
        tenant_id: Option<String>,
    ) -> Result<IssuedTokens, EngineError> {
        let client = self.authenticate(&auth, SecretPolicy::Required).await?;
        let tenant_id = self.resolve_tenant(tenant_id, &client)?;
        let scope = self.resolve_scope(scope, &client);

        let (issued, _) = self.issue(&client, None, tenant_id, scope, false).await?;
        Ok(issued)
    }

    async fn password(
        &self,
        auth: ClientAuth,
        username: &str,
        password: &str,
        scope: Option<String>,
        tenant_id: Option<String>,
    ) -> Result<IssuedTokens, EngineError> {
        let client = self.authenticate(&auth, SecretPolicy::SkipForPublic).await?;

        let user = self
            .users
            .find_by_email(username)
            .await?
            .ok_or(GrantError::InvalidCredentials)?;
        if !self.users.check_password(&user.id, password).await? {
            return Err(GrantError::InvalidCredentials.into());
        }

        let tenant_id = self.resolve_tenant(tenant_id, &client)?;
        let scope = self.resolve_scope(scope, &client);

        let (issued, _) = self
            .issue(&client, Some(user.id), tenant_id, scope, true)
            .await?;
        Ok(issued)
    }

    /// Issues an authorization code once the resource owner approved.
    pub async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationGrant, EngineError> {
        if !request.approved {
            info!(
                "Resource owner denied authorization for client '{}'",
                request.client_id
            );
            return Err(EngineError::AccessDenied);
        }

        let client = self
            .clients
            .find_by_client_id(&request.client_id)
            .await?
            .ok_or_else(|| EngineError::InvalidClient("unknown client".to_string()))?;

        let redirect_uri = match (client.redirect_uri.as_deref(), non_empty(request.redirect_uri))
        {
            (Some(registered), None) => registered.to_string(),
            (Some(registered), Some(presented)) if presented == registered => presented,
            (Some(_), Some(_)) => return Err(GrantError::InvalidRedirectUri.into()),
            (None, Some(presented)) => presented,
            (None, None) => return Err(GrantError::RedirectUriRequired.into()),
        };
        let redirect_url = Url::parse(&redirect_uri).map_err(|_| GrantError::InvalidRedirectUri)?;

        if self.users.find_by_id(&request.user_id).await?.is_none() {
            return Err(EngineError::InvalidRequest("unknown user_id".to_string()));
        }

        let tenant_id = self.resolve_tenant(request.tenant_id, &client)?;

        let challenge = non_empty(request.code_challenge);
        let method = non_empty(request.code_challenge_method)
            .map(|m| m.parse::<PkceMethod>())
            .transpose()
            .map_err(EngineError::InvalidRequest)?;
        let method = match (&challenge, method) {
            (Some(_), method) => Some(method.unwrap_or(PkceMethod::Plain)),
            (None, Some(_)) => {
                return Err(EngineError::InvalidRequest(
                    "code_challenge_method without code_challenge".to_string(),
                ));
            }
            (None, None) if client.is_public() => return Err(GrantError::PkceRequired.into()),
            (None, None) => None,
        };

        let code = AuthorizationCode {
            code: crypto::random_hex(24),
            user_id: request.user_id,
            client_id: client.id.clone(),
            tenant_id,
            code_challenge: challenge,
            code_challenge_method: method,
            redirect_uri: Some(redirect_uri.clone()),
            scope: self.resolve_scope(request.scope, &client),
            expires_at: Utc::now() + chrono_duration(self.settings.code_ttl),
        };
        self.codes.save(code.clone()).await?;
        info!(
            "Issued authorization code for client '{}' tenant '{}' (pkce: {})",
            client.client_id,
            code.tenant_id,
            code.code_challenge.is_some()
        );

        Ok(AuthorizationGrant {
            code: code.code,
            redirect_uri,
            state: non_empty(request.state),
            redirect_url,
        })
    }

    async fn exchange_code(
        &self,
        auth: ClientAuth,
        code: &str,
        redirect_uri: Option<String>,
        code_verifier: Option<String>,
    ) -> Result<IssuedTokens, EngineError> {
        let client = self.authenticate(&auth, SecretPolicy::SkipForPublic).await?;

        let stored = self
            .codes
            .find_valid(code, Utc::now())
            .await?
            .ok_or(GrantError::InvalidCode)?;
        if stored.client_id != client.id {
            debug!("Authorization code presented by a client it was not issued to");
            return Err(GrantError::InvalidCode.into());
        }

        if let Some(expected) = &stored.redirect_uri {
            if redirect_uri.as_deref() != Some(expected.as_str()) {
                return Err(GrantError::RedirectUriMismatch.into());
            }
        }

        match &stored.code_challenge {
            Some(challenge) => {
                let method = stored.code_challenge_method.unwrap_or(PkceMethod::Plain);
                let verifier = code_verifier.ok_or(GrantError::InvalidVerifier)?;
                if !crypto::verify_pkce(challenge, method, &verifier) {
                    return Err(GrantError::InvalidVerifier.into());
                }
            }
            None if client.is_public() => return Err(GrantError::PkceRequired.into()),
            None => {}
        }

        let (issued, record) = self
            .issue(
                &client,
                Some(stored.user_id.clone()),
                stored.tenant_id.clone(),
                stored.scope.clone(),
                true,
            )
            .await?;

        // Whoever deletes the code wins the redemption
        match self.codes.delete_by_code(&stored.code).await {
            Ok(true) => Ok(issued),
            Ok(false) => {
                warn!(
                    "Authorization code for client '{}' was redeemed concurrently, withdrawing tokens",
                    client.client_id
                );
                self.withdraw(&record).await;
                Err(GrantError::InvalidCode.into())
            }
            Err(e) => {
                warn!("Failed to delete redeemed authorization code: {}", e);
                Ok(issued)
            }
        }
    }

    async fn refresh(
        &self,
        auth: ClientAuth,
        refresh_token: &str,
    ) -> Result<IssuedTokens, EngineError> {
        let current = self
            .tokens
            .find_by_refresh_token(refresh_token)
            .await?
            .ok_or(GrantError::RefreshTokenNotFound)?;

        let client = self
            .clients
            .find_by_client_id(&auth.client_id)
            .await?
            .ok_or(GrantError::InvalidClientId)?;
        if current.client_id != client.id {
            return Err(GrantError::InvalidClientId.into());
        }
        check_secret(&client, auth.secret(), SecretPolicy::SkipForPublic)?;

        if current.refresh_deadline(self.settings.refresh_ttl_chrono()) <= Utc::now() {
            return Err(GrantError::RefreshTokenExpired.into());
        }

        let (issued, record) = self
            .issue(
                &client,
                current.user_id.clone(),
                current.tenant_id.clone(),
                current.scope.clone(),
                true,
            )
            .await?;

        // The new pair is persisted; only now retire the old one.
        match self.tokens.revoke_by_refresh_token(refresh_token).await {
            Ok(true) => Ok(issued),
            Ok(false) => {
                warn!(
                    "Refresh token for client '{}' was rotated concurrently, withdrawing tokens",
                    client.client_id
                );
                self.withdraw(&record).await;
                Err(GrantError::RefreshTokenNotFound.into())
            }
            Err(e) => {
                warn!("Failed to revoke rotated refresh token: {}", e);
                Ok(issued)
            }
        }
    }

    /// Signs and persists a token pair.
    async fn issue(
        &self,
        client: &Client,
        user_id: Option<String>,
        tenant_id: String,
        scope: Option<String>,
        with_refresh: bool,
    ) -> Result<(IssuedTokens, TokenRecord), EngineError> {
        let mut claims = ClaimSet {
            user_id,
            client_id: client.client_id.clone(),
            tenant_id,
            scope,
            token_type: TokenType::Access,
        };
        let access = self.keys.sign_with_active(&claims, self.settings.access_ttl)?;
        let refresh = if with_refresh {
            claims.token_type = TokenType::Refresh;
            Some(self.keys.sign_with_active(&claims, self.settings.refresh_ttl)?)
        } else {
            None
        };

        let now = Utc::now();
        let created_at = timestamp(access.claims.iat, now);
        let record = TokenRecord {
            id: crypto::random_hex(16),
            access_token: access.token,
            refresh_token: refresh.as_ref().map(|r| r.token.clone()),
            user_id: claims.user_id,
            client_id: client.id.clone(),
            tenant_id: claims.tenant_id,
            scope: claims.scope,
            access_expires_at: timestamp(access.claims.exp, now),
            refresh_expires_at: refresh.as_ref().map(|r| timestamp(r.claims.exp, now)),
            created_at,
        };
        self.tokens.save(record.clone()).await?;
        info!(
            "Issued {} for client '{}' tenant '{}'",
            if with_refresh {
                "access and refresh tokens"
            } else {
                "access token"
            },
            client.client_id,
            record.tenant_id
        );

        Ok((
            IssuedTokens {
                access_token: record.access_token.clone(),
                token_type: "Bearer".to_string(),
                expires_in: i64::try_from(self.settings.access_ttl.as_secs())
                    .unwrap_or(i64::MAX),
                refresh_token: record.refresh_token.clone(),
                scope: record.scope.clone(),
            },
            record,
        ))
    }

    /// Revokes tokens issued to a request that lost a single-use race.
    async fn withdraw(&self, record: &TokenRecord) {
        if let Err(e) = self.tokens.revoke_by_access_token(&record.access_token).await {
            error!("Failed to withdraw token record {}: {}", record.id, e);
        }
    }

    /// Deletes expired codes and token records.
    pub async fn cleanup_expired(&self) -> Result<CleanupReport, EngineError> {
        let now = Utc::now();
        let codes = self.codes.cleanup_expired(now).await?;
        let tokens = self
            .tokens
            .cleanup_expired(now, self.settings.refresh_ttl_chrono())
            .await?;
        if codes > 0 || tokens > 0 {
            info!(
                "Expiry sweep removed {} codes and {} token records",
                codes, tokens
            );
        }
        Ok(CleanupReport { codes, tokens })
    }
}

fn check_secret(
    client: &Client,
    presented: Option<&str>,
    policy: SecretPolicy,
) -> Result<(), EngineError> {
    match (&client.secret_hash, presented) {
        (None, _) if policy == SecretPolicy::SkipForPublic => Ok(()),
        (None, _) => Err(EngineError::InvalidClient(
            "public clients cannot use this grant".to_string(),
        )),
        (Some(_), None) => Err(EngineError::InvalidClient(
            "client secret required".to_string(),
        )),
        (Some(hash), Some(secret)) if crypto::verify_client_secret(hash, secret) => Ok(()),
        (Some(_), Some(_)) => Err(EngineError::InvalidClient(
            "invalid client secret".to_string(),
        )),
    }
}
