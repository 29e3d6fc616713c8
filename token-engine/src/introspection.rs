//! Token introspection and revocation.
//!
//! Storage is authoritative. The denylist only exists so that a revoked access
//! token stops working before its embedded expiry; entries live exactly as
//! long as the token would have.

use crate::error::EngineError;
use crate::models::{ActiveToken, CallerContext, TokenRecord, TokenType, TokenTypeHint};
use crate::revocation::{denylist_key, remaining_lifetime};
use crate::TokenEngine;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

impl TokenEngine {
    /// Describes an active token, or `None` when it is unknown, expired, revoked
    /// or owned by a different client than `caller`.
    pub async fn introspect(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        caller: Option<&CallerContext>,
    ) -> Option<ActiveToken> {
        if token.is_empty() {
            return None;
        }

        match self.denylist.exists(&denylist_key(token)).await {
            Ok(true) => {
                debug!("Introspected token is on the denylist");
                return None;
            }
            Ok(false) => {}
            Err(e) => warn!("Denylist lookup failed, answering from storage: {}", e),
        }

        let now = Utc::now();
        if hint != Some(TokenTypeHint::RefreshToken) {
            match self.tokens.find_by_access_token(token).await {
                Ok(Some(record)) => {
                    return self.describe(record, TokenType::Access, caller, now).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Access token lookup failed during introspection: {}", e);
                    return None;
                }
            }
        }
        if hint != Some(TokenTypeHint::AccessToken) {
            match self.tokens.find_by_refresh_token(token).await {
                Ok(Some(record)) => {
                    return self.describe(record, TokenType::Refresh, caller, now).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Refresh token lookup failed during introspection: {}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn describe(
        &self,
        record: TokenRecord,
        token_type: TokenType,
        caller: Option<&CallerContext>,
        now: DateTime<Utc>,
    ) -> Option<ActiveToken> {
        let client = match self.clients.find_by_id(&record.client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => return None,
            Err(e) => {
                error!("Client lookup failed during introspection: {}", e);
                return None;
            }
        };
        if caller.is_some_and(|c| c.client_id != client.client_id) {
            debug!("Introspection by a client that does not own the token");
            return None;
        }

        let expires_at = match token_type {
            TokenType::Access => record.access_expires_at,
            TokenType::Refresh => record.refresh_deadline(self.settings.refresh_ttl_chrono()),
        };
        if expires_at <= now {
            return None;
        }

        Some(ActiveToken {
            subject: record.subject(&client.client_id),
            scope: record.scope.clone(),
            token_type,
            issued_at: record.created_at.timestamp(),
            expires_at: expires_at.timestamp(),
            audience: vec![client.client_id.clone()],
            client_id: client.client_id,
        })
    }

    /// Revokes a token. Unknown tokens, and tokens owned by a client other
    /// than `caller`, are ignored.
    pub async fn revoke(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        caller: Option<&CallerContext>,
    ) -> Result<(), EngineError> {
        if token.is_empty() {
            return Ok(());
        }
        if hint == Some(TokenTypeHint::RefreshToken) {
            return self.revoke_refresh(token, caller).await;
        }

        if let Some(record) = self.tokens.find_by_access_token(token).await? {
            if !self.owned_by(&record, caller).await? {
                debug!("Ignoring revocation of a token owned by another client");
                return Ok(());
            }
            if self.tokens.revoke_by_access_token(token).await? {
                info!("Revoked access token record {}", record.id);
            }
            self.deny(token, record.access_expires_at).await;
            return Ok(());
        }

        self.revoke_refresh(token, caller).await
    }

    async fn revoke_refresh(
        &self,
        token: &str,
        caller: Option<&CallerContext>,
    ) -> Result<(), EngineError> {
        let Some(record) = self.tokens.find_by_refresh_token(token).await? else {
            debug!("Revocation of an unknown token");
            return Ok(());
        };
        if !self.owned_by(&record, caller).await? {
            debug!("Ignoring revocation of a token owned by another client");
            return Ok(());
        }
        if self.tokens.revoke_by_refresh_token(token).await? {
            info!("Revoked refresh token record {}", record.id);
        }
        Ok(())
    }

    async fn owned_by(
        &self,
        record: &TokenRecord,
        caller: Option<&CallerContext>,
    ) -> Result<bool, EngineError> {
        let Some(caller) = caller else {
            return Ok(true);
        };
        let owner = self.clients.find_by_id(&record.client_id).await?;
        Ok(owner.is_some_and(|c| c.client_id == caller.client_id))
    }

    /// Denylists an access token for the rest of its lifetime. Best effort.
    async fn deny(&self, token: &str, expires_at: DateTime<Utc>) {
        let Some(ttl) = remaining_lifetime(expires_at) else {
            return;
        };
        if let Err(e) = self.denylist.set_with_ttl(&denylist_key(token), ttl).await {
            warn!("Failed to denylist revoked access token: {}", e);
        }
    }
}
