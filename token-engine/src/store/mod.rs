//! Storage collaborators consumed by the engine.
//!
//! The engine never assumes a particular storage engine. Single-use operations
//! (`delete_by_code`, `revoke_by_*`) report whether *this* call removed the
//! record, so concurrent redemptions can be decided by the store.

use crate::error::StoreError;
use crate::models::{AuthorizationCode, Client, TokenRecord, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

pub use memory::MemoryStore;

/// Client lookup.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Finds a client by its public `client_id`
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>, StoreError>;

    /// Finds a client by its internal id
    async fn find_by_id(&self, id: &str) -> Result<Option<Client>, StoreError>;
}

/// Resource owner lookup and password verification.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Returns `Ok(false)` for a wrong password or an unknown user
    async fn check_password(&self, user_id: &str, password: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    async fn save(&self, code: AuthorizationCode) -> Result<(), StoreError>;

    /// Returns the code only if it expires after `now`
    async fn find_valid(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError>;

    /// Deletes the code, returning `true` only for the call that removed it
    async fn delete_by_code(&self, code: &str) -> Result<bool, StoreError>;

    /// Removes codes that expired at or before `now`
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, record: TokenRecord) -> Result<(), StoreError>;

    async fn find_by_access_token(&self, token: &str) -> Result<Option<TokenRecord>, StoreError>;

    async fn find_by_refresh_token(&self, token: &str)
        -> Result<Option<TokenRecord>, StoreError>;

    /// Removes the record owning this access token. `true` if a record was removed.
    async fn revoke_by_access_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Removes the record owning this refresh token. `true` if a record was removed.
    async fn revoke_by_refresh_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Removes records whose access and refresh deadlines have both passed
    async fn cleanup_expired(
        &self,
        now: DateTime<Utc>,
        refresh_ttl: chrono::Duration,
    ) -> Result<usize, StoreError>;
}
