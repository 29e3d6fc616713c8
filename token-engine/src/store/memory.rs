use super::{AuthCodeStore, ClientStore, TokenStore, UserStore};
use crate::crypto;
use crate::error::StoreError;
use crate::models::{AuthorizationCode, Client, TokenRecord, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    /// Keyed by public client id
    clients: HashMap<String, Client>,
    users: HashMap<String, User>,
    codes: HashMap<String, AuthorizationCode>,
    /// Keyed by record id
    tokens: HashMap<String, TokenRecord>,
    by_access: HashMap<String, String>,
    by_refresh: HashMap<String, String>,
}

impl MemoryState {
    fn remove_token(&mut self, id: &str) -> bool {
        match self.tokens.remove(id) {
            Some(record) => {
                self.by_access.remove(&record.access_token);
                if let Some(refresh) = &record.refresh_token {
                    self.by_refresh.remove(refresh);
                }
                true
            }
            None => false,
        }
    }
}

/// In-process implementation of every storage collaborator.
///
/// All mutations happen under a single write lock, which makes
/// `delete_by_code` and `revoke_by_*` atomic with respect to each other.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_client(&self, client: Client) {
        let mut state = self.state.write().await;
        state.clients.insert(client.client_id.clone(), client);
    }

    pub async fn add_user(&self, user: User) {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user);
    }

    /// Number of persisted token records
    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.state.read().await.clients.get(client_id).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Client>, StoreError> {
        let state = self.state.read().await;
        Ok(state.clients.values().find(|c| c.id == id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn check_password(&self, user_id: &str, password: &str) -> Result<bool, StoreError> {
        let hash = match self.state.read().await.users.get(user_id) {
            Some(user) => user.password_hash.clone(),
            None => return Ok(false),
        };
        // Argon2 is slow, keep it off the lock.
        Ok(crypto::verify_password(&hash, password))
    }
}

#[async_trait]
impl AuthCodeStore for MemoryStore {
    async fn save(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.codes.contains_key(&code.code) {
            return Err(StoreError::Conflict("authorization code".to_string()));
        }
        state.codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn find_valid(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .get(code)
            .filter(|c| c.expires_at > now)
            .cloned())
    }

    async fn delete_by_code(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.state.write().await.codes.remove(code).is_some())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let before = state.codes.len();
        state.codes.retain(|_, c| c.expires_at > now);
        Ok(before - state.codes.len())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn save(&self, record: TokenRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.by_access.contains_key(&record.access_token)
            || record
                .refresh_token
                .as_ref()
                .is_some_and(|r| state.by_refresh.contains_key(r))
        {
            return Err(StoreError::Conflict("token".to_string()));
        }
        state
            .by_access
            .insert(record.access_token.clone(), record.id.clone());
        if let Some(refresh) = &record.refresh_token {
            state.by_refresh.insert(refresh.clone(), record.id.clone());
        }
        state.tokens.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_by_access_token(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .by_access
            .get(token)
            .and_then(|id| state.tokens.get(id))
            .cloned())
    }

    async fn find_by_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .by_refresh
            .get(token)
            .and_then(|id| state.tokens.get(id))
            .cloned())
    }

    async fn revoke_by_access_token(&self, token: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.by_access.get(token).cloned() {
            Some(id) => Ok(state.remove_token(&id)),
            None => Ok(false),
        }
    }

    async fn revoke_by_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.by_refresh.get(token).cloned() {
            Some(id) => Ok(state.remove_token(&id)),
            None => Ok(false),
        }
    }

    async fn cleanup_expired(
        &self,
        now: DateTime<Utc>,
        refresh_ttl: chrono::Duration,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let expired: Vec<String> = state
            .tokens
            .values()
            .filter(|t| {
                t.access_expires_at <= now
                    && (t.refresh_token.is_none() || t.refresh_deadline(refresh_ttl) <= now)
            })
            .map(|t| t.id.clone())
            .collect();
        for id in &expired {
            state.remove_token(id);
        }
        debug!("Removed {} expired token records", expired.len());
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, access: &str, refresh: Option<&str>, access_ttl: Duration) -> TokenRecord {
        let now = Utc::now();
        TokenRecord {
            id: id.to_string(),
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            user_id: Some("u1".to_string()),
            client_id: "c1".to_string(),
            tenant_id: "T1".to_string(),
            scope: None,
            access_expires_at: now + access_ttl,
            refresh_expires_at: refresh.map(|_| now + access_ttl + Duration::hours(1)),
            created_at: now,
        }
    }

    fn code(value: &str, ttl: Duration) -> AuthorizationCode {
        AuthorizationCode {
            code: value.to_string(),
            user_id: "u1".to_string(),
            client_id: "c1".to_string(),
            tenant_id: "T1".to_string(),
            code_challenge: None,
            code_challenge_method: None,
            redirect_uri: None,
            scope: None,
            expires_at: Utc::now() + ttl,
        }
    }

    #[tokio::test]
    async fn test_token_lookup_and_revoke() {
        let store = MemoryStore::new();
        TokenStore::save(&store, record("t1", "at1", Some("rt1"), Duration::minutes(5)))
            .await
            .unwrap();

        assert!(store.find_by_access_token("at1").await.unwrap().is_some());
        assert!(store.find_by_refresh_token("rt1").await.unwrap().is_some());

        assert!(store.revoke_by_refresh_token("rt1").await.unwrap());
        // The whole pair goes away
        assert!(store.find_by_access_token("at1").await.unwrap().is_none());
        // Second revocation reports that nothing was removed
        assert!(!store.revoke_by_refresh_token("rt1").await.unwrap());
        assert!(!store.revoke_by_access_token("at1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_token_rejected() {
        let store = MemoryStore::new();
        TokenStore::save(&store, record("t1", "at1", None, Duration::minutes(5)))
            .await
            .unwrap();
        let err = TokenStore::save(&store, record("t2", "at1", None, Duration::minutes(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_code_find_valid_respects_expiry() {
        let store = MemoryStore::new();
        AuthCodeStore::save(&store, code("live", Duration::minutes(5)))
            .await
            .unwrap();
        AuthCodeStore::save(&store, code("stale", Duration::seconds(-1)))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.find_valid("live", now).await.unwrap().is_some());
        assert!(store.find_valid("stale", now).await.unwrap().is_none());

        assert_eq!(AuthCodeStore::cleanup_expired(&store, now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_code_delete_has_single_winner() {
        let store = MemoryStore::new();
        AuthCodeStore::save(&store, code("once", Duration::minutes(5)))
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.delete_by_code("once").await.unwrap() },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_refresh_tokens() {
        let store = MemoryStore::new();
        // Access expired but refresh still valid
        TokenStore::save(&store, record("t1", "at1", Some("rt1"), Duration::seconds(-10)))
            .await
            .unwrap();
        // Client-credentials token, expired
        TokenStore::save(&store, record("t2", "at2", None, Duration::seconds(-10)))
            .await
            .unwrap();

        let removed = TokenStore::cleanup_expired(&store, Utc::now(), Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.token_count().await, 1);
        assert!(store.find_by_refresh_token("rt1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_check_password() {
        let store = MemoryStore::new();
        store
            .add_user(User {
                id: "u1".to_string(),
                email: "a@b.com".to_string(),
                password_hash: crypto::hash_password("Passw0rd1").unwrap(),
            })
            .await;

        let user = store.find_by_email("A@B.com").await.unwrap().unwrap();
        assert!(store.check_password(&user.id, "Passw0rd1").await.unwrap());
        assert!(!store.check_password(&user.id, "nope").await.unwrap());
        assert!(!store.check_password("missing", "Passw0rd1").await.unwrap());
    }
}
