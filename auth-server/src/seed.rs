//! Startup seeding of the in-memory store from a JSON document.
//!
//! ```json
//! {
//!   "clients": [
//!     { "client_id": "mobile", "secret": "s3cr3t", "tenant_id": "T1",
//!       "redirect_uri": "https://app.example.com/callback", "scopes": "read write" }
//!   ],
//!   "users": [ { "id": "u-1", "email": "a@b.com", "password": "Passw0rd1" } ]
//! }
//! ```
//!
//! Secrets and passwords are given in plain text and hashed on load. A client
//! without a secret is public.

use chrono::Utc;
use log::info;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use token_engine::crypto;
use token_engine::models::{Client, User};
use token_engine::store::MemoryStore;
use token_engine::PasswordHashError;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to hash password of user '{user}': {source}")]
    Hash {
        user: String,
        source: PasswordHashError,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub clients: Vec<SeedClient>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedClient {
    /// Internal id; defaults to `client_id`.
    pub id: Option<String>,
    pub client_id: String,
    pub secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub email: String,
    pub password: String,
}

impl SeedDocument {
    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Hashes the credentials and adds every entry to `store`.
    pub async fn apply(self, store: &MemoryStore) -> Result<(), SeedError> {
        let (clients, users) = (self.clients.len(), self.users.len());

        for seed in self.clients {
            let client = Client {
                id: seed.id.unwrap_or_else(|| seed.client_id.clone()),
                secret_hash: seed
                    .secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(crypto::hash_client_secret),
                client_id: seed.client_id,
                redirect_uri: seed.redirect_uri,
                scopes: seed.scopes,
                tenant_id: seed.tenant_id,
                created_at: Utc::now(),
            };
            store.add_client(client).await;
        }

        for seed in self.users {
            let password_hash =
                crypto::hash_password(&seed.password).map_err(|source| SeedError::Hash {
                    user: seed.id.clone(),
                    source,
                })?;
            store
                .add_user(User {
                    id: seed.id,
                    email: seed.email,
                    password_hash,
                })
                .await;
        }

        info!("Seeded {} clients and {} users", clients, users);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use token_engine::store::{ClientStore, UserStore};

    const DOCUMENT: &str = r#"{
        "clients": [
            { "client_id": "mobile", "secret": "s3cr3t", "tenant_id": "T1" },
            { "id": "c-spa", "client_id": "spa", "redirect_uri": "https://spa.example.com/cb" }
        ],
        "users": [ { "id": "u-1", "email": "a@b.com", "password": "Passw0rd1" } ]
    }"#;

    #[tokio::test]
    async fn test_apply_hashes_credentials() {
        let document: SeedDocument = serde_json::from_str(DOCUMENT).unwrap();
        let store = MemoryStore::new();
        document.apply(&store).await.unwrap();

        let mobile = store.find_by_client_id("mobile").await.unwrap().unwrap();
        assert_eq!(mobile.id, "mobile");
        let hash = mobile.secret_hash.unwrap();
        assert_ne!(hash, "s3cr3t");
        assert!(crypto::verify_client_secret(&hash, "s3cr3t"));

        let spa = store.find_by_client_id("spa").await.unwrap().unwrap();
        assert_eq!(spa.id, "c-spa");
        assert!(spa.is_public());

        let user = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert!(crypto::verify_password(&user.password_hash, "Passw0rd1"));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let document: SeedDocument = serde_json::from_str("{}").unwrap();
        assert!(document.clients.is_empty());
        assert!(document.users.is_empty());
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let dir = std::env::temp_dir().join(format!("auth-seed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seed.json");
        std::fs::write(&path, "{ \"clients\": [ { \"secret\": 1 } ] }").unwrap();

        assert!(matches!(
            SeedDocument::from_file(&path),
            Err(SeedError::Parse(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
