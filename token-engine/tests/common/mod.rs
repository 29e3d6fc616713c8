#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use token_engine::crypto;
use token_engine::models::{Client, User};
use token_engine::store::MemoryStore;
use token_engine::{
    KeyPair, KeyStore, RevocationCache, RevocationCacheError, TokenEngine, TokenSettings,
};
use tokio::sync::Mutex;

pub const K1_PEM: &str = include_str!("../fixtures/signing-k1.pem");
pub const K2_PEM: &str = include_str!("../fixtures/signing-k2.pem");

pub const ISSUER: &str = "auth-service";
pub const REDIRECT: &str = "https://app.example.com/callback";
pub const SPA_REDIRECT: &str = "https://spa.example.com/cb";
pub const USER_ID: &str = "u-1";

/// Denylist backed by a map, with expiry checked on read.
#[derive(Default)]
pub struct MapDenylist {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MapDenylist {
    pub async fn contains(&self, key: &str) -> bool {
        self.exists(key).await.unwrap_or(false)
    }

    pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl RevocationCache for MapDenylist {
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), RevocationCacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationCacheError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .is_some_and(|deadline| *deadline > Instant::now()))
    }

    async fn delete(&self, key: &str) -> Result<(), RevocationCacheError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Denylist whose backend is always down.
pub struct BrokenDenylist;

#[async_trait]
impl RevocationCache for BrokenDenylist {
    async fn set_with_ttl(&self, _: &str, _: Duration) -> Result<(), RevocationCacheError> {
        Err(RevocationCacheError::Backend("connection refused".into()))
    }

    async fn exists(&self, _: &str) -> Result<bool, RevocationCacheError> {
        Err(RevocationCacheError::Backend("connection refused".into()))
    }

    async fn delete(&self, _: &str) -> Result<(), RevocationCacheError> {
        Err(RevocationCacheError::Backend("connection refused".into()))
    }
}

pub struct Fixture {
    pub engine: TokenEngine,
    pub store: MemoryStore,
    pub denylist: Arc<MapDenylist>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_settings(TokenSettings::default()).await
    }

    pub async fn with_settings(settings: TokenSettings) -> Self {
        let denylist = Arc::new(MapDenylist::default());
        let (engine, store) = build_engine(settings, denylist.clone()).await;
        Self {
            engine,
            store,
            denylist,
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn key_store() -> KeyStore {
    KeyStore::new(
        ISSUER,
        vec![
            KeyPair::from_pem("k1", K1_PEM).unwrap(),
            KeyPair::from_pem("k2", K2_PEM).unwrap(),
        ],
        "k1",
    )
    .unwrap()
}

pub async fn build_engine(
    settings: TokenSettings,
    denylist: Arc<dyn RevocationCache>,
) -> (TokenEngine, MemoryStore) {
    init_logging();
    let store = seeded_store().await;
    let engine = TokenEngine::builder()
        .with_key_store(Arc::new(key_store()))
        .with_memory_store(store.clone())
        .with_revocation_cache(denylist)
        .with_settings(settings)
        .build()
        .unwrap();
    (engine, store)
}

fn client(
    id: &str,
    client_id: &str,
    secret: Option<&str>,
    redirect_uri: Option<&str>,
    tenant_id: Option<&str>,
    scopes: Option<&str>,
) -> Client {
    Client {
        id: id.to_string(),
        client_id: client_id.to_string(),
        secret_hash: secret.map(crypto::hash_client_secret),
        redirect_uri: redirect_uri.map(str::to_string),
        scopes: scopes.map(str::to_string),
        tenant_id: tenant_id.map(str::to_string),
        created_at: Utc::now(),
    }
}

/// Clients:
/// - `mobile`: confidential, secret `s3cr3t`, tenant T1, registered redirect
/// - `billing`: confidential, secret `b1ll1ng`, tenant T1, default scopes
/// - `spa`: public, tenant T1, registered redirect
/// - `orphan`: confidential, secret `0rphan`, no tenant, no redirect
///
/// User `a@b.com` / `Passw0rd1` with id `u-1`.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .add_client(client(
            "c-mobile",
            "mobile",
            Some("s3cr3t"),
            Some(REDIRECT),
            Some("T1"),
            None,
        ))
        .await;
    store
        .add_client(client(
            "c-billing",
            "billing",
            Some("b1ll1ng"),
            None,
            Some("T1"),
            Some("invoices:read invoices:write"),
        ))
        .await;
    store
        .add_client(client(
            "c-spa",
            "spa",
            None,
            Some(SPA_REDIRECT),
            Some("T1"),
            None,
        ))
        .await;
    store
        .add_client(client("c-orphan", "orphan", Some("0rphan"), None, None, None))
        .await;
    store
        .add_user(User {
            id: USER_ID.to_string(),
            email: "a@b.com".to_string(),
            password_hash: crypto::hash_password("Passw0rd1").unwrap(),
        })
        .await;
    store
}
