use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use token_engine::crypto;
use token_engine::models::{Client, TokenTypeHint, User};
use token_engine::store::MemoryStore;
use token_engine::{
    ClientAuth, GrantRequest, KeyPair, KeyStore, RevocationCache, RevocationCacheError,
    TokenEngine,
};

/// The example runs without a denylist backend.
struct NoDenylist;

#[async_trait]
impl RevocationCache for NoDenylist {
    async fn set_with_ttl(&self, _: &str, _: Duration) -> Result<(), RevocationCacheError> {
        Ok(())
    }

    async fn exists(&self, _: &str) -> Result<bool, RevocationCacheError> {
        Ok(false)
    }

    async fn delete(&self, _: &str) -> Result<(), RevocationCacheError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Seed one confidential client and one user
    let store = MemoryStore::new();
    store
        .add_client(Client {
            id: "c-mobile".to_string(),
            client_id: "mobile".to_string(),
            secret_hash: Some(crypto::hash_client_secret("s3cr3t")),
            redirect_uri: None,
            scopes: Some("profile".to_string()),
            tenant_id: Some("T1".to_string()),
            created_at: Utc::now(),
        })
        .await;
    store
        .add_user(User {
            id: "u-1".to_string(),
            email: "a@b.com".to_string(),
            password_hash: crypto::hash_password("Passw0rd1")?,
        })
        .await;

    println!("Generating signing key...");
    let keys = KeyStore::new("auth-service", vec![KeyPair::generate("demo", 2048)?], "demo")?;

    let engine = TokenEngine::builder()
        .with_key_store(Arc::new(keys))
        .with_memory_store(store)
        .with_revocation_cache(Arc::new(NoDenylist))
        .build()?;

    let issued = engine
        .grant(GrantRequest::Password {
            client: ClientAuth::new("mobile", Some("s3cr3t".to_string())),
            username: "a@b.com".to_string(),
            password: "Passw0rd1".to_string(),
            scope: None,
            tenant_id: None,
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&issued)?);

    let active = engine
        .introspect(&issued.access_token, Some(TokenTypeHint::AccessToken), None)
        .await;
    println!("Introspection: {active:#?}");

    println!("{}", serde_json::to_string_pretty(&engine.jwks())?);
    Ok(())
}
