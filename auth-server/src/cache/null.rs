use super::{CacheBackend, CacheError};
use async_trait::async_trait;
use std::time::Duration;

/// Backend for `cache.store = "none"`: nothing is ever denylisted, so a revoked
/// access token stays verifiable offline until it expires.
#[derive(Clone, Debug, Default)]
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    async fn insert(&self, _key: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn contains(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
