use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use token_engine::{RevocationCache, RevocationCacheError};

pub mod memory;
pub mod null;
pub mod redis;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Keyed presence markers with a per-entry time-to-live.
///
/// The denylist stores each revoked access token for exactly as long as the
/// token would otherwise have stayed valid.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Mark `key` as present until `ttl` elapses
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn contains(&self, key: &str) -> Result<bool, CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Deep check of the backend. Redis is pinged, the others are always healthy.
    async fn health_check(&self) -> Result<(), String>;
}

/// Backend chosen at startup from `cache.store`.
#[derive(Clone)]
pub enum Cache {
    InMemory(memory::InMemoryCache),
    Redis(redis::RedisCache),
    Null(null::NullCache),
}

impl Cache {
    fn backend(&self) -> &dyn CacheBackend {
        match self {
            Self::InMemory(cache) => cache,
            Self::Redis(cache) => cache,
            Self::Null(cache) => cache,
        }
    }

    /// Backend name for logs and readiness reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "in-memory",
            Self::Redis(_) => "redis",
            Self::Null(_) => "none",
        }
    }
}

#[async_trait]
impl CacheBackend for Cache {
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.backend().insert(key, ttl).await
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        self.backend().contains(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend().remove(key).await
    }

    async fn health_check(&self) -> Result<(), String> {
        self.backend().health_check().await
    }
}

impl From<CacheError> for RevocationCacheError {
    fn from(err: CacheError) -> Self {
        RevocationCacheError::Backend(err.to_string())
    }
}

#[async_trait]
impl RevocationCache for Cache {
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), RevocationCacheError> {
        Ok(self.insert(key, ttl).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationCacheError> {
        Ok(self.contains(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), RevocationCacheError> {
        Ok(self.remove(key).await?)
    }
}

pub async fn create_cache(config: &crate::config::AuthConfig) -> Result<Cache, CacheError> {
    use crate::config::CacheStore;

    let cache = match config.cache.store {
        CacheStore::InMemory => {
            Cache::InMemory(memory::InMemoryCache::new(config.cache.memory.capacity)?)
        }
        CacheStore::Redis => {
            if config.cache.redis.url.is_empty() {
                return Err(CacheError::Config(
                    "Redis URL is required for Redis cache".to_string(),
                ));
            }
            Cache::Redis(redis::RedisCache::new(&config.cache.redis.url).await?)
        }
        CacheStore::None => Cache::Null(null::NullCache),
    };
    Ok(cache)
}
