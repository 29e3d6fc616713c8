use confique::Config;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

/// Specifies which cache store backs the revocation denylist
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStore {
    #[default]
    InMemory,
    Redis,
    None,
}

#[derive(Debug, Error)]
#[error("unknown cache store '{0}', expected one of: in-memory, redis, none")]
pub struct UnknownCacheStore(String);

impl FromStr for CacheStore {
    type Err = UnknownCacheStore;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-memory" => Ok(CacheStore::InMemory),
            "redis" => Ok(CacheStore::Redis),
            "none" => Ok(CacheStore::None),
            other => Err(UnknownCacheStore(other.to_string())),
        }
    }
}

/// Configuration for the denylist cache
#[derive(Debug, Config, Clone)]
pub struct CacheConfig {
    /// Cache store type: "in-memory" (default), "redis" or "none"
    #[config(env = "AUTH_CACHE_STORE", parse_env = CacheStore::from_str, default = "in-memory")]
    pub store: CacheStore,

    /// In-memory cache specific configuration
    #[config(nested)]
    pub memory: InMemoryConfig,

    /// Redis cache specific configuration
    #[config(nested)]
    pub redis: RedisConfig,
}

/// In-memory cache configuration options
#[derive(Debug, Config, Clone)]
pub struct InMemoryConfig {
    /// Maximum capacity in MiB (default: 128 MiB)
    #[config(env = "AUTH_CACHE_MEMORY_CAPACITY", default = 128)]
    pub capacity: usize,
}

/// Redis cache configuration options
#[derive(Debug, Config, Clone)]
pub struct RedisConfig {
    /// Redis connection string
    #[config(env = "AUTH_CACHE_REDIS_URL", default = "")]
    pub url: String,
}
