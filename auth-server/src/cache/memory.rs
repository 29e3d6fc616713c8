use super::{CacheBackend, CacheError};
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Expires every marker after the TTL it was inserted with, which is also the
/// value stored under the key.
struct MarkerTtl;

impl Expiry<String, Duration> for MarkerTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        ttl: &Duration,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(*ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        ttl: &Duration,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(*ttl)
    }
}

#[derive(Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, Duration>,
}

impl InMemoryCache {
    /// Initialize a new in-memory cache instance bounded to `capacity_mib` MiB
    pub fn new(capacity_mib: usize) -> Result<Self, CacheError> {
        // Convert MiB to bytes for max_capacity (1 MiB = 1024 * 1024 bytes)
        let max_capacity_bytes: u64 = capacity_mib
            .checked_mul(1024 * 1024)
            .and_then(|bytes| u64::try_from(bytes).ok())
            .ok_or_else(|| {
                CacheError::Config(format!("Cache capacity of {capacity_mib} MiB is too large"))
            })?;

        let cache = MokaCache::builder()
            .expire_after(MarkerTtl)
            .weigher(|key: &String, _ttl: &Duration| -> u32 {
                (key.len() + std::mem::size_of::<Duration>())
                    .try_into()
                    .unwrap_or(u32::MAX)
            })
            .max_capacity(max_capacity_bytes)
            .build();

        Ok(Self { cache })
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), ttl).await;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
