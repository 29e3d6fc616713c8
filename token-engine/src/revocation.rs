//! Ephemeral denylist for access tokens revoked before their natural expiry.

use crate::crypto;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevocationCacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// The three cache operations the denylist needs.
#[async_trait]
pub trait RevocationCache: Send + Sync {
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), RevocationCacheError>;

    async fn exists(&self, key: &str) -> Result<bool, RevocationCacheError>;

    async fn delete(&self, key: &str) -> Result<(), RevocationCacheError>;
}

const DENYLIST_PREFIX: &str = "bl:at:";

/// Cache key for a revoked access token. The raw token never reaches the cache.
pub fn denylist_key(token: &str) -> String {
    format!("{}{}", DENYLIST_PREFIX, crypto::sha256_hex(token))
}

/// TTL for a denylist entry: the remaining lifetime rounded up to whole seconds.
/// `None` once the token has already expired.
pub fn remaining_lifetime(expires_at: chrono::DateTime<chrono::Utc>) -> Option<Duration> {
    let remaining = expires_at - chrono::Utc::now();
    if remaining <= chrono::Duration::zero() {
        return None;
    }
    let millis = remaining.num_milliseconds().max(1) as u64;
    Some(Duration::from_secs(millis.div_ceil(1000)))
}
