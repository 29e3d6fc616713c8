use super::{CacheBackend, CacheError};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;

/// Denylist markers stored as `SET key 1 EX ttl` on a shared connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connects to `redis_url` and pings the server once.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        let mut conn = conn_manager.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn insert(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        // EX takes whole seconds and rejects zero
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, 1u8, ttl_secs).await?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn_manager.clone();
        Ok(conn.exists::<_, bool>(key).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {}", err)),
        }
    }
}
