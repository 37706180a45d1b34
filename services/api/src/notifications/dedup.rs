use async_trait::async_trait;
use redis_cache::{DedupCache, RedisError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared record of which notifications have already been claimed.
///
/// `claim` must be an atomic check-and-set: of two callers racing on the
/// same key, exactly one gets `true`.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, RedisError>;
    async fn release(&self, key: &str) -> Result<(), RedisError>;
}

#[async_trait]
impl DedupStore for DedupCache {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, RedisError> {
        DedupCache::claim(self, key, ttl).await
    }

    async fn release(&self, key: &str) -> Result<(), RedisError> {
        DedupCache::release(self, key).await
    }
}

/// Single-process stand-in for Redis, with the same expiry semantics.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDedup {
    claims: Arc<Mutex<HashMap<String, Instant>>>,
}

impl InMemoryDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_claimed(&self, key: &str) -> bool {
        self.claims
            .lock()
            .await
            .get(key)
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }
}

#[async_trait]
impl DedupStore for InMemoryDedup {
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, RedisError> {
        let now = Instant::now();
        let mut claims = self.claims.lock().await;
        claims.retain(|_, expires_at| *expires_at > now);
        if claims.contains_key(key) {
            return Ok(false);
        }
        claims.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), RedisError> {
        self.claims.lock().await.remove(key);
        Ok(())
    }
}
