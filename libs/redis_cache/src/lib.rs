use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use std::time::Duration;

pub type RedisPool = Pool;

#[derive(Debug, thiserror::Error)]
pub enum RedisError {
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub async fn create_pool(redis_url: &str) -> Result<RedisPool, RedisError> {
    let cfg = Config::from_url(redis_url);
    let pool = cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| RedisError::Config(e.to_string()))?;
    Ok(pool)
}

/// Short-lived markers shared by every process that delivers notifications.
///
/// A marker is claimed with a single `SET key 1 NX EX ttl`, so two callers
/// racing on the same key can never both win.
#[derive(Clone)]
pub struct DedupCache {
    pool: RedisPool,
}

impl DedupCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Returns `true` when this caller now owns the marker, `false` when it
    /// already existed.
    pub async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, RedisError> {
        let mut conn = self.pool.get().await?;
        let ttl_seconds = ttl.as_secs().max(1);

        let reply: Option<String> = deadpool_redis::redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut *conn)
            .await?;

        Ok(reply.is_some())
    }

    pub async fn release(&self, key: &str) -> Result<(), RedisError> {
        let mut conn = self.pool.get().await?;
        let removed: i64 = conn.del(key).await?;
        if removed == 0 {
            tracing::debug!(key, "dedup marker already gone on release");
        }
        Ok(())
    }
}
