pub mod models;
pub mod schema;

use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use std::time::Duration;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type DbConnection = bb8::PooledConnection<'static, AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database pool error: {0}")]
    Pool(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),

    #[error("Database query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Pool tuning for the withdrawal service.
///
/// Connections are held for the whole lifetime of a withdrawal transaction
/// (row lock included), so the pool is sized for concurrent submissions plus
/// one sweep.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    pub connection_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 20,
            min_idle: Some(5),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

pub async fn create_pool(database_url: &str) -> Result<DbPool, DbError> {
    create_pool_with(database_url, PoolOptions::default()).await
}

pub async fn create_pool_with(database_url: &str, options: PoolOptions) -> Result<DbPool, DbError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);

    tracing::debug!(max_size = options.max_size, "creating postgres pool");

    Pool::builder()
        .max_size(options.max_size)
        .min_idle(options.min_idle)
        .connection_timeout(options.connection_timeout)
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_on_check_out(true)
        .build(config)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))
}
