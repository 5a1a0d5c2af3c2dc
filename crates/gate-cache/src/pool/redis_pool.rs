//! Redis connection pool
//!
//! Backs the abuse-control counters. The operations exposed here are the
//! atomic primitives the counters need (pipelined INCR+EXPIRE, TTL'd set,
//! multi-delete); the abuse store composes them but never touches redis
//! commands directly.

use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&gate_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &gate_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        // Credentials stay out of the logs
        let safe_url = config.url.split('@').next_back().unwrap_or(&config.url);
        tracing::info!(
            url = %safe_url,
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    /// Create a new Redis pool from the application configuration
    pub fn from_config(config: &gate_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Check if the pool is healthy by pinging Redis
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Atomically increment a counter and refresh its TTL window.
    ///
    /// INCR + EXPIRE run in one MULTI/EXEC block: concurrent callers may both
    /// observe a bumped value (overcount, fine) but an increment can never be
    /// lost (undercount, not fine).
    pub async fn incr_with_window(&self, key: &str, ttl_seconds: u64) -> RedisResult<u64> {
        let mut conn = self.get().await?;
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .expire(key, ttl_seconds as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Set a string value with a TTL
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.get().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    /// Get a string value by key
    pub async fn get_string(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Get a counter value by key
    pub async fn get_counter(&self, key: &str) -> RedisResult<Option<u64>> {
        let mut conn = self.get().await?;
        let value: Option<u64> = conn.get(key).await?;
        Ok(value)
    }

    /// Delete multiple keys, returning how many existed
    pub async fn delete_many(&self, keys: &[&str]) -> RedisResult<i32> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get().await?;
        let deleted: i32 = conn.del(keys).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisPoolConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.max_connections, 16);
    }

    #[test]
    fn test_config_from_app_config() {
        let redis_config = gate_common::RedisConfig {
            url: "redis://localhost:6380".to_string(),
            max_connections: 32,
        };
        let pool_config = RedisPoolConfig::from(&redis_config);
        assert_eq!(pool_config.url, "redis://localhost:6380");
        assert_eq!(pool_config.max_connections, 32);
    }

    #[tokio::test]
    async fn test_operations_error_when_unreachable() {
        // Pool construction is offline; commands against a closed port must
        // surface an error for the service layer's fail-open conversion.
        let pool = RedisPool::new(RedisPoolConfig {
            url: "redis://127.0.0.1:1".to_string(),
            max_connections: 1,
        })
        .unwrap();

        assert!(pool.health_check().await.is_err());
        assert!(pool.incr_with_window("k", 60).await.is_err());
        assert!(pool.get_string("k").await.is_err());
    }
}
