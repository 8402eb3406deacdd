//! Cache backend abstraction: a Redis-backed implementation and a no-op
//! degradation path (§4.4 Degradation, §4.5 Backend unavailable policy).
//!
//! One trait, swappable implementations, selected at startup based on
//! [`crate::config::Config`].

use async_trait::async_trait;

/// Errors from the cache backend. Callers in the store layer log and
/// swallow these (§7 Propagation policy: "cache errors are logged and
/// swallowed").
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Minimal key/value + sorted-set operations the cache and rate-limit
/// layers need. The sorted-set methods back the sliding-window limiter
/// (§4.5); the key/value methods back entity/list caching (§4.4).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Delete all keys starting with `prefix`. Used for list-pattern
    /// invalidation fan-out.
    async fn del_prefix(&self, prefix: &str) -> Result<()>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;
    async fn zcount(&self, key: &str, min: f64, max: f64) -> Result<u64>;
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<()>;
    /// Minimum score currently stored, used to compute `retry_after`.
    async fn zmin_score(&self, key: &str) -> Result<Option<f64>>;
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()>;
}

/// `REDIS_ENABLED=false`, or no backend configured: every operation is a
/// successful no-op, and reads always miss. The core remains fully
/// functional with caching/rate-limiting disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheBackend;

#[async_trait]
impl CacheBackend for NoopCacheBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn del(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn del_prefix(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    async fn zadd(&self, _key: &str, _member: &str, _score: f64) -> Result<()> {
        Ok(())
    }

    async fn zcount(&self, _key: &str, _min: f64, _max: f64) -> Result<u64> {
        Ok(0)
    }

    async fn zremrangebyscore(&self, _key: &str, _min: f64, _max: f64) -> Result<()> {
        Ok(())
    }

    async fn zmin_score(&self, _key: &str) -> Result<Option<f64>> {
        Ok(None)
    }

    async fn expire(&self, _key: &str, _ttl_seconds: u64) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "shared-cache")]
pub mod redis_backend {
    use redis::AsyncCommands;
    use redis::aio::ConnectionManager;

    use super::{CacheBackend, CacheError, Result};

    /// Redis-backed implementation using a `ConnectionManager` so callers
    /// don't need to pool connections themselves; reconnects transparently.
    #[derive(Clone)]
    pub struct RedisCacheBackend {
        conn: ConnectionManager,
    }

    impl RedisCacheBackend {
        pub async fn connect(url: &str) -> Result<Self> {
            let client = redis::Client::open(url).map_err(|e| CacheError::Backend(e.to_string()))?;
            let conn = client
                .get_connection_manager()
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            Ok(Self { conn })
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            let mut conn = self.conn.clone();
            let pattern = format!("{prefix}*");
            conn.keys(pattern).await.map_err(|e| CacheError::Backend(e.to_string()))
        }
    }

    #[async_trait::async_trait]
    impl CacheBackend for RedisCacheBackend {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.conn.clone();
            conn.get(key).await.map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            let mut conn = self.conn.clone();
            conn.set(key, value).await.map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn del(&self, key: &str) -> Result<()> {
            let mut conn = self.conn.clone();
            conn.del(key).await.map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn del_prefix(&self, prefix: &str) -> Result<()> {
            let keys = self.keys_with_prefix(prefix).await?;
            if keys.is_empty() {
                return Ok(());
            }
            let mut conn = self.conn.clone();
            conn.del(keys).await.map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
            let mut conn = self.conn.clone();
            conn.zadd(key, member, score)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn zcount(&self, key: &str, min: f64, max: f64) -> Result<u64> {
            let mut conn = self.conn.clone();
            conn.zcount(key, min, max).await.map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<()> {
            let mut conn = self.conn.clone();
            conn.zrembyscore(key, min, max)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn zmin_score(&self, key: &str) -> Result<Option<f64>> {
            let mut conn = self.conn.clone();
            let result: Vec<(String, f64)> = conn
                .zrangebyscore_withscores(key, "-inf", "+inf")
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            Ok(result.into_iter().next().map(|(_, score)| score))
        }

        async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()> {
            let mut conn = self.conn.clone();
            conn.expire(key, ttl_seconds as i64)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))
        }
    }
}

#[cfg(feature = "shared-cache")]
pub use redis_backend::RedisCacheBackend;
