//! Sliding-window IP rate limiter (§4.5 IP limiting).
//!
//! Backed by a cache sorted set keyed per IP: each allowed request appends a
//! member scored by its arrival time; `zcount` over the current window gives
//! the request count without needing a separate counter key.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;
use uuid::Uuid;

use crate::cache::CacheBackend;
use crate::config::RateLimitConfig;
use crate::error::Error;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub struct IpLimiter {
    backend: Arc<dyn CacheBackend>,
    config: RateLimitConfig,
}

impl IpLimiter {
    pub fn new(backend: Arc<dyn CacheBackend>, config: RateLimitConfig) -> Self {
        Self { backend, config }
    }

    fn key(ip: &str) -> String {
        format!("ratelimit:ip:{ip}")
    }

    /// Check and record one request from `ip`. Returns `Ok(())` when the
    /// request is allowed, or `Err(Error::rate_limited(retry_after))` when
    /// the IP has exceeded [`RateLimitConfig::ip_limit`] within the window.
    ///
    /// With no cache backend configured, every request is allowed (§4.5
    /// Backend unavailable policy: fail open).
    pub async fn check(&self, ip: &str) -> Result<(), Error> {
        let key = Self::key(ip);
        let now = now_secs();
        let window_start = now - self.config.ip_window.as_secs_f64();

        if let Err(e) = self.backend.zremrangebyscore(&key, f64::NEG_INFINITY, window_start).await {
            warn!(error = %e, "rate limiter prune failed; continuing");
        }

        let count = match self.backend.zcount(&key, window_start, f64::INFINITY).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "rate limiter count read failed; failing open");
                return Ok(());
            }
        };

        if count >= self.config.ip_limit as u64 {
            let retry_after = self.retry_after(&key, now).await;
            return Err(Error::rate_limited(retry_after));
        }

        let member = format!("{now}:{}", Uuid::new_v4());
        if let Err(e) = self.backend.zadd(&key, &member, now).await {
            warn!(error = %e, "rate limiter record failed; allowing request");
            return Ok(());
        }
        let ttl = self.config.ip_window.as_secs() + 60;
        if let Err(e) = self.backend.expire(&key, ttl).await {
            warn!(error = %e, "rate limiter key TTL refresh failed");
        }

        Ok(())
    }

    /// Seconds until the oldest entry in the window expires, clamped to a
    /// minimum of 1 so callers never see `Retry-After: 0`.
    async fn retry_after(&self, key: &str, now: f64) -> u64 {
        let oldest = self.backend.zmin_score(key).await.ok().flatten().unwrap_or(now);
        let window = self.config.ip_window.as_secs_f64();
        let remaining = (oldest + window) - now;
        remaining.ceil().max(1.0) as u64
    }
}
