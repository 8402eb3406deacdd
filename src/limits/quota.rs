//! Per-user API and webhook quota enforcement (§4.5 Quotas).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::cache::CacheBackend;
use crate::config::QuotaConfig;
use crate::error::Error;

/// A user's quota overrides, layered over [`QuotaConfig`]'s defaults. `None`
/// means "use the default"; `Some(n)` overrides it, per-user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserQuotas {
    pub max_requests_per_minute: Option<u32>,
    pub max_requests_per_hour: Option<u32>,
    pub max_subscriptions: Option<u32>,
    pub max_events_per_minute: Option<u32>,
    pub max_subscription_requests_per_minute: Option<u32>,
    pub max_subscription_requests_per_day: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    RequestsPerMinute,
    RequestsPerHour,
    Subscriptions,
    EventsPerMinute,
    SubscriptionRequestsPerMinute,
    SubscriptionRequestsPerDay,
}

impl QuotaKind {
    fn window_secs(self) -> u64 {
        match self {
            QuotaKind::RequestsPerMinute | QuotaKind::EventsPerMinute | QuotaKind::SubscriptionRequestsPerMinute => 60,
            QuotaKind::RequestsPerHour => 3600,
            QuotaKind::SubscriptionRequestsPerDay => 86_400,
            // Subscriptions are a standing count, not a rolling rate; callers
            // pass the live count directly rather than going through the
            // windowed counter path.
            QuotaKind::Subscriptions => 0,
        }
    }

    fn limit(self, config: &QuotaConfig, overrides: &UserQuotas) -> Option<u32> {
        match self {
            QuotaKind::RequestsPerMinute => {
                Some(overrides.max_requests_per_minute.unwrap_or(config.default_max_requests_per_minute))
            }
            QuotaKind::RequestsPerHour => overrides.max_requests_per_hour.or(config.default_max_requests_per_hour),
            QuotaKind::Subscriptions => {
                Some(overrides.max_subscriptions.unwrap_or(config.default_max_subscriptions))
            }
            QuotaKind::EventsPerMinute => {
                Some(overrides.max_events_per_minute.unwrap_or(config.default_max_events_per_minute))
            }
            QuotaKind::SubscriptionRequestsPerMinute => Some(
                overrides
                    .max_subscription_requests_per_minute
                    .unwrap_or(config.default_max_subscription_requests_per_minute),
            ),
            QuotaKind::SubscriptionRequestsPerDay => Some(
                overrides
                    .max_subscription_requests_per_day
                    .unwrap_or(config.default_max_subscription_requests_per_day),
            ),
        }
    }
}

pub struct QuotaCheck {
    backend: Arc<dyn CacheBackend>,
    config: QuotaConfig,
}

impl QuotaCheck {
    pub fn new(backend: Arc<dyn CacheBackend>, config: QuotaConfig) -> Self {
        Self { backend, config }
    }

    fn key(user_id: Uuid, kind: QuotaKind) -> String {
        format!("quota:{user_id}:{kind:?}")
    }
}

fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Check and record one unit of consumption against `kind`'s rolling window
/// for `user_id`. With no cache backend configured, every check passes
/// (§4.5 Backend unavailable policy: fail open — quotas degrade gracefully
/// rather than blocking all traffic).
pub async fn check_quota(check: &QuotaCheck, user_id: Uuid, kind: QuotaKind, overrides: &UserQuotas) -> Result<(), Error> {
    let Some(limit) = kind.limit(&check.config, overrides) else {
        // No hourly cap configured at all: unlimited.
        return Ok(());
    };

    let key = QuotaCheck::key(user_id, kind);
    let now = now_secs();
    let window = kind.window_secs() as f64;
    let window_start = now - window;

    if let Err(e) = check.backend.zremrangebyscore(&key, f64::NEG_INFINITY, window_start).await {
        warn!(error = %e, "quota prune failed; continuing");
    }

    let count = match check.backend.zcount(&key, window_start, f64::INFINITY).await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "quota count read failed; failing open");
            return Ok(());
        }
    };

    if count >= limit as u64 {
        let retry_after = retry_after(check, &key, now, window).await;
        return Err(Error::rate_limited(retry_after));
    }

    let member = format!("{now}:{}", Uuid::new_v4());
    if let Err(e) = check.backend.zadd(&key, &member, now).await {
        warn!(error = %e, "quota record failed; allowing request");
        return Ok(());
    }
    if let Err(e) = check.backend.expire(&key, kind.window_secs() + 60).await {
        warn!(error = %e, "quota key TTL refresh failed");
    }

    Ok(())
}

async fn retry_after(check: &QuotaCheck, key: &str, now: f64, window: f64) -> u64 {
    let oldest = check.backend.zmin_score(key).await.ok().flatten().unwrap_or(now);
    ((oldest + window) - now).ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::NoopCacheBackend;

    #[tokio::test]
    async fn fails_open_with_no_backend() {
        let check = QuotaCheck::new(Arc::new(NoopCacheBackend), QuotaConfig::default());
        let overrides = UserQuotas::default();
        for _ in 0..200 {
            assert!(check_quota(&check, Uuid::new_v4(), QuotaKind::RequestsPerMinute, &overrides).await.is_ok());
        }
    }

    #[test]
    fn override_takes_precedence_over_default() {
        let config = QuotaConfig::default();
        let overrides = UserQuotas {
            max_requests_per_minute: Some(5),
            ..Default::default()
        };
        assert_eq!(QuotaKind::RequestsPerMinute.limit(&config, &overrides), Some(5));
    }

    #[test]
    fn default_used_when_no_override() {
        let config = QuotaConfig::default();
        let overrides = UserQuotas::default();
        assert_eq!(
            QuotaKind::RequestsPerMinute.limit(&config, &overrides),
            Some(config.default_max_requests_per_minute)
        );
    }
}
