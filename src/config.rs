//! Environment-driven configuration (§6 Environment, §4.3, §4.5).
//!
//! A struct with sane defaults, resolved from environment variables via
//! `dotenvy`, overridable field-by-field through builder methods.

use std::time::Duration;

/// Inactivity timeout floor for collaboration sessions (§3, §4.3).
pub const SESSION_INACTIVITY_FLOOR: Duration = Duration::from_secs(15);
const DEFAULT_SESSION_INACTIVITY: Duration = Duration::from_secs(300);

/// Surprisingly low relative to [`RateLimitConfig::max_events_per_minute_ceiling`];
/// preserved exactly per §9 Open Question 4 — not "corrected" to something
/// closer to the ceiling.
pub const DEFAULT_MAX_EVENTS_PER_MINUTE: u32 = 12;
pub const MAX_EVENTS_PER_MINUTE_CEILING: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    /// `REDIS_ENABLED` — toggles the shared-cache/limiter backing.
    pub redis_enabled: bool,
    pub collab: CollabConfig,
    pub rate_limit: RateLimitConfig,
    pub quota: QuotaConfig,
}

#[derive(Debug, Clone)]
pub struct CollabConfig {
    pub inactivity_timeout: Duration,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_SESSION_INACTIVITY,
        }
    }
}

impl CollabConfig {
    /// Clamp to the 15s floor from §3/§4.3/§5.
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout.max(SESSION_INACTIVITY_FLOOR);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub ip_limit: u32,
    pub ip_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            ip_limit: 100,
            ip_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub default_max_requests_per_minute: u32,
    pub default_max_requests_per_hour: Option<u32>,
    pub default_max_subscriptions: u32,
    pub default_max_events_per_minute: u32,
    pub default_max_subscription_requests_per_minute: u32,
    pub default_max_subscription_requests_per_day: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_max_requests_per_minute: 60,
            default_max_requests_per_hour: Some(1000),
            default_max_subscriptions: 10,
            default_max_events_per_minute: DEFAULT_MAX_EVENTS_PER_MINUTE,
            default_max_subscription_requests_per_minute: 30,
            default_max_subscription_requests_per_day: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self {
            redis_enabled: Self::resolve_redis_enabled(),
            collab: CollabConfig::default(),
            rate_limit: RateLimitConfig::default(),
            quota: QuotaConfig::default(),
        }
    }
}

impl Config {
    fn resolve_redis_enabled() -> bool {
        std::env::var("REDIS_ENABLED")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }

    #[must_use]
    pub fn with_collab(mut self, collab: CollabConfig) -> Self {
        self.collab = collab;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactivity_timeout_is_clamped_to_floor() {
        let cfg = CollabConfig::default().with_inactivity_timeout(Duration::from_secs(5));
        assert_eq!(cfg.inactivity_timeout, SESSION_INACTIVITY_FLOOR);
    }

    #[test]
    fn default_events_per_minute_is_below_ceiling() {
        assert!(DEFAULT_MAX_EVENTS_PER_MINUTE < MAX_EVENTS_PER_MINUTE_CEILING);
    }
}
