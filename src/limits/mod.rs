//! Rate limiting and quota enforcement (§4.5).

pub mod ip_limiter;
pub mod quota;

pub use ip_limiter::IpLimiter;
pub use quota::{QuotaCheck, QuotaKind, UserQuotas, check_quota};
