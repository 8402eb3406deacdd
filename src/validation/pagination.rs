//! List-endpoint query parameter handling (§6 Query parameters on list
//! endpoints, §8 boundary behaviors).

use chrono::{DateTime, Utc};

use crate::error::{Error, ErrorKind};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 1000;

/// Admin group-list's own ceiling (§8: "`limit>200` on admin group list ->
/// 400 `invalid_limit`"), tighter than and rejecting rather than clamping
/// like the generic [`MAX_LIMIT`].
pub const ADMIN_GROUP_LIST_MAX_LIMIT: u64 = 200;

/// `limit` defaults to 50 when absent, is bounded at [`MAX_LIMIT`], and any
/// negative or unparsable value is rejected (§8: "Invalid `limit`/`offset`
/// return 400").
pub fn parse_limit(raw: Option<&str>) -> Result<u64, Error> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LIMIT);
    };
    let value: i64 = raw.parse().map_err(|_| Error::new(ErrorKind::InvalidLimit, format!("invalid limit: {raw}")))?;
    if value < 0 {
        return Err(Error::new(ErrorKind::InvalidLimit, "limit must be >= 0"));
    }
    Ok((value as u64).min(MAX_LIMIT))
}

/// `limit` for the admin group-list endpoint: same defaulting and
/// negative/unparsable rejection as [`parse_limit`], but values above
/// [`ADMIN_GROUP_LIST_MAX_LIMIT`] are rejected outright rather than
/// clamped (§8).
pub fn parse_group_list_limit(raw: Option<&str>) -> Result<u64, Error> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LIMIT);
    };
    let value: i64 = raw.parse().map_err(|_| Error::new(ErrorKind::InvalidLimit, format!("invalid limit: {raw}")))?;
    if value < 0 {
        return Err(Error::new(ErrorKind::InvalidLimit, "limit must be >= 0"));
    }
    let value = value as u64;
    if value > ADMIN_GROUP_LIST_MAX_LIMIT {
        return Err(Error::new(ErrorKind::InvalidLimit, format!("limit must not exceed {ADMIN_GROUP_LIST_MAX_LIMIT}")));
    }
    Ok(value)
}

/// `offset` defaults to 0, must be >= 0 (§8: "`offset<0` -> 400
/// `invalid_offset`").
pub fn parse_offset(raw: Option<&str>) -> Result<u64, Error> {
    let Some(raw) = raw else {
        return Ok(0);
    };
    let value: i64 = raw.parse().map_err(|_| Error::new(ErrorKind::InvalidOffset, format!("invalid offset: {raw}")))?;
    if value < 0 {
        return Err(Error::new(ErrorKind::InvalidOffset, "offset must be >= 0"));
    }
    Ok(value as u64)
}

/// Parses an RFC3339 timestamp filter value. Unlike limit/offset, an
/// unparsable timestamp is not an error: it is silently dropped from the
/// filter set (§8: "Invalid RFC3339 timestamps in filter params are
/// silently dropped (no 400)").
pub fn parse_timestamp_filter(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Unknown `sort_order` values fall back to `Asc` rather than erroring,
/// consistent with the "unknown params are silently ignored" rule.
pub fn parse_sort_order(raw: Option<&str>) -> SortOrder {
    match raw {
        Some("desc") => SortOrder::Desc,
        _ => SortOrder::Asc,
    }
}
