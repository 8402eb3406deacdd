//! Named validator registry (§4.6).
//!
//! Per-endpoint config selects validators by name from this registry rather
//! than hard-coding validation logic into each handler. Each validator is a
//! pure function `&Value -> Result<(), Error>` keyed by a stable name.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::Value;

use crate::authz::AuthorizationEntry;
use crate::error::{Error, ErrorKind};
use crate::types::Role;

pub type Validator = fn(&Value) -> Result<(), Error>;

static REGISTRY: LazyLock<BTreeMap<&'static str, Validator>> = LazyLock::new(|| {
    let mut m: BTreeMap<&'static str, Validator> = BTreeMap::new();
    m.insert("email", email as Validator);
    m.insert("uuid", uuid as Validator);
    m.insert("url", url as Validator);
    m.insert("metadata_key", metadata_key as Validator);
    m.insert("diagram_type", diagram_type as Validator);
    m.insert("threat_severity", threat_severity as Validator);
    m.insert("score_precision", score_precision as Validator);
    m.insert("asset_type", asset_type as Validator);
    m.insert("authorization_entries", authorization_entries as Validator);
    m.insert("no_injection", no_injection as Validator);
    m.insert("max_events_per_minute", max_events_per_minute as Validator);
    m
});

/// Look up a validator by its registered name.
pub fn lookup(name: &str) -> Option<Validator> {
    REGISTRY.get(name).copied()
}

fn as_str(value: &Value, field: &str) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_input(format!("{field} must be a string")))
}

pub fn email(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "email")?;
    let valid = s.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    });
    if valid {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::InvalidInput, format!("invalid email format: {s}")))
    }
}

pub fn uuid(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "id")?;
    uuid::Uuid::parse_str(&s).map(|_| ()).map_err(|_| {
        Error::new(ErrorKind::InvalidUuid, format!("invalid UUID: {s}"))
    })
}

pub fn url(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "url")?;
    let valid = s.starts_with("http://") || s.starts_with("https://");
    if valid && s.len() > "https://".len() {
        Ok(())
    } else {
        Err(Error::invalid_input(format!("invalid URL: {s}")))
    }
}

/// Metadata keys are non-empty, ASCII alphanumeric plus `_`/`-`/`.`, capped
/// at 128 characters.
pub fn metadata_key(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "key")?;
    let valid = !s.is_empty()
        && s.len() <= 128
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_input(format!("invalid metadata key: {s}")))
    }
}

const DIAGRAM_TYPES: &[&str] = &["DFD", "Sequence", "AttackTree"];

pub fn diagram_type(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "diagram_type")?;
    if DIAGRAM_TYPES.contains(&s.as_str()) {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "invalid diagram type '{s}', expected one of {DIAGRAM_TYPES:?}"
        )))
    }
}

const THREAT_SEVERITIES: &[&str] = &["Low", "Medium", "High", "Critical"];

pub fn threat_severity(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "severity")?;
    if THREAT_SEVERITIES.contains(&s.as_str()) {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "invalid threat severity '{s}', expected one of {THREAT_SEVERITIES:?}"
        )))
    }
}

/// Scores are fixed-point with at most one decimal place in `[0.0, 10.0]`.
pub fn score_precision(value: &Value) -> Result<(), Error> {
    let score = value
        .as_f64()
        .ok_or_else(|| Error::invalid_input("score must be a number"))?;
    if !(0.0..=10.0).contains(&score) {
        return Err(Error::invalid_input("score must be between 0.0 and 10.0"));
    }
    let scaled = (score * 10.0).round();
    if (scaled - score * 10.0).abs() > f64::EPSILON {
        return Err(Error::invalid_input("score must have at most one decimal place"));
    }
    Ok(())
}

const ASSET_TYPES: &[&str] = &["Database", "Service", "DataStore", "ExternalEntity", "Process"];
const MAX_ASSET_ARRAY_LEN: usize = 100;

/// Validates `{ "type": <enum>, "tags": [...] }`-shaped asset payloads,
/// including the array-length cap on the `tags` field.
pub fn asset_type(value: &Value) -> Result<(), Error> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid_input("asset payload must be an object"))?;

    if let Some(t) = obj.get("type") {
        let t = as_str(t, "type")?;
        if !ASSET_TYPES.contains(&t.as_str()) {
            return Err(Error::invalid_input(format!(
                "invalid asset type '{t}', expected one of {ASSET_TYPES:?}"
            )));
        }
    }

    if let Some(Value::Array(tags)) = obj.get("tags")
        && tags.len() > MAX_ASSET_ARRAY_LEN
    {
        return Err(Error::invalid_input(format!(
            "tags array exceeds maximum length of {MAX_ASSET_ARRAY_LEN}"
        )));
    }

    Ok(())
}

/// Authorization-entry well-formedness: valid role enum, non-empty
/// `provider_id`, and no duplicate `provider_id` across entries (the
/// store-level duplicate check in `authz::policy` re-verifies this at
/// write time; this is the earlier, cheaper payload-shape check).
pub fn authorization_entries(value: &Value) -> Result<(), Error> {
    let entries: Vec<AuthorizationEntry> =
        serde_json::from_value(value.clone()).map_err(|e| Error::invalid_input(format!("invalid authorization entries: {e}")))?;

    for entry in &entries {
        if entry.provider_id.trim().is_empty() {
            return Err(Error::invalid_input("authorization entry provider_id must not be empty"));
        }
        if !matches!(entry.role, Role::Owner | Role::Writer | Role::Reader) {
            return Err(Error::invalid_input("authorization entry role must be owner, writer, or reader"));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.provider_id.clone()) {
            return Err(Error::invalid_input(format!(
                "Duplicate authorization subject: {}",
                entry.provider_id
            )));
        }
    }

    Ok(())
}

/// Rejects an admin-supplied `max_events_per_minute` quota override above
/// [`crate::config::MAX_EVENTS_PER_MINUTE_CEILING`] (§4.5 quota ceilings).
pub fn max_events_per_minute(value: &Value) -> Result<(), Error> {
    let n = value.as_u64().ok_or_else(|| Error::invalid_input("max_events_per_minute must be a non-negative integer"))?;
    if n > crate::config::MAX_EVENTS_PER_MINUTE_CEILING as u64 {
        return Err(Error::invalid_input(format!(
            "max_events_per_minute must not exceed {}",
            crate::config::MAX_EVENTS_PER_MINUTE_CEILING
        )));
    }
    Ok(())
}

/// Runs the HTML/template-injection scan from [`crate::validation::patterns`]
/// against a string field, after stripping fenced/inline code blocks.
pub fn no_injection(value: &Value) -> Result<(), Error> {
    let s = as_str(value, "text")?;
    let stripped = crate::validation::html_policy::strip_code_blocks(&s);
    let hits = crate::validation::patterns::scan(&stripped);
    if hits.is_empty() {
        Ok(())
    } else {
        let ids: Vec<&str> = hits.iter().map(|m| m.id).collect();
        Err(Error::invalid_input(format!(
            "content matched injection pattern(s): {}",
            ids.join(", ")
        )))
    }
}
