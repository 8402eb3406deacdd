//! Prohibited-field rejection for write payloads (§4.6).
//!
//! Per-endpoint config names fields a client must never set directly
//! (`owner`, `diagrams`, server-managed timestamps, ...). Every violation
//! found is collected into one response, rather than short-circuiting on
//! the first, per the §9 validation-pipeline design note.

use serde_json::Value;

use crate::error::{Error, ErrorKind};

/// A single prohibited-field rule: the JSON pointer-ish dotted path and the
/// message shown to the client when it is set.
#[derive(Debug, Clone)]
pub struct ProhibitedField {
    pub path: &'static str,
    pub message: &'static str,
}

impl ProhibitedField {
    pub const fn new(path: &'static str, message: &'static str) -> Self {
        Self { path, message }
    }
}

/// Prohibited fields for `POST /threat_models` and `PUT /threat_models/{id}`.
pub fn threat_model_prohibited_fields() -> Vec<ProhibitedField> {
    vec![
        ProhibitedField::new("owner", "owner is set automatically on POST"),
        ProhibitedField::new("diagrams", "diagrams must be managed via sub-entity endpoints"),
        ProhibitedField::new("threats", "threats must be managed via sub-entity endpoints"),
        ProhibitedField::new("documents", "documents must be managed via sub-entity endpoints"),
        ProhibitedField::new("sources", "sources must be managed via sub-entity endpoints"),
        ProhibitedField::new("id", "id is generated by the server"),
        ProhibitedField::new("created_at", "created_at is managed by the server"),
        ProhibitedField::new("modified_at", "modified_at is managed by the server"),
    ]
}

/// Check `payload` against `rules`, returning every violation combined into
/// a single `invalid_input` error (details.context carries the list of
/// offending paths), or `Ok(())` if none are set.
pub fn check_prohibited_fields(payload: &Value, rules: &[ProhibitedField]) -> Result<(), Error> {
    let Value::Object(map) = payload else {
        return Ok(());
    };

    let mut violations = Vec::new();
    for rule in rules {
        if map.contains_key(rule.path) {
            violations.push(format!("{}: {}", rule.path, rule.message));
        }
    }

    if violations.is_empty() {
        return Ok(());
    }

    let mut details = crate::error::ErrorDetails::default();
    for (i, v) in violations.iter().enumerate() {
        details.context.insert(format!("violation_{i}"), v.clone());
    }

    Err(Error::new(ErrorKind::InvalidInput, violations.join("; ")).with_details(details))
}
