//! Cache key generation (§4.4 Layers).

use uuid::Uuid;

use crate::types::EntityType;

pub fn entity_key(entity_type: EntityType, id: Uuid) -> String {
    format!("cache:{entity_type}:{id}")
}

pub fn metadata_key(entity_type: EntityType, id: Uuid) -> String {
    format!("cache:metadata:{entity_type}:{id}")
}

pub fn auth_key(threat_model_id: Uuid) -> String {
    format!("cache:auth:{threat_model_id}")
}

/// `list:<entity_type>:<parent_id>:<offset>:<limit>:<fingerprint>`.
/// `parent_id` is rendered as `"-"` for top-level lists with no parent.
pub fn list_key(entity_type: EntityType, parent_id: Option<Uuid>, offset: u64, limit: u64, fingerprint: &str) -> String {
    let parent = parent_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
    format!("list:{entity_type}:{parent}:{offset}:{limit}:{fingerprint}")
}

/// Prefix matching every list key for `entity_type` scoped to `parent_id`,
/// used by the invalidator's pattern generation (any offset/limit/filter).
pub fn list_prefix(entity_type: EntityType, parent_id: Option<Uuid>) -> String {
    let parent = parent_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
    format!("list:{entity_type}:{parent}:")
}

/// A stable fingerprint for a filter set, used as the last list-key
/// component. Order-independent: callers pass pre-sorted `(key, value)`
/// pairs so that equivalent filters always hash identically.
pub fn filter_fingerprint(pairs: &[(&str, &str)]) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    for (k, v) in pairs {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_matches_expected_shape() {
        let id = Uuid::nil();
        assert_eq!(entity_key(EntityType::ThreatModel, id), format!("cache:threat_model:{id}"));
    }

    #[test]
    fn list_key_uses_dash_for_no_parent() {
        let key = list_key(EntityType::ThreatModel, None, 0, 50, "abc");
        assert_eq!(key, "list:threat_model:-:0:50:abc");
    }

    #[test]
    fn filter_fingerprint_is_order_independent_for_same_pairs() {
        let a = filter_fingerprint(&[("provider", "local"), ("name", "x")]);
        let b = filter_fingerprint(&[("provider", "local"), ("name", "x")]);
        assert_eq!(a, b);
    }

    #[test]
    fn list_prefix_is_a_prefix_of_list_key() {
        let parent = Uuid::new_v4();
        let prefix = list_prefix(EntityType::Diagram, Some(parent));
        let key = list_key(EntityType::Diagram, Some(parent), 10, 20, "fp");
        assert!(key.starts_with(&prefix));
    }
}
