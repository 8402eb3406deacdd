//! Core domain types shared across the resource store, authorization
//! resolver, and cache layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A role granted to a principal on a threat model, ordered by privilege
/// (`Reader < Writer < Owner`) so `max` picks the highest of several
/// group-derived roles (§4.2 role resolution, step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Owner,
}

impl Role {
    pub fn at_least(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Owner => "owner",
        };
        f.write_str(s)
    }
}

/// Entity kinds addressed by the store layer and cache-invalidation fan-out.
/// `as_str` values are the wire/cache-key representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    ThreatModel,
    Diagram,
    Cell,
    Threat,
    Document,
    Source,
    Note,
    Asset,
    Repository,
    Metadata,
    SurveyResponse,
    TriageNote,
    Group,
    Administrator,
    User,
    WebhookSubscription,
    WebhookDelivery,
    WebhookQuota,
    ApiQuota,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::ThreatModel => "threat_model",
            EntityType::Diagram => "diagram",
            EntityType::Cell => "cell",
            EntityType::Threat => "threat",
            EntityType::Document => "document",
            EntityType::Source => "source",
            EntityType::Note => "note",
            EntityType::Asset => "asset",
            EntityType::Repository => "repository",
            EntityType::Metadata => "metadata",
            EntityType::SurveyResponse => "survey_response",
            EntityType::TriageNote => "triage_note",
            EntityType::Group => "group",
            EntityType::Administrator => "administrator",
            EntityType::User => "user",
            EntityType::WebhookSubscription => "webhook_subscription",
            EntityType::WebhookDelivery => "webhook_delivery",
            EntityType::WebhookQuota => "webhook_quota",
            EntityType::ApiQuota => "api_quota",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The principal-kind half of an authorization entry's subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Group,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_picks_highest() {
        let roles = [Role::Reader, Role::Owner, Role::Writer];
        assert_eq!(roles.iter().copied().max(), Some(Role::Owner));
    }

    #[test]
    fn role_at_least_is_reflexive_and_monotonic() {
        assert!(Role::Writer.at_least(Role::Writer));
        assert!(Role::Owner.at_least(Role::Writer));
        assert!(!Role::Reader.at_least(Role::Writer));
    }
}
