//! Owner-change invariant and duplicate-subject rejection (§4.2, §8).

use std::collections::HashSet;

use crate::authz::{AuthorizationEntries, AuthorizationEntry};
use crate::error::{Error, ErrorKind};
use crate::principal::Principal;
use crate::types::{PrincipalType, Role};

/// Reject authorization-entry sets whose `provider_id`s are not unique
/// (§4.2 Duplicate-subject rejection, §8 invariant).
pub fn check_no_duplicate_subjects(entries: &AuthorizationEntries) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for entry in entries.iter() {
        if !seen.insert(&entry.provider_id) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Duplicate authorization subject: {}", entry.provider_id),
            ));
        }
    }
    Ok(())
}

/// Require that exactly one entry has role `owner` (§3, §8 invariant).
pub fn check_single_owner(entries: &AuthorizationEntries) -> Result<(), Error> {
    let owners = entries.iter().filter(|e| e.role == Role::Owner).count();
    if owners == 1 {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "threat model must have exactly one owner authorization entry, found {owners}"
        )))
    }
}

/// Apply the §4.2 owner-change rule to a PUT on a threat model:
///
/// - Only the current owner may change the `owner` field.
/// - When the owner *is* changed, the previous owner is preserved as an
///   owner-role authorization entry (both old and new owner end up with
///   role `owner`; downgrading the old owner is a separate operation).
///
/// `actor_role` is the requester's resolved role on the *current* state of
/// the threat model. `current` is the authorization set before the write;
/// `incoming` is the authorization set from the request payload, which the
/// caller has already rewritten to reflect the new `owner` field (i.e. it
/// contains a fresh `owner`-role entry for the new owner but not
/// necessarily one for the departing owner yet).
pub fn apply_owner_change(
    actor_role: Role,
    current_owner_provider_id: &str,
    incoming_owner_provider_id: &str,
    mut incoming: AuthorizationEntries,
) -> Result<AuthorizationEntries, Error> {
    let owner_changed = current_owner_provider_id != incoming_owner_provider_id;

    if owner_changed && actor_role != Role::Owner {
        return Err(Error::forbidden("only the current owner may change the owner field"));
    }

    if owner_changed {
        let previous_owner_present = incoming
            .iter()
            .any(|e| e.provider_id == current_owner_provider_id && e.role == Role::Owner);
        if !previous_owner_present {
            incoming.0.push(AuthorizationEntry {
                principal_type: PrincipalType::User,
                provider: "local".to_string(),
                provider_id: current_owner_provider_id.to_string(),
                role: Role::Owner,
            });
        }
    }

    check_no_duplicate_subjects(&incoming)?;
    Ok(incoming)
}

/// `true` if the `"everyone"` group is the deletion target (§3, §4.2, §8).
pub fn reject_if_protected_group(group_name: &str) -> Result<(), Error> {
    if group_name == crate::principal::Group::EVERYONE {
        Err(Error::new(ErrorKind::ProtectedGroup, "the everyone group cannot be deleted"))
    } else {
        Ok(())
    }
}

/// Writer-role principals may never change `owner`, even when a proposed
/// set otherwise validates (§4.2 Owner-change rule).
pub fn reject_non_owner_owner_change(actor: &Principal, actor_role: Role, owner_changed: bool) -> Result<(), Error> {
    if owner_changed && actor_role != Role::Owner {
        return Err(Error::forbidden(format!(
            "principal {} with role {actor_role} may not change the owner field",
            actor.provider_user_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(id: &str, role: Role) -> AuthorizationEntry {
        AuthorizationEntry {
            principal_type: PrincipalType::User,
            provider: "local".to_string(),
            provider_id: id.to_string(),
            role,
        }
    }

    #[test]
    fn owner_may_change_owner_and_previous_owner_is_preserved() {
        let incoming = AuthorizationEntries(vec![
            entry("newowner@ex.com", Role::Owner),
            entry("bob@ex.com", Role::Writer),
            entry("carol@ex.com", Role::Reader),
        ]);
        let result = apply_owner_change(Role::Owner, "alice@ex.com", "newowner@ex.com", incoming).unwrap();
        assert!(result.iter().any(|e| e.provider_id == "alice@ex.com" && e.role == Role::Owner));
        assert!(result.iter().any(|e| e.provider_id == "newowner@ex.com" && e.role == Role::Owner));
        assert!(result.iter().any(|e| e.provider_id == "bob@ex.com" && e.role == Role::Writer));
    }

    #[test]
    fn writer_forbidden_from_changing_owner() {
        let incoming = AuthorizationEntries(vec![entry("newowner@ex.com", Role::Owner)]);
        let err = apply_owner_change(Role::Writer, "alice@ex.com", "newowner@ex.com", incoming).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[test]
    fn non_owner_change_does_not_require_owner_role() {
        let incoming = AuthorizationEntries(vec![
            entry("alice@ex.com", Role::Owner),
            entry("dave@ex.com", Role::Writer),
        ]);
        assert!(apply_owner_change(Role::Writer, "alice@ex.com", "alice@ex.com", incoming).is_ok());
    }

    #[test]
    fn duplicate_subject_rejected_with_message() {
        let entries = AuthorizationEntries(vec![entry("bob@ex.com", Role::Writer), entry("bob@ex.com", Role::Reader)]);
        let err = check_no_duplicate_subjects(&entries).unwrap_err();
        assert!(err.description.contains("Duplicate authorization subject: bob@ex.com"));
    }

    #[test]
    fn everyone_group_deletion_is_protected() {
        let err = reject_if_protected_group("everyone").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtectedGroup);
    }

    #[test]
    fn non_everyone_group_deletion_is_allowed() {
        assert!(reject_if_protected_group("engineering").is_ok());
    }

    #[test]
    fn single_owner_invariant_enforced() {
        let none = AuthorizationEntries(vec![entry("bob@ex.com", Role::Writer)]);
        assert!(check_single_owner(&none).is_err());
        let two = AuthorizationEntries(vec![entry("a", Role::Owner), entry("b", Role::Owner)]);
        assert!(check_single_owner(&two).is_err());
        let one = AuthorizationEntries(vec![entry("a", Role::Owner)]);
        assert!(check_single_owner(&one).is_ok());
        let _ = Uuid::new_v4();
    }
}
