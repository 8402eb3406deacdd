//! Boundary-condition coverage for the request-validation rules in §8 that
//! a transport layer relies on before ever reaching the store: malformed
//! resource ids, and the asymmetric treatment of limit/offset vs. filter
//! timestamps (one rejects, the other silently drops).

use tmi_core::error::ErrorKind;
use tmi_core::validation::pagination::{parse_group_list_limit, parse_limit, parse_offset, parse_sort_order, parse_timestamp_filter, SortOrder};
use uuid::Uuid;

#[test]
fn malformed_diagram_id_is_rejected_before_any_lookup() {
    let raw = "not-a-uuid";
    let parsed = Uuid::parse_str(raw);
    assert!(parsed.is_err());
    // The transport layer maps a parse failure straight to InvalidId without
    // ever calling into the store; assert the mapping our error taxonomy
    // expects it to use.
    assert_eq!(ErrorKind::InvalidId.as_str(), "invalid_id");
    assert_eq!(ErrorKind::InvalidId.status_code(), 400);
}

#[test]
fn negative_limit_and_offset_are_both_rejected_with_400() {
    let limit_err = parse_limit(Some("-10")).unwrap_err();
    let offset_err = parse_offset(Some("-1")).unwrap_err();
    assert_eq!(limit_err.kind.status_code(), 400);
    assert_eq!(offset_err.kind.status_code(), 400);
}

#[test]
fn unparsable_timestamp_filter_is_dropped_not_rejected() {
    // Unlike limit/offset, a bad `created_after` never produces an error —
    // it's simply excluded from the filter set the caller builds.
    assert!(parse_timestamp_filter("next thursday").is_none());
    assert!(parse_timestamp_filter("2025-06-01T12:00:00Z").is_some());
}

#[test]
fn unknown_sort_order_value_does_not_error_either() {
    assert_eq!(parse_sort_order(Some("banana")), SortOrder::Asc);
}

#[test]
fn admin_group_list_limit_over_200_is_rejected_with_invalid_limit() {
    // The generic list limit clamps to MAX_LIMIT; the admin group-list
    // endpoint has its own tighter ceiling that rejects instead (§8:
    // "limit>200 on admin group list -> 400 invalid_limit").
    let err = parse_group_list_limit(Some("201")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidLimit);
    assert_eq!(err.kind.status_code(), 400);

    assert!(parse_group_list_limit(Some("200")).is_ok());
    assert!(parse_limit(Some("201")).is_ok(), "the generic limit still clamps rather than rejecting");
}
