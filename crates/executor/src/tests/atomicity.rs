//! Atomicity: a batch either commits in full or leaves no trace.

use super::*;
use crate::{
    Action, ApplyState, DefaultObjectType, Error, ObjectKind, Privilege, PrivilegeToken,
};

fn usage() -> [PrivilegeToken; 1] {
    [PrivilegeToken::plain(Privilege::Usage)]
}

fn select() -> [PrivilegeToken; 1] {
    [PrivilegeToken::plain(Privilege::Select)]
}

#[test]
fn test_failed_batch_leaves_no_partial_state() {
    let mut catalog = geo_catalog();
    let ops = vec![
        Operation::schema(Action::Grant, "public", "grp_geo", usage()),
        Operation::object(Action::Grant, ObjectKind::Table, "public", "rivers", "grp_geo", select()),
        Operation::default_privileges(
            Action::Grant,
            Some("usr_prof"),
            "public",
            DefaultObjectType::Tables,
            "grp_geo",
            select(),
        ),
        Operation::object(Action::Grant, ObjectKind::Table, "public", "ghost", "grp_geo", select()),
    ];

    let mut executor = Executor::new(&mut catalog, fast_retry(3));
    let err = executor.apply(&ops).unwrap_err();
    assert!(matches!(err, Error::Database { ref code, .. } if code.as_deref() == Some("42P01")));
    assert_eq!(executor.state(), ApplyState::RolledBack);
    drop(executor);

    assert!(catalog.schema_grants("grp_geo", "public").is_empty());
    assert!(catalog.object_grants("grp_geo", "public", "rivers").is_empty());
    assert!(catalog
        .default_grants("usr_prof", "public", DefaultObjectType::Tables, "grp_geo")
        .is_empty());
    assert_eq!(catalog.commits(), 0);
    assert_eq!(catalog.rollbacks(), 1);
    assert!(!catalog.in_transaction());
}

#[test]
fn test_uncompilable_batch_never_opens_a_transaction() {
    let mut catalog = geo_catalog();
    let ops = vec![
        Operation::schema(Action::Grant, "public", "grp_geo", usage()),
        Operation::schema(Action::Grant, "public", "grp_geo\"; DROP ROLE grp_bio; --", usage()),
    ];

    let err = apply(&mut catalog, &ops).unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier { .. }));
    assert!(catalog.executed().is_empty());
}

#[test]
fn test_whitelist_violation_never_opens_a_transaction() {
    let mut catalog = geo_catalog();
    let ops = vec![Operation::object(
        Action::Grant,
        ObjectKind::Sequence,
        "public",
        "rivers_id_seq",
        "grp_geo",
        [PrivilegeToken::plain(Privilege::Delete)],
    )];

    let err = apply(&mut catalog, &ops).unwrap_err();
    assert!(matches!(err, Error::PrivilegeWhitelist { .. }));
    assert!(catalog.executed().is_empty());
}

#[test]
fn test_state_tracks_last_apply() {
    let mut catalog = geo_catalog();
    let mut executor = Executor::new(&mut catalog, fast_retry(0));
    assert_eq!(executor.state(), ApplyState::Pending);

    executor
        .apply(&[Operation::schema(Action::Grant, "public", "grp_geo", usage())])
        .unwrap();
    assert_eq!(executor.state(), ApplyState::Committed);

    let err = executor.apply(&[Operation::schema(Action::Grant, "nowhere", "grp_geo", usage())]);
    assert!(err.is_err());
    assert_eq!(executor.state(), ApplyState::RolledBack);
}
