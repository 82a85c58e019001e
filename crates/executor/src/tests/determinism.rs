//! Determinism tests: the same contract against the same state produces
//! the same operations, in the same order, every time.

use super::*;
use crate::{Action, Privilege, PrivilegeToken};

fn messy_catalog() -> ReferenceCatalog {
    geo_catalog()
        .with_schema_grant("grp_geo", "staging", &[Privilege::Create, Privilege::Usage])
        .with_schema_grant("usr_ta", "public", &[Privilege::Usage])
        .with_schema_grant("grp_bio", "public", &[Privilege::Create])
        .with_object_grant(
            "grp_geo",
            "public",
            "rivers",
            &[PrivilegeToken::plain(Privilege::Delete)],
        )
}

fn contract() -> ValidatedContract {
    validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_schema("grp_bio", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "rivers", &["SELECT"])
            .grant_object("grp_bio", "public", "lakes", &["SELECT", "UPDATE"]),
    )
}

#[test]
fn test_diff_determinism() {
    let contract = contract();
    let mut catalog = messy_catalog();

    let results: Vec<String> = (0..5)
        .map(|_| serde_json::to_string(&diff(&mut catalog, &contract)).unwrap())
        .collect();

    let first = &results[0];
    for result in &results {
        assert_eq!(result, first, "diff should produce byte-identical output");
    }
}

#[test]
fn test_diff_independent_of_contract_authoring_order() {
    let forward = contract();
    let reversed = validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_object("grp_bio", "public", "lakes", &["UPDATE", "SELECT"])
            .grant_object("grp_geo", "public", "rivers", &["SELECT"])
            .grant_schema("grp_bio", "public", &["USAGE"])
            .grant_schema("grp_geo", "public", &["USAGE"]),
    );

    let mut catalog = messy_catalog();
    assert_eq!(diff(&mut catalog, &forward), diff(&mut catalog, &reversed));
}

#[test]
fn test_sorted_with_revoke_first() {
    let contract = contract();
    let mut catalog = messy_catalog();
    let ops = diff(&mut catalog, &contract);

    let schema_ops: Vec<(String, String, Action)> = ops
        .iter()
        .filter(|op| op.object.is_none())
        .map(|op| (op.grantee.clone(), op.schema.clone().unwrap_or_default(), op.action))
        .collect();
    assert_eq!(
        schema_ops,
        vec![
            ("grp_bio".to_string(), "public".to_string(), Action::Revoke),
            ("grp_bio".to_string(), "public".to_string(), Action::Grant),
            ("grp_geo".to_string(), "public".to_string(), Action::Grant),
            ("grp_geo".to_string(), "staging".to_string(), Action::Revoke),
            ("usr_ta".to_string(), "public".to_string(), Action::Revoke),
        ]
    );

    let rivers: Vec<Action> = ops
        .iter()
        .filter(|op| op.object.as_deref() == Some("rivers"))
        .map(|op| op.action)
        .collect();
    assert_eq!(rivers, vec![Action::Revoke, Action::Grant]);
}

#[test]
fn test_statement_compilation_determinism() {
    let contract = contract();
    let mut catalog = messy_catalog();
    let ops = diff(&mut catalog, &contract);

    let first = Executor::<&mut ReferenceCatalog>::plan_statements(&ops).unwrap();
    for _ in 0..3 {
        assert_eq!(
            Executor::<&mut ReferenceCatalog>::plan_statements(&ops).unwrap(),
            first
        );
    }
}
