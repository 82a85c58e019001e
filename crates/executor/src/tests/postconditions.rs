//! State after apply: set equality, owner isolation, grant options and
//! dependency warnings.

use super::*;
use crate::{
    Action, Badge, CatalogReader, DefaultObjectType, ObjectRef, Privilege, PrivilegeToken,
    StateReader, Target,
};

fn reader<'a>(
    catalog: &'a mut ReferenceCatalog,
    contract: &ValidatedContract,
) -> StateReader<&'a mut ReferenceCatalog> {
    StateReader::new(catalog, contract.matcher().clone())
}

#[test]
fn test_schema_privileges_equal_contract_after_apply() {
    let contract = validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_schema("grp_geo", "public", &["USAGE", "CREATE"])
            .grant_schema("grp_geo", "staging", &["USAGE"])
            .grant_schema("grp_bio", "public", &["USAGE"]),
    );
    let mut catalog = geo_catalog()
        .with_schema_grant("grp_geo", "public", &[Privilege::Usage])
        .with_schema_grant("grp_geo", "staging", &[Privilege::Create])
        .with_schema_grant("usr_ta", "staging", &[Privilege::Usage]);

    let ops = diff(&mut catalog, &contract);
    apply(&mut catalog, &ops).unwrap();

    let mut reader = reader(&mut catalog, &contract);
    for (grantee, desired) in contract.schema_privileges() {
        let live = reader.schema_privileges(grantee).unwrap();
        assert_eq!(&live, desired, "schema privileges of {}", grantee);
    }
    assert!(reader.schema_privileges("usr_ta").unwrap().is_empty());
}

#[test]
fn test_default_privileges_are_isolated_by_owner() {
    let contract = validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_default(Some("usr_prof"), "public", "tables", "grp_geo", &["SELECT", "INSERT"]),
    );
    let mut catalog = geo_catalog().with_default_grant(
        "usr_ta",
        "public",
        DefaultObjectType::Tables,
        "grp_geo",
        &[Privilege::Update],
    );

    let before = reader(&mut catalog, &contract)
        .default_privileges(Some("usr_ta"), DefaultObjectType::Tables, None)
        .unwrap();

    let ops = diff(&mut catalog, &contract);
    assert!(ops
        .iter()
        .filter(|op| op.target == Target::Default)
        .all(|op| op.owner.as_deref() == Some("usr_prof")));
    apply(&mut catalog, &ops).unwrap();

    let after = reader(&mut catalog, &contract)
        .default_privileges(Some("usr_ta"), DefaultObjectType::Tables, None)
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(
        catalog.default_grants("usr_ta", "public", DefaultObjectType::Tables, "grp_geo"),
        [Privilege::Update].into_iter().collect()
    );
    assert_eq!(
        catalog.default_grants("usr_prof", "public", DefaultObjectType::Tables, "grp_geo"),
        [Privilege::Insert, Privilege::Select].into_iter().collect()
    );
}

#[test]
fn test_grant_option_round_trip() {
    let mut catalog = geo_catalog()
        .with_schema_grant("grp_geo", "public", &[Privilege::Usage])
        .with_object_grant(
            "grp_geo",
            "public",
            "lakes",
            &[PrivilegeToken::grantable(Privilege::Select)],
        );
    let contract = validate(
        PermissionContract::new(["^grp_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "lakes", &["SELECT"]),
    );

    let acls = reader(&mut catalog, &contract)
        .object_acls("public", "lakes")
        .unwrap();
    let tokens: Vec<String> = acls["grp_geo"].iter().map(|t| t.to_string()).collect();
    assert_eq!(tokens, vec!["SELECT*"]);

    let ops = diff(&mut catalog, &contract);
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].action, Action::Revoke);
    assert_eq!(ops[0].privileges, vec![PrivilegeToken::grantable(Privilege::Select)]);
    assert_eq!(ops[1].action, Action::Grant);
    assert_eq!(ops[1].privileges, vec![PrivilegeToken::plain(Privilege::Select)]);

    let report = apply(&mut catalog, &ops).unwrap();
    assert_eq!(
        report.statements,
        vec![
            r#"REVOKE SELECT ON TABLE "public"."lakes" FROM "grp_geo""#,
            r#"GRANT SELECT ON TABLE "public"."lakes" TO "grp_geo""#,
        ]
    );
    assert_eq!(
        catalog.object_grants("grp_geo", "public", "lakes"),
        [PrivilegeToken::plain(Privilege::Select)].into_iter().collect()
    );
    assert!(diff(&mut catalog, &contract).is_empty());
}

#[test]
fn test_revoke_with_dependents_is_flagged_not_dropped() {
    let mut catalog = geo_catalog()
        .with_schema_grant("grp_geo", "public", &[Privilege::Usage])
        .with_object_grant(
            "grp_geo",
            "public",
            "rivers",
            &[PrivilegeToken::plain(Privilege::Select)],
        );
    let contract = validate(
        PermissionContract::new(["^grp_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "rivers", &[]),
    );

    let ops = diff(&mut catalog, &contract);
    assert_eq!(ops.len(), 1);
    let revoke = &ops[0];
    assert_eq!(revoke.action, Action::Revoke);
    assert_eq!(revoke.badge, Some(Badge::WarnDepend));
    assert_eq!(revoke.dependencies, vec![ObjectRef::new("public", "rivers_v")]);

    // Applying is the caller's call; the executor does not second-guess it
    apply(&mut catalog, &ops).unwrap();
    assert!(catalog.object_grants("grp_geo", "public", "rivers").is_empty());
}

#[test]
fn test_grant_without_dependents_has_no_badge() {
    let mut catalog = geo_catalog();
    let contract = validate(
        PermissionContract::new(["^grp_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "rivers", &["SELECT"]),
    );
    let ops = diff(&mut catalog, &contract);
    assert!(ops.iter().all(|op| op.badge.is_none()));
}
