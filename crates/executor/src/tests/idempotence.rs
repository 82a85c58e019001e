//! Idempotence: once a diff is applied, diffing again yields nothing.

use proptest::prelude::*;
use proptest::sample::subsequence;

use super::*;
use crate::{DefaultObjectType, Privilege, PrivilegeToken};

#[test]
fn test_apply_then_diff_is_empty() {
    let contract = validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "rivers", &["SELECT*", "UPDATE"])
            .grant_default(Some("usr_prof"), "public", "tables", "grp_geo", &["SELECT"]),
    );
    let mut catalog = geo_catalog()
        .with_schema_grant("grp_geo", "public", &[Privilege::Create, Privilege::Usage])
        .with_object_grant(
            "grp_geo",
            "public",
            "rivers",
            &[PrivilegeToken::plain(Privilege::Select)],
        )
        .with_default_grant(
            "usr_prof",
            "public",
            DefaultObjectType::Tables,
            "grp_geo",
            &[Privilege::Insert],
        );

    let ops = diff(&mut catalog, &contract);
    assert!(!ops.is_empty());
    apply(&mut catalog, &ops).unwrap();
    assert!(diff(&mut catalog, &contract).is_empty());
}

#[test]
fn test_plain_and_starred_privilege_converge() {
    let contract = validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "lakes", &["SELECT", "SELECT*"]),
    );
    let mut catalog = geo_catalog();

    let ops = diff(&mut catalog, &contract);
    apply(&mut catalog, &ops).unwrap();
    assert!(diff(&mut catalog, &contract).is_empty());
    assert_eq!(
        catalog.object_grants("grp_geo", "public", "lakes"),
        std::collections::BTreeSet::from([PrivilegeToken::grantable(Privilege::Select)])
    );
}

#[test]
fn test_second_apply_is_a_no_op() {
    let contract = validate(
        PermissionContract::new(["^grp_"]).grant_schema("grp_geo", "public", &["USAGE"]),
    );
    let mut catalog = geo_catalog();

    let ops = diff(&mut catalog, &contract);
    apply(&mut catalog, &ops).unwrap();
    catalog.clear_log();

    let again = diff(&mut catalog, &contract);
    let report = apply(&mut catalog, &again).unwrap();
    assert_eq!(report.attempts, 0);
    assert!(catalog.ddl().is_empty());
}

const SCHEMA_PRIVILEGES: [Privilege; 2] = [Privilege::Create, Privilege::Usage];

const TABLE_TOKENS: [PrivilegeToken; 5] = [
    PrivilegeToken::plain(Privilege::Delete),
    PrivilegeToken::grantable(Privilege::Insert),
    PrivilegeToken::plain(Privilege::Select),
    PrivilegeToken::plain(Privilege::Truncate),
    PrivilegeToken::grantable(Privilege::Update),
];

const WANTED_TABLE: [&str; 6] = [
    "DELETE*", "INSERT", "SELECT", "SELECT*", "TRIGGER", "UPDATE",
];

const DEFAULT_PRIVILEGES: [Privilege; 3] = [Privilege::Insert, Privilege::Select, Privilege::Update];

const WANTED_DEFAULT: [&str; 3] = ["DELETE", "SELECT", "UPDATE"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_apply_then_diff_is_empty(
        seeded_schema in subsequence(SCHEMA_PRIVILEGES.to_vec(), 0..=2),
        seeded_bio in subsequence(SCHEMA_PRIVILEGES.to_vec(), 0..=2),
        wants_create in any::<bool>(),
        seeded_table in subsequence(TABLE_TOKENS.to_vec(), 0..=5),
        wanted_table in subsequence(WANTED_TABLE.to_vec(), 0..=6),
        seeded_default in subsequence(DEFAULT_PRIVILEGES.to_vec(), 0..=3),
        wanted_default in subsequence(WANTED_DEFAULT.to_vec(), 0..=3),
    ) {
        let mut schema = vec!["USAGE"];
        if wants_create {
            schema.push("CREATE");
        }
        let contract = validate(
            PermissionContract::new(["^grp_", "^usr_"])
                .grant_schema("grp_geo", "public", &schema)
                .grant_object("grp_geo", "public", "lakes", &wanted_table)
                .grant_default(Some("usr_prof"), "public", "tables", "grp_geo", &wanted_default),
        );
        let mut catalog = geo_catalog()
            .with_schema_grant("grp_geo", "public", &seeded_schema)
            .with_schema_grant("grp_bio", "staging", &seeded_bio)
            .with_object_grant("grp_geo", "public", "lakes", &seeded_table)
            .with_default_grant(
                "usr_prof",
                "public",
                DefaultObjectType::Tables,
                "grp_geo",
                &seeded_default,
            );

        let ops = diff(&mut catalog, &contract);
        apply(&mut catalog, &ops).unwrap();
        prop_assert!(diff(&mut catalog, &contract).is_empty());
        prop_assert!(catalog.schema_grants("grp_bio", "staging").is_empty());
    }
}
