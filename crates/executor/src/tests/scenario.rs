//! End-to-end scenarios: contract JSON in, catalog state out.

use serde_json::json;

use super::*;
use crate::{Action, CatalogReader, PrincipalMatcher, PrincipalMode, StateReader, Target};

#[test]
fn test_role_a_usage_on_public() {
    let contract = ContractValidator::new()
        .validate_json(
            r#"{
                "contract_version": "1.4.3",
                "managed_principals": ["^roleA$"],
                "schema_privileges": {"roleA": {"public": ["USAGE"]}}
            }"#,
        )
        .unwrap();
    let mut catalog = ReferenceCatalog::new("classroom").with_roles(&["roleA"]);

    let ops = diff(&mut catalog, &contract);
    assert_eq!(ops.len(), 1);
    assert_eq!(
        serde_json::to_value(&ops[0]).unwrap(),
        json!({
            "action": "grant",
            "target": "SCHEMA",
            "schema": "public",
            "grantee": "roleA",
            "privileges": ["USAGE"]
        })
    );

    let report = apply(&mut catalog, &ops).unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(
        report.statements,
        vec![r#"GRANT USAGE ON SCHEMA "public" TO "roleA""#]
    );

    let matcher = PrincipalMatcher::new(PrincipalMode::Regex, &["^roleA$".to_string()]).unwrap();
    let mut reader = StateReader::new(&mut catalog, matcher);
    let schemas = reader.schema_privileges("roleA").unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(
        schemas["public"].iter().map(|p| p.keyword()).collect::<Vec<_>>(),
        vec!["USAGE"]
    );
}

#[test]
fn test_full_contract_converges() {
    let contract = validate(
        PermissionContract::new(["^grp_", "^usr_"])
            .grant_database("grp_geo", &["CONNECT"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_schema("grp_bio", "staging", &["USAGE", "CREATE"])
            .grant_object("grp_geo", "public", "rivers", &["SELECT", "INSERT"])
            .grant_object("grp_geo", "public", "rivers_id_seq", &["USAGE", "SELECT"])
            .grant_default(Some("usr_prof"), "public", "tables", "grp_geo", &["SELECT"])
            .grant_default(None, "staging", "sequences", "grp_bio", &["USAGE"]),
    );
    let mut catalog = geo_catalog();

    let ops = diff(&mut catalog, &contract);
    let targets: Vec<Target> = ops.iter().map(|op| op.target).collect();
    assert_eq!(
        targets,
        vec![
            Target::Database,
            Target::Schema,
            Target::Schema,
            Target::Table,
            Target::Sequence,
            Target::Default,
            Target::Default,
        ]
    );
    assert!(ops.iter().all(|op| op.action == Action::Grant));

    apply(&mut catalog, &ops).unwrap();
    assert!(diff(&mut catalog, &contract).is_empty());

    assert_eq!(catalog.database_grants("grp_geo").len(), 1);
    assert_eq!(catalog.object_grants("grp_geo", "public", "rivers").len(), 2);
    // Defaults without for_role land on the session user
    assert_eq!(
        catalog
            .default_grants("usr_admin", "staging", crate::DefaultObjectType::Sequences, "grp_bio")
            .len(),
        1
    );
}

#[test]
fn test_plan_statements_matches_apply() {
    let contract = validate(
        PermissionContract::new(["^grp_"])
            .grant_schema("grp_geo", "public", &["USAGE"])
            .grant_object("grp_geo", "public", "lakes", &["SELECT*"]),
    );
    let mut catalog = geo_catalog();
    let ops = diff(&mut catalog, &contract);

    let planned = Executor::<&mut ReferenceCatalog>::plan_statements(&ops).unwrap();
    let report = apply(&mut catalog, &ops).unwrap();
    assert_eq!(planned, report.statements);
    assert_eq!(
        planned,
        vec![
            r#"GRANT USAGE ON SCHEMA "public" TO "grp_geo""#,
            r#"GRANT SELECT ON TABLE "public"."lakes" TO "grp_geo" WITH GRANT OPTION"#,
        ]
    );
}

#[test]
fn test_empty_batch_touches_nothing() {
    let mut catalog = geo_catalog();
    let report = apply(&mut catalog, &[]).unwrap();
    assert_eq!(report.attempts, 0);
    assert!(report.statements.is_empty());
    assert!(catalog.executed().is_empty());
}

#[test]
fn test_contract_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contract.json");
    std::fs::write(
        &path,
        r#"{
            "contract_version": "1.4.3",
            "managed_principals": ["^grp_"],
            "schema_privileges": {"grp_geo": {"public": ["USAGE"]}},
            "object_privileges": {"grp_geo": {"public": {"rivers_id_seq": ["USAGE"]}}}
        }"#,
    )
    .unwrap();

    let contract = ContractValidator::new()
        .validate(&PermissionContract::from_file(&path).unwrap())
        .unwrap();
    let mut catalog = geo_catalog();
    let ops = diff(&mut catalog, &contract);
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[1].target, Target::Sequence);

    apply(&mut catalog, &ops).unwrap();
    assert!(diff(&mut catalog, &contract).is_empty());
}
