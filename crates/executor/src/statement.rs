//! Operation → SQL
//!
//! Statements are built from a dispatch table keyed by [`Target`]. Every
//! identifier passes through [`quote_identifier`] and every privilege is
//! checked against its target's whitelist before any text is produced, so a
//! batch that compiles contains nothing but well-formed, allow-listed DDL.
//!
//! | Target | Statement |
//! |--------|-----------|
//! | DATABASE | `GRANT\|REVOKE <privs> ON DATABASE <db> TO\|FROM <grantee>` |
//! | SCHEMA | `GRANT\|REVOKE <privs> ON SCHEMA <schema> TO\|FROM <grantee>` |
//! | TABLE / SEQUENCE | `GRANT\|REVOKE <privs> ON TABLE\|SEQUENCE <schema>.<object> TO\|FROM <grantee>` |
//! | DEFAULT | `ALTER DEFAULT PRIVILEGES [FOR ROLE <owner>] IN SCHEMA <schema> GRANT\|REVOKE <privs> ON <TYPE> TO\|FROM <grantee>` |
//!
//! An empty privilege list renders as `ALL PRIVILEGES`. Grant tokens held
//! with grant option (`SELECT*`) go into a separate `... WITH GRANT OPTION`
//! statement; a revoke of `SELECT*` is a plain `REVOKE SELECT`, which drops
//! the privilege together with its grant option.

use grantsync_core::{
    quote_identifier, Action, Error, Operation, Privilege, PrivilegeToken, Result, Target,
};

type Builder = fn(&Operation) -> Result<Vec<String>>;

const DISPATCH: &[(Target, Builder)] = &[
    (Target::Database, database_statements),
    (Target::Schema, schema_statements),
    (Target::Table, relation_statements),
    (Target::Sequence, relation_statements),
    (Target::Default, default_statements),
];

/// Compile one operation into one or two statements
pub fn compile_operation(op: &Operation) -> Result<Vec<String>> {
    let builder = DISPATCH
        .iter()
        .find(|(target, _)| *target == op.target)
        .map(|(_, builder)| *builder)
        .ok_or_else(|| Error::schema(format!("no statement builder for {}", op.target)))?;
    builder(op)
}

/// Compile a batch in order; fails on the first operation that does not compile
pub fn compile_all(ops: &[Operation]) -> Result<Vec<String>> {
    let mut statements = Vec::with_capacity(ops.len());
    for op in ops {
        statements.extend(compile_operation(op)?);
    }
    Ok(statements)
}

fn required(value: Option<&str>, field: &str, op: &Operation) -> Result<String> {
    match value {
        Some(v) => quote_identifier(v),
        None => Err(Error::InvalidIdentifier {
            identifier: String::new(),
            reason: format!("{} operation has no {}", op.target, field),
        }),
    }
}

/// `(privilege list, with grant option)` clauses for `op`
fn privilege_clauses(
    op: &Operation,
    kind: &str,
    allowed: impl Fn(Privilege) -> bool,
    grant_option_allowed: bool,
) -> Result<Vec<(String, bool)>> {
    for token in &op.privileges {
        if !allowed(token.privilege) || (token.grant_option && !grant_option_allowed) {
            return Err(Error::whitelist(token.to_string(), kind));
        }
    }
    if op.privileges.is_empty() {
        return Ok(vec![("ALL PRIVILEGES".to_string(), false)]);
    }

    let join = |tokens: &[&PrivilegeToken]| {
        let mut words: Vec<&str> = tokens.iter().map(|t| t.privilege.keyword()).collect();
        words.dedup();
        words.join(", ")
    };

    let all: Vec<&PrivilegeToken> = op.privileges.iter().collect();
    match op.action {
        Action::Revoke => Ok(vec![(join(&all), false)]),
        Action::Grant => {
            let (grantable, plain): (Vec<&PrivilegeToken>, Vec<&PrivilegeToken>) =
                all.into_iter().partition(|t| t.grant_option);
            let mut clauses = Vec::new();
            if !plain.is_empty() {
                clauses.push((join(&plain), false));
            }
            if !grantable.is_empty() {
                clauses.push((join(&grantable), true));
            }
            Ok(clauses)
        }
    }
}

fn render(op: &Operation, prefix: &str, on: &str, clauses: Vec<(String, bool)>) -> Result<Vec<String>> {
    let grantee = quote_identifier(&op.grantee)?;
    Ok(clauses
        .into_iter()
        .map(|(privileges, grant_option)| {
            format!(
                "{}{} {} ON {} {} {}{}",
                prefix,
                op.action.keyword(),
                privileges,
                on,
                op.action.preposition(),
                grantee,
                if grant_option { " WITH GRANT OPTION" } else { "" }
            )
        })
        .collect())
}

fn database_statements(op: &Operation) -> Result<Vec<String>> {
    let database = required(op.database.as_deref(), "database", op)?;
    let kind = grantsync_core::ObjectKind::Database;
    let clauses = privilege_clauses(op, kind.name(), |p| kind.allows(p), false)?;
    render(op, "", &format!("DATABASE {}", database), clauses)
}

fn schema_statements(op: &Operation) -> Result<Vec<String>> {
    let schema = required(op.schema.as_deref(), "schema", op)?;
    let kind = grantsync_core::ObjectKind::Schema;
    let clauses = privilege_clauses(op, kind.name(), |p| kind.allows(p), false)?;
    render(op, "", &format!("SCHEMA {}", schema), clauses)
}

fn relation_statements(op: &Operation) -> Result<Vec<String>> {
    let schema = required(op.schema.as_deref(), "schema", op)?;
    let object = required(op.object.as_deref(), "object", op)?;
    let kind = op
        .target
        .object_kind()
        .ok_or_else(|| Error::schema(format!("{} is not a relation target", op.target)))?;
    let clauses = privilege_clauses(op, kind.name(), |p| kind.allows(p), true)?;
    render(
        op,
        "",
        &format!("{} {}.{}", kind.grant_keyword(), schema, object),
        clauses,
    )
}

fn default_statements(op: &Operation) -> Result<Vec<String>> {
    let schema = required(op.schema.as_deref(), "schema", op)?;
    let object_type = op.object_type.ok_or_else(|| {
        Error::schema("DEFAULT operation has no object_type")
    })?;
    let prefix = match op.owner.as_deref() {
        Some(owner) => format!(
            "ALTER DEFAULT PRIVILEGES FOR ROLE {} IN SCHEMA {} ",
            quote_identifier(owner)?,
            schema
        ),
        None => format!("ALTER DEFAULT PRIVILEGES IN SCHEMA {} ", schema),
    };
    let clauses = privilege_clauses(op, object_type.keyword(), |p| object_type.allows(p), false)?;
    render(op, &prefix, object_type.keyword(), clauses)
}
