//! Diff computation
//!
//! [`Reconciler::diff`] compares a validated contract with live state and
//! returns the operations that would make them equal. It reads, never
//! writes, and any read failure aborts the whole diff.
//!
//! ## Dimensions
//!
//! Each dimension is diffed independently and the results concatenated in
//! this order:
//!
//! 1. DATABASE: grantees listed in `database_privileges`
//! 2. SCHEMA: every grantee in the contract or in the managed role list,
//!    every schema on either side
//! 3. TABLE / SEQUENCE: every `(grantee, schema, object)` the contract names
//! 4. DEFAULT: every `(owner, schema, object type)` partition the contract
//!    names, plus every live partition when `auto_onboard_creators` is set
//!
//! Schema USAGE granted in a batch therefore always precedes the object and
//! default grants that depend on it, whichever role they are for.
//!
//! ## Ordering
//!
//! Within a dimension keys are visited in lexicographic order; for each key
//! a revoke (if any) is emitted before a grant (if any). Two diffs of the
//! same state are identical.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use grantsync_core::{
    plain_tokens, Action, DefaultObjectType, Error, ObjectKind, Operation, PrivilegeSet, Result,
    TokenSet, ValidatedContract,
};

use crate::session::PgSession;
use crate::state::{CatalogReader, StateReader};

/// Computes `diff(contract) -> [Operation]` over one session
pub struct Reconciler<S: PgSession> {
    session: S,
}

impl<S: PgSession> Reconciler<S> {
    /// Reconcile over `session`
    pub fn new(session: S) -> Self {
        Reconciler { session }
    }

    /// Give the session back
    pub fn into_inner(self) -> S {
        self.session
    }

    /// Operations that bring live state in line with `contract`
    pub fn diff(&mut self, contract: &ValidatedContract) -> Result<Vec<Operation>> {
        let mut reader = StateReader::new(&mut self.session, contract.matcher().clone());
        diff_catalog(&mut reader, contract)
    }
}

/// [`Reconciler::diff`] over any [`CatalogReader`]
pub fn diff_catalog<R: CatalogReader + ?Sized>(
    reader: &mut R,
    contract: &ValidatedContract,
) -> Result<Vec<Operation>> {
    let mut ops = Vec::new();

    let database = resolve_database(reader, contract)?;
    diff_database(reader, contract, database.as_deref(), &mut ops)?;
    let after_database = ops.len();
    diff_schemas(reader, contract, &mut ops)?;
    let after_schemas = ops.len();
    diff_objects(reader, contract, &mut ops)?;
    let after_objects = ops.len();
    diff_defaults(reader, contract, &mut ops)?;

    let warnings = ops.iter().filter(|op| op.has_dependency_warning()).count();
    info!(
        target: "grantsync::reconcile",
        total = ops.len(),
        database = after_database,
        schema = after_schemas - after_database,
        object = after_objects - after_schemas,
        default = ops.len() - after_objects,
        warnings,
        "diff computed"
    );
    Ok(ops)
}

/// Read failures surface as [`Error::Catalog`]
fn read<T>(result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        Error::Database { .. } => Error::catalog(e.to_string()),
        other => other,
    })
}

/// `(revoke, grant)` = `(current - desired, desired - current)`
fn split<T: Ord + Clone>(current: &BTreeSet<T>, desired: &BTreeSet<T>) -> (Vec<T>, Vec<T>) {
    (
        current.difference(desired).cloned().collect(),
        desired.difference(current).cloned().collect(),
    )
}

/// Check `scope.database` and name the database DATABASE operations target
fn resolve_database<R: CatalogReader + ?Sized>(
    reader: &mut R,
    contract: &ValidatedContract,
) -> Result<Option<String>> {
    match contract.scope().database.as_deref() {
        Some(expected) => {
            let actual = read(reader.current_database())?;
            if actual != expected {
                return Err(Error::ScopeMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
            Ok(Some(actual))
        }
        None if !contract.database_privileges().is_empty() => {
            Ok(Some(read(reader.current_database())?))
        }
        None => Ok(None),
    }
}

fn diff_database<R: CatalogReader + ?Sized>(
    reader: &mut R,
    contract: &ValidatedContract,
    database: Option<&str>,
    ops: &mut Vec<Operation>,
) -> Result<()> {
    let Some(database) = database else {
        return Ok(());
    };
    for (grantee, desired) in contract.database_privileges() {
        let current = read(reader.database_privileges(grantee))?;
        let (revoke, grant) = split(&current, desired);
        if !revoke.is_empty() {
            ops.push(Operation::database(
                Action::Revoke,
                database,
                grantee,
                plain_tokens(&revoke.into_iter().collect()),
            ));
        }
        if !grant.is_empty() {
            ops.push(Operation::database(
                Action::Grant,
                database,
                grantee,
                plain_tokens(&grant.into_iter().collect()),
            ));
        }
    }
    Ok(())
}

fn diff_schemas<R: CatalogReader + ?Sized>(
    reader: &mut R,
    contract: &ValidatedContract,
    ops: &mut Vec<Operation>,
) -> Result<()> {
    let mut grantees: BTreeSet<String> = contract.schema_privileges().keys().cloned().collect();
    grantees.extend(read(reader.list_roles())?);

    let empty = BTreeMap::new();
    for grantee in &grantees {
        let desired = contract.schema_privileges().get(grantee).unwrap_or(&empty);
        let current: BTreeMap<String, PrivilegeSet> = read(reader.schema_privileges(grantee))?
            .into_iter()
            .filter(|(schema, _)| contract.in_scope(schema))
            .collect();

        let schemas: BTreeSet<&String> = desired.keys().chain(current.keys()).collect();
        for schema in schemas {
            let none = PrivilegeSet::new();
            let want = desired.get(schema).unwrap_or(&none);
            let have = current.get(schema).unwrap_or(&none);
            let (revoke, grant) = split(have, want);
            if !revoke.is_empty() {
                ops.push(Operation::schema(
                    Action::Revoke,
                    schema,
                    grantee,
                    plain_tokens(&revoke.into_iter().collect()),
                ));
            }
            if !grant.is_empty() {
                ops.push(Operation::schema(
                    Action::Grant,
                    schema,
                    grantee,
                    plain_tokens(&grant.into_iter().collect()),
                ));
            }
        }
    }
    Ok(())
}

fn diff_objects<R: CatalogReader + ?Sized>(
    reader: &mut R,
    contract: &ValidatedContract,
    ops: &mut Vec<Operation>,
) -> Result<()> {
    let mut relations: BTreeMap<String, BTreeMap<String, ObjectKind>> = BTreeMap::new();

    for (grantee, by_schema) in contract.object_privileges() {
        for (schema, by_object) in by_schema {
            if !relations.contains_key(schema) {
                let listed = read(reader.objects(schema, None))?;
                relations.insert(schema.clone(), listed);
            }
            let listed = relations.get(schema);

            for (object, desired) in by_object {
                let kind = match listed.and_then(|l| l.get(object)) {
                    Some(kind) => *kind,
                    None => {
                        warn!(
                            target: "grantsync::reconcile",
                            %schema, %object,
                            "relation not found, assuming TABLE"
                        );
                        ObjectKind::Table
                    }
                };
                if let Some(bad) = desired.iter().find(|t| !kind.allows(t.privilege)) {
                    return Err(Error::whitelist(bad.to_string(), kind.name()));
                }

                let current: TokenSet = read(reader.object_acls(schema, object))?
                    .remove(grantee)
                    .unwrap_or_default();
                let (revoke, grant) = split(&current, desired);

                if !revoke.is_empty() {
                    let dependencies = read(reader.dependencies(schema, object))?;
                    if !dependencies.is_empty() {
                        warn!(
                            target: "grantsync::reconcile",
                            %grantee, %schema, %object,
                            dependents = dependencies.len(),
                            "revoke affects dependent objects"
                        );
                    }
                    ops.push(
                        Operation::object(Action::Revoke, kind, schema, object, grantee, revoke)
                            .with_dependencies(dependencies),
                    );
                }
                if !grant.is_empty() {
                    ops.push(Operation::object(
                        Action::Grant,
                        kind,
                        schema,
                        object,
                        grantee,
                        grant,
                    ));
                }
            }
        }
    }
    Ok(())
}

type Partition = (String, String, DefaultObjectType);

fn diff_defaults<R: CatalogReader + ?Sized>(
    reader: &mut R,
    contract: &ValidatedContract,
    ops: &mut Vec<Operation>,
) -> Result<()> {
    let mut partitions: BTreeMap<Partition, BTreeMap<String, PrivilegeSet>> = BTreeMap::new();

    let mut session_user: Option<String> = None;
    for entry in contract.default_privileges() {
        let owner = match &entry.for_role {
            Some(role) => role.clone(),
            None => match &session_user {
                Some(user) => user.clone(),
                None => {
                    let user = read(reader.current_user())?;
                    session_user = Some(user.clone());
                    user
                }
            },
        };
        let grants = partitions
            .entry((owner, entry.in_schema.clone(), entry.object_type))
            .or_default();
        for (grantee, privileges) in &entry.grants {
            grants
                .entry(grantee.clone())
                .or_default()
                .extend(privileges.iter().copied());
        }
    }

    if contract.auto_onboard_creators() {
        let scope_schema = contract.scope().schema.as_deref();
        for object_type in DefaultObjectType::ALL {
            let live = read(reader.default_privileges(None, object_type, scope_schema))?;
            for (schema, owners) in &live.by_owner {
                for owner in owners.keys() {
                    let key = (owner.clone(), schema.clone(), object_type);
                    if !partitions.contains_key(&key) {
                        debug!(
                            target: "grantsync::reconcile",
                            %owner, %schema, object_type = %object_type,
                            "onboarding creator partition"
                        );
                        partitions.insert(key, BTreeMap::new());
                    }
                }
            }
        }
    }

    for ((owner, schema, object_type), desired) in &partitions {
        let live = read(reader.default_privileges(
            Some(owner.as_str()),
            *object_type,
            Some(schema.as_str()),
        ))?;
        let current = live.partition(owner, schema).cloned().unwrap_or_default();

        let grantees: BTreeSet<&String> = desired.keys().chain(current.keys()).collect();
        for grantee in grantees {
            let none = PrivilegeSet::new();
            let want = desired.get(grantee).unwrap_or(&none);
            let have = current.get(grantee).unwrap_or(&none);
            let (revoke, grant) = split(have, want);
            if !revoke.is_empty() {
                ops.push(Operation::default_privileges(
                    Action::Revoke,
                    Some(owner.as_str()),
                    schema,
                    *object_type,
                    grantee,
                    plain_tokens(&revoke.into_iter().collect()),
                ));
            }
            if !grant.is_empty() {
                ops.push(Operation::default_privileges(
                    Action::Grant,
                    Some(owner.as_str()),
                    schema,
                    *object_type,
                    grantee,
                    plain_tokens(&grant.into_iter().collect()),
                ));
            }
        }
    }
    Ok(())
}
