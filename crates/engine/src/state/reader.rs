//! Live privilege state
//!
//! [`StateReader`] runs the catalog queries in [`super::queries`] over a
//! [`PgSession`] and parses the rows into typed snapshots. Every method is
//! independent; nothing is cached between calls.
//!
//! Parsing is defensive. A row shorter than expected, or with `NULL` where a
//! name should be, is skipped with a warning and counts as "no privilege".
//! Privilege keywords the engine does not model (e.g. `MAINTAIN`) are
//! skipped the same way.
//!
//! Only managed principals are ever reported: role listings, ACLs and
//! default ACLs are filtered through the contract's [`PrincipalMatcher`],
//! and per-role reads for an unmanaged role return nothing without querying.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use grantsync_core::{
    DefaultObjectType, ObjectKind, ObjectRef, PrincipalMatcher, Privilege, PrivilegeSet,
    PrivilegeToken, Result, TokenSet,
};

use super::queries;
use crate::session::{PgSession, Row};

/// `schema -> grantee -> privileges`
pub type SchemaGrants = BTreeMap<String, BTreeMap<String, PrivilegeSet>>;

/// Default ACL snapshot for one object type
///
/// `by_owner` keeps creators apart; `by_schema` is the merged view across
/// creators, for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultPrivileges {
    /// `schema -> grantee -> privileges`, merged over owners
    pub by_schema: SchemaGrants,
    /// `schema -> owner -> grantee -> privileges`
    pub by_owner: BTreeMap<String, SchemaGrants>,
}

impl DefaultPrivileges {
    /// `grantee -> privileges` for one `(owner, schema)` partition
    pub fn partition(&self, owner: &str, schema: &str) -> Option<&BTreeMap<String, PrivilegeSet>> {
        self.by_owner.get(schema).and_then(|owners| owners.get(owner))
    }

    /// Owners with a default ACL in `schema`
    pub fn owners_in(&self, schema: &str) -> Vec<String> {
        self.by_owner
            .get(schema)
            .map(|owners| owners.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Read-only access to live privilege state
///
/// [`StateReader`] is the PostgreSQL implementation; the reconciler only
/// depends on this trait.
pub trait CatalogReader {
    /// Every role except PostgreSQL internals, unfiltered
    fn all_roles(&mut self) -> Result<Vec<String>>;

    /// Managed roles, sorted
    fn list_roles(&mut self) -> Result<Vec<String>>;

    /// Name of the connected database
    fn current_database(&mut self) -> Result<String>;

    /// Role the session runs as
    fn current_user(&mut self) -> Result<String>;

    /// Privileges `role` holds on the connected database
    fn database_privileges(&mut self, role: &str) -> Result<PrivilegeSet>;

    /// `schema -> privileges` held by `role`
    fn schema_privileges(&mut self, role: &str) -> Result<BTreeMap<String, PrivilegeSet>>;

    /// `object -> kind` in `schema`; `None` lists tables, views, matviews and sequences
    fn objects(
        &mut self,
        schema: &str,
        kinds: Option<&[ObjectKind]>,
    ) -> Result<BTreeMap<String, ObjectKind>>;

    /// `grantee -> tokens` on one relation, grant option preserved
    fn object_acls(&mut self, schema: &str, object: &str) -> Result<BTreeMap<String, TokenSet>>;

    /// Default ACLs for `object_type`, optionally restricted to one owner and schema
    fn default_privileges(
        &mut self,
        owner: Option<&str>,
        object_type: DefaultObjectType,
        schema: Option<&str>,
    ) -> Result<DefaultPrivileges>;

    /// Relations whose definition depends on `schema.object`
    fn dependencies(&mut self, schema: &str, object: &str) -> Result<Vec<ObjectRef>>;
}

/// [`CatalogReader`] over a PostgreSQL session
pub struct StateReader<S: PgSession> {
    session: S,
    matcher: PrincipalMatcher,
}

impl<S: PgSession> StateReader<S> {
    /// Read through `session`, reporting only roles `matcher` manages
    pub fn new(session: S, matcher: PrincipalMatcher) -> Self {
        StateReader { session, matcher }
    }

    /// The principal matcher in use
    pub fn matcher(&self) -> &PrincipalMatcher {
        &self.matcher
    }

    /// Give the session back
    pub fn into_inner(self) -> S {
        self.session
    }

    fn fetch(&mut self, name: &'static str, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        debug!(target: "grantsync::state", query = name, ?params, "catalog query");
        Ok(self.session.query(sql, params)?)
    }

    fn scalar(&mut self, name: &'static str, sql: &str) -> Result<String> {
        let rows = self.fetch(name, sql, &[])?;
        rows.first()
            .and_then(|row| column(row, 0))
            .map(str::to_string)
            .ok_or_else(|| grantsync_core::Error::catalog(format!("{} returned no value", name)))
    }
}

impl<S: PgSession> CatalogReader for StateReader<S> {
    fn all_roles(&mut self) -> Result<Vec<String>> {
        let rows = self.fetch("list_roles", queries::LIST_ROLES, &[])?;
        let mut roles: Vec<String> = rows
            .iter()
            .filter_map(|row| columns::<1>(row, "list_roles"))
            .map(|[name]| name.to_string())
            .collect();
        roles.sort();
        roles.dedup();
        Ok(roles)
    }

    fn list_roles(&mut self) -> Result<Vec<String>> {
        let roles = self.all_roles()?;
        Ok(self.matcher.filter(&roles))
    }

    fn current_database(&mut self) -> Result<String> {
        self.scalar("current_database", queries::CURRENT_DATABASE)
    }

    fn current_user(&mut self) -> Result<String> {
        self.scalar("current_user", queries::CURRENT_USER)
    }

    fn database_privileges(&mut self, role: &str) -> Result<PrivilegeSet> {
        if !self.matcher.is_managed(role) {
            return Ok(PrivilegeSet::new());
        }
        let rows = self.fetch("database_privileges", queries::DATABASE_PRIVILEGES, &[role])?;
        Ok(rows
            .iter()
            .filter_map(|row| columns::<1>(row, "database_privileges"))
            .filter_map(|[word]| privilege(word))
            .collect())
    }

    fn schema_privileges(&mut self, role: &str) -> Result<BTreeMap<String, PrivilegeSet>> {
        let mut result: BTreeMap<String, PrivilegeSet> = BTreeMap::new();
        if !self.matcher.is_managed(role) {
            return Ok(result);
        }
        let rows = self.fetch("schema_privileges", queries::SCHEMA_PRIVILEGES, &[role])?;
        for [schema, word] in rows.iter().filter_map(|row| columns::<2>(row, "schema_privileges")) {
            if let Some(p) = privilege(word) {
                result.entry(schema.to_string()).or_default().insert(p);
            }
        }
        Ok(result)
    }

    fn objects(
        &mut self,
        schema: &str,
        kinds: Option<&[ObjectKind]>,
    ) -> Result<BTreeMap<String, ObjectKind>> {
        let default_kinds = ObjectKind::DEFAULT_RELATIONS;
        let kinds = kinds.unwrap_or(&default_kinds);
        let mut codes: Vec<&str> = Vec::new();
        for kind in kinds {
            if let Some(code) = kind.relkind() {
                codes.push(code);
            }
            if *kind == ObjectKind::Table {
                codes.push("p");
            }
        }
        let codes = codes.join(",");

        let rows = self.fetch("objects", queries::OBJECTS, &[schema, &codes])?;
        let mut result = BTreeMap::new();
        for [name, code] in rows.iter().filter_map(|row| columns::<2>(row, "objects")) {
            match ObjectKind::from_relkind(code) {
                Some(kind) => {
                    result.insert(name.to_string(), kind);
                }
                None => warn!(
                    target: "grantsync::state",
                    schema, object = name, relkind = code,
                    "skipping relation with unexpected relkind"
                ),
            }
        }
        Ok(result)
    }

    fn object_acls(&mut self, schema: &str, object: &str) -> Result<BTreeMap<String, TokenSet>> {
        let rows = self.fetch("object_acls", queries::OBJECT_ACLS, &[schema, object])?;
        let mut result: BTreeMap<String, TokenSet> = BTreeMap::new();
        for [grantee, word, grantable] in rows.iter().filter_map(|row| columns::<3>(row, "object_acls")) {
            if !self.matcher.is_managed(grantee) {
                continue;
            }
            if let Some(p) = privilege(word) {
                let token = PrivilegeToken {
                    privilege: p,
                    grant_option: is_true(grantable),
                };
                result.entry(grantee.to_string()).or_default().insert(token);
            }
        }
        Ok(result)
    }

    fn default_privileges(
        &mut self,
        owner: Option<&str>,
        object_type: DefaultObjectType,
        schema: Option<&str>,
    ) -> Result<DefaultPrivileges> {
        let params = [
            object_type.defacl_code(),
            owner.unwrap_or(""),
            schema.unwrap_or(""),
        ];
        let rows = self.fetch("default_privileges", queries::DEFAULT_PRIVILEGES, &params)?;

        let mut result = DefaultPrivileges::default();
        for [row_owner, row_schema, grantee, word] in rows
            .iter()
            .filter_map(|row| columns::<4>(row, "default_privileges"))
        {
            if !self.matcher.is_managed(grantee) {
                continue;
            }
            let Some(p) = privilege(word) else { continue };
            result
                .by_schema
                .entry(row_schema.to_string())
                .or_default()
                .entry(grantee.to_string())
                .or_default()
                .insert(p);
            result
                .by_owner
                .entry(row_schema.to_string())
                .or_default()
                .entry(row_owner.to_string())
                .or_default()
                .entry(grantee.to_string())
                .or_default()
                .insert(p);
        }
        Ok(result)
    }

    fn dependencies(&mut self, schema: &str, object: &str) -> Result<Vec<ObjectRef>> {
        let rows = self.fetch("dependencies", queries::DEPENDENCIES, &[schema, object])?;
        let mut deps: Vec<ObjectRef> = rows
            .iter()
            .filter_map(|row| columns::<2>(row, "dependencies"))
            .filter(|[s, o]| !(*s == schema && *o == object))
            .map(|[s, o]| ObjectRef::new(s, o))
            .collect();
        deps.sort();
        deps.dedup();
        Ok(deps)
    }
}

fn column(row: &Row, index: usize) -> Option<&str> {
    row.get(index)
        .and_then(|c| c.as_deref())
        .filter(|s| !s.is_empty())
}

/// The first `N` columns of `row`, or `None` (with a warning) if any is missing
fn columns<'r, const N: usize>(row: &'r Row, query: &'static str) -> Option<[&'r str; N]> {
    let mut out = [""; N];
    for (i, slot) in out.iter_mut().enumerate() {
        match column(row, i) {
            Some(value) => *slot = value,
            None => {
                warn!(
                    target: "grantsync::state",
                    query, width = row.len(), expected = N,
                    "skipping malformed catalog row"
                );
                return None;
            }
        }
    }
    Some(out)
}

fn privilege(word: &str) -> Option<Privilege> {
    let parsed = Privilege::from_keyword(word);
    if parsed.is_none() {
        debug!(target: "grantsync::state", privilege = word, "ignoring unmodelled privilege");
    }
    parsed
}

fn is_true(value: &str) -> bool {
    matches!(value, "true" | "t" | "TRUE" | "YES" | "yes")
}
