//! The permission contract as authored
//!
//! [`PermissionContract`] mirrors the JSON document one-to-one. Privileges
//! are kept as the strings the author wrote; turning them into typed values
//! (and rejecting the ones that do not parse) is the validator's job, so a
//! typo surfaces as a whitelist error naming the bad token instead of an
//! opaque deserialization failure.
//!
//! ```json
//! {
//!   "contract_version": "1.4.3",
//!   "managed_principals": ["^grp_", "^usr_"],
//!   "schema_privileges": {"grp_geo": {"public": ["USAGE"]}},
//!   "object_privileges": {"grp_geo": {"public": {"rivers": ["SELECT"]}}},
//!   "default_privileges": [
//!     {"for_role": "usr_prof", "in_schema": "public", "on": "tables",
//!      "grants": {"grp_geo": ["SELECT"]}}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Version string a contract must carry, compared exactly
pub const CONTRACT_VERSION: &str = "1.4.3";

/// Role name patterns managed when a contract does not say otherwise
pub const BUILTIN_PRINCIPAL_PATTERNS: [&str; 2] = [r"^grp_[A-Za-z0-9_]+$", r"^usr_[A-Za-z0-9_]+$"];

/// `grantee -> privileges`
pub type GrantMap = BTreeMap<String, Vec<String>>;

/// `grantee -> schema -> privileges`
pub type SchemaGrantMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `grantee -> schema -> object -> privileges`
pub type ObjectGrantMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

/// How `managed_principals` entries are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalMode {
    /// Entries are regular expressions matched from the start of the name
    #[default]
    Regex,
    /// Entries are exact role names
    Literal,
    /// Exact role names that must also match the built-in patterns
    Conservative,
}

impl PrincipalMode {
    /// Lower-case name as serialized
    pub const fn name(&self) -> &'static str {
        match self {
            PrincipalMode::Regex => "regex",
            PrincipalMode::Literal => "literal",
            PrincipalMode::Conservative => "conservative",
        }
    }
}

impl fmt::Display for PrincipalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the contract applies
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractScope {
    /// Database the session must be connected to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Only schema the contract may mention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// One `ALTER DEFAULT PRIVILEGES` partition the contract wants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultPrivilegeEntry {
    /// Creator role; the session user when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_role: Option<String>,
    /// Schema the future objects are created in
    pub in_schema: String,
    /// `tables`, `sequences`, `functions` or `types`
    pub on: String,
    /// Privileges each grantee should receive on future objects
    #[serde(default)]
    pub grants: GrantMap,
}

/// The declarative desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionContract {
    /// Must equal [`CONTRACT_VERSION`]
    pub contract_version: String,
    /// Database and schema restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ContractScope>,
    /// Interpretation of `managed_principals`
    #[serde(default)]
    pub managed_principals_mode: PrincipalMode,
    /// Roles this contract may read and alter
    pub managed_principals: Vec<String>,
    /// Reconcile the default ACLs of every creator found in the database
    #[serde(default)]
    pub auto_onboard_creators: bool,
    /// Database-level grants
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub database_privileges: GrantMap,
    /// Schema-level grants
    #[serde(default)]
    pub schema_privileges: SchemaGrantMap,
    /// Relation-level grants
    #[serde(default)]
    pub object_privileges: ObjectGrantMap,
    /// Grants for objects created in the future
    #[serde(default)]
    pub default_privileges: Vec<DefaultPrivilegeEntry>,
}

impl PermissionContract {
    /// An empty contract managing `principals` as regexes
    pub fn new<I, P>(principals: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        PermissionContract {
            contract_version: CONTRACT_VERSION.to_string(),
            scope: None,
            managed_principals_mode: PrincipalMode::Regex,
            managed_principals: principals.into_iter().map(Into::into).collect(),
            auto_onboard_creators: false,
            database_privileges: BTreeMap::new(),
            schema_privileges: BTreeMap::new(),
            object_privileges: BTreeMap::new(),
            default_privileges: Vec::new(),
        }
    }

    /// The contract the engine ships with: built-in patterns, nothing granted
    pub fn builtin_default() -> Self {
        Self::new(BUILTIN_PRINCIPAL_PATTERNS)
    }

    /// Parse a JSON document; structural problems become [`Error::Schema`]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::schema(e.to_string()))
    }

    /// Read and parse a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::schema(format!("cannot read contract {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::schema(e.to_string()))
    }

    /// Set the principal mode
    pub fn with_mode(mut self, mode: PrincipalMode) -> Self {
        self.managed_principals_mode = mode;
        self
    }

    /// Restrict to a database and/or schema
    pub fn with_scope(mut self, database: Option<&str>, schema: Option<&str>) -> Self {
        self.scope = Some(ContractScope {
            database: database.map(str::to_string),
            schema: schema.map(str::to_string),
        });
        self
    }

    /// Toggle `auto_onboard_creators`
    pub fn with_auto_onboard(mut self, enabled: bool) -> Self {
        self.auto_onboard_creators = enabled;
        self
    }

    /// Add a database-level grant
    pub fn grant_database(mut self, grantee: &str, privileges: &[&str]) -> Self {
        self.database_privileges
            .insert(grantee.to_string(), to_strings(privileges));
        self
    }

    /// Add a schema-level grant
    pub fn grant_schema(mut self, grantee: &str, schema: &str, privileges: &[&str]) -> Self {
        self.schema_privileges
            .entry(grantee.to_string())
            .or_default()
            .insert(schema.to_string(), to_strings(privileges));
        self
    }

    /// Add an object-level grant
    pub fn grant_object(
        mut self,
        grantee: &str,
        schema: &str,
        object: &str,
        privileges: &[&str],
    ) -> Self {
        self.object_privileges
            .entry(grantee.to_string())
            .or_default()
            .entry(schema.to_string())
            .or_default()
            .insert(object.to_string(), to_strings(privileges));
        self
    }

    /// Add a default-privilege entry with a single grantee
    pub fn grant_default(
        mut self,
        for_role: Option<&str>,
        in_schema: &str,
        on: &str,
        grantee: &str,
        privileges: &[&str],
    ) -> Self {
        let mut grants = BTreeMap::new();
        grants.insert(grantee.to_string(), to_strings(privileges));
        self.default_privileges.push(DefaultPrivilegeEntry {
            for_role: for_role.map(str::to_string),
            in_schema: in_schema.to_string(),
            on: on.to_string(),
            grants,
        });
        self
    }
}

fn to_strings(privileges: &[&str]) -> Vec<String> {
    privileges.iter().map(|p| p.to_string()).collect()
}
