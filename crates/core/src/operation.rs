//! Operation value objects
//!
//! An [`Operation`] is one GRANT or REVOKE the reconciler decided on. It is
//! produced once, handed to a caller for preview, and then to the executor;
//! nothing mutates it along the way.
//!
//! The serialized shape is the wire format callers render and audit:
//!
//! ```json
//! {"action": "grant", "target": "SCHEMA", "schema": "public",
//!  "grantee": "roleA", "privileges": ["USAGE"]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::privilege::{DefaultObjectType, ObjectKind, PrivilegeToken};

/// GRANT or REVOKE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Add privileges
    Grant,
    /// Remove privileges
    Revoke,
}

impl Action {
    /// SQL verb
    pub const fn keyword(&self) -> &'static str {
        match self {
            Action::Grant => "GRANT",
            Action::Revoke => "REVOKE",
        }
    }

    /// `TO` for grants, `FROM` for revokes
    pub const fn preposition(&self) -> &'static str {
        match self {
            Action::Grant => "TO",
            Action::Revoke => "FROM",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// What an operation is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Target {
    /// `ON DATABASE`
    Database,
    /// `ON SCHEMA`
    Schema,
    /// `ON TABLE` (tables, views, materialized views)
    Table,
    /// `ON SEQUENCE`
    Sequence,
    /// `ALTER DEFAULT PRIVILEGES`
    Default,
}

impl Target {
    /// Target for an object-level grant on `kind`
    pub const fn for_object(kind: ObjectKind) -> Target {
        match kind {
            ObjectKind::Database => Target::Database,
            ObjectKind::Schema => Target::Schema,
            ObjectKind::Sequence => Target::Sequence,
            ObjectKind::Table | ObjectKind::View | ObjectKind::MaterializedView => Target::Table,
        }
    }

    /// Object kind whose whitelist applies; `None` for DEFAULT
    pub const fn object_kind(&self) -> Option<ObjectKind> {
        match self {
            Target::Database => Some(ObjectKind::Database),
            Target::Schema => Some(ObjectKind::Schema),
            Target::Table => Some(ObjectKind::Table),
            Target::Sequence => Some(ObjectKind::Sequence),
            Target::Default => None,
        }
    }

    /// Upper-case name as serialized
    pub const fn name(&self) -> &'static str {
        match self {
            Target::Database => "DATABASE",
            Target::Schema => "SCHEMA",
            Target::Table => "TABLE",
            Target::Sequence => "SEQUENCE",
            Target::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Advisory marker attached to an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Badge {
    /// The revoke touches an object other objects depend on
    #[serde(rename = "WARN-DEPEND")]
    WarnDepend,
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::WarnDepend => f.write_str("WARN-DEPEND"),
        }
    }
}

/// A schema-qualified relation name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Schema name
    pub schema: String,
    /// Relation name
    pub object: String,
}

impl ObjectRef {
    /// Create a reference
    pub fn new(schema: impl Into<String>, object: impl Into<String>) -> Self {
        ObjectRef {
            schema: schema.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.object)
    }
}

/// A single privilege change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Grant or revoke
    pub action: Action,
    /// What kind of object
    pub target: Target,
    /// Database name (DATABASE targets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Schema name (every target except DATABASE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Relation name (TABLE / SEQUENCE targets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Creator role whose default ACL is changed (DEFAULT targets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Object class of a default-privilege change (DEFAULT targets)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<DefaultObjectType>,
    /// Role receiving or losing the privileges
    pub grantee: String,
    /// Sorted privilege tokens; empty means ALL PRIVILEGES
    #[serde(default)]
    pub privileges: Vec<PrivilegeToken>,
    /// Advisory marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
    /// Objects depending on the target, when `badge` is WARN-DEPEND
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ObjectRef>,
}

impl Operation {
    fn base(action: Action, target: Target, grantee: &str, privileges: Vec<PrivilegeToken>) -> Self {
        Operation {
            action,
            target,
            database: None,
            schema: None,
            object: None,
            owner: None,
            object_type: None,
            grantee: grantee.to_string(),
            privileges,
            badge: None,
            dependencies: Vec::new(),
        }
    }

    /// `GRANT|REVOKE <privs> ON DATABASE <database>`
    pub fn database(
        action: Action,
        database: &str,
        grantee: &str,
        privileges: impl IntoIterator<Item = PrivilegeToken>,
    ) -> Self {
        let mut op = Self::base(action, Target::Database, grantee, sorted(privileges));
        op.database = Some(database.to_string());
        op
    }

    /// `GRANT|REVOKE <privs> ON SCHEMA <schema>`
    pub fn schema(
        action: Action,
        schema: &str,
        grantee: &str,
        privileges: impl IntoIterator<Item = PrivilegeToken>,
    ) -> Self {
        let mut op = Self::base(action, Target::Schema, grantee, sorted(privileges));
        op.schema = Some(schema.to_string());
        op
    }

    /// `GRANT|REVOKE <privs> ON TABLE|SEQUENCE <schema>.<object>`
    pub fn object(
        action: Action,
        kind: ObjectKind,
        schema: &str,
        object: &str,
        grantee: &str,
        privileges: impl IntoIterator<Item = PrivilegeToken>,
    ) -> Self {
        let mut op = Self::base(action, Target::for_object(kind), grantee, sorted(privileges));
        op.schema = Some(schema.to_string());
        op.object = Some(object.to_string());
        op
    }

    /// `ALTER DEFAULT PRIVILEGES [FOR ROLE <owner>] IN SCHEMA <schema> ...`
    pub fn default_privileges(
        action: Action,
        owner: Option<&str>,
        schema: &str,
        object_type: DefaultObjectType,
        grantee: &str,
        privileges: impl IntoIterator<Item = PrivilegeToken>,
    ) -> Self {
        let mut op = Self::base(action, Target::Default, grantee, sorted(privileges));
        op.schema = Some(schema.to_string());
        op.owner = owner.map(str::to_string);
        op.object_type = Some(object_type);
        op
    }

    /// Attach the dependency list; a non-empty list sets WARN-DEPEND
    pub fn with_dependencies(mut self, dependencies: Vec<ObjectRef>) -> Self {
        if !dependencies.is_empty() {
            self.badge = Some(Badge::WarnDepend);
        }
        self.dependencies = dependencies;
        self
    }

    /// True when the operation carries WARN-DEPEND
    pub fn has_dependency_warning(&self) -> bool {
        self.badge == Some(Badge::WarnDepend)
    }

    /// Human-readable target, e.g. `SCHEMA public` or `TABLE public.t1`
    pub fn describe_target(&self) -> String {
        let schema = self.schema.as_deref().unwrap_or("");
        match self.target {
            Target::Database => format!("DATABASE {}", self.database.as_deref().unwrap_or("")),
            Target::Schema => format!("SCHEMA {}", schema),
            Target::Table | Target::Sequence => format!(
                "{} {}.{}",
                self.target,
                schema,
                self.object.as_deref().unwrap_or("")
            ),
            Target::Default => {
                let object_type = self.object_type.map(|t| t.keyword()).unwrap_or("");
                match &self.owner {
                    Some(owner) => format!("DEFAULT {} IN {} FOR {}", object_type, schema, owner),
                    None => format!("DEFAULT {} IN {}", object_type, schema),
                }
            }
        }
    }
}

fn sorted(privileges: impl IntoIterator<Item = PrivilegeToken>) -> Vec<PrivilegeToken> {
    let mut v: Vec<PrivilegeToken> = privileges.into_iter().collect();
    v.sort();
    v.dedup();
    v
}
