//! Privilege keywords, grant-option tokens and object kinds
//!
//! Every privilege the engine handles is one of the upper-cased PostgreSQL
//! keywords enumerated by [`Privilege`]. Which keywords are legal depends on
//! the object they apply to; the per-kind whitelist lives on [`ObjectKind`]
//! and [`DefaultObjectType`].
//!
//! ## Grant option
//!
//! A [`PrivilegeToken`] is a privilege plus a grant-option flag. Its text
//! form carries a trailing `*` when the grant option is held, so `SELECT*`
//! means "SELECT WITH GRANT OPTION".
//!
//! ## Ordering
//!
//! Variants are declared in lexicographic keyword order so that the derived
//! `Ord` matches sorting the keywords as strings. Diff output relies on it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Set of privileges without grant-option information
pub type PrivilegeSet = BTreeSet<Privilege>;

/// Set of privilege tokens (privilege + grant option)
pub type TokenSet = BTreeSet<PrivilegeToken>;

/// A PostgreSQL privilege keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Privilege {
    /// CONNECT (databases)
    Connect,
    /// CREATE (databases, schemas)
    Create,
    /// DELETE (tables)
    Delete,
    /// EXECUTE (functions)
    Execute,
    /// INSERT (tables)
    Insert,
    /// REFERENCES (tables)
    References,
    /// SELECT (tables, sequences)
    Select,
    /// TEMPORARY (databases)
    Temporary,
    /// TRIGGER (tables)
    Trigger,
    /// TRUNCATE (tables)
    Truncate,
    /// UPDATE (tables, sequences)
    Update,
    /// USAGE (schemas, sequences, types)
    Usage,
}

impl Privilege {
    /// All privilege keywords, in sort order
    pub const ALL: [Privilege; 12] = [
        Privilege::Connect,
        Privilege::Create,
        Privilege::Delete,
        Privilege::Execute,
        Privilege::Insert,
        Privilege::References,
        Privilege::Select,
        Privilege::Temporary,
        Privilege::Trigger,
        Privilege::Truncate,
        Privilege::Update,
        Privilege::Usage,
    ];

    /// The SQL keyword
    pub const fn keyword(&self) -> &'static str {
        match self {
            Privilege::Connect => "CONNECT",
            Privilege::Create => "CREATE",
            Privilege::Delete => "DELETE",
            Privilege::Execute => "EXECUTE",
            Privilege::Insert => "INSERT",
            Privilege::References => "REFERENCES",
            Privilege::Select => "SELECT",
            Privilege::Temporary => "TEMPORARY",
            Privilege::Trigger => "TRIGGER",
            Privilege::Truncate => "TRUNCATE",
            Privilege::Update => "UPDATE",
            Privilege::Usage => "USAGE",
        }
    }

    /// Parse a keyword, case-insensitively. `TEMP` is accepted for TEMPORARY.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let upper = word.trim().to_ascii_uppercase();
        if upper == "TEMP" {
            return Some(Privilege::Temporary);
        }
        Self::ALL.iter().copied().find(|p| p.keyword() == upper)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Privilege::from_keyword(s).ok_or_else(|| format!("unknown privilege '{}'", s))
    }
}

impl TryFrom<String> for Privilege {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Privilege> for String {
    fn from(p: Privilege) -> Self {
        p.keyword().to_string()
    }
}

/// A privilege together with its grant-option flag
///
/// Text form: `SELECT` or `SELECT*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrivilegeToken {
    /// The privilege keyword
    pub privilege: Privilege,
    /// Whether the grantee may re-grant it
    pub grant_option: bool,
}

impl PrivilegeToken {
    /// A token without grant option
    pub const fn plain(privilege: Privilege) -> Self {
        PrivilegeToken {
            privilege,
            grant_option: false,
        }
    }

    /// A token held WITH GRANT OPTION
    pub const fn grantable(privilege: Privilege) -> Self {
        PrivilegeToken {
            privilege,
            grant_option: true,
        }
    }
}

impl From<Privilege> for PrivilegeToken {
    fn from(privilege: Privilege) -> Self {
        PrivilegeToken::plain(privilege)
    }
}

impl fmt::Display for PrivilegeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.grant_option {
            write!(f, "{}*", self.privilege)
        } else {
            write!(f, "{}", self.privilege)
        }
    }
}

impl FromStr for PrivilegeToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (word, grant_option) = match trimmed.strip_suffix('*') {
            Some(word) => (word, true),
            None => (trimmed, false),
        };
        let privilege =
            Privilege::from_keyword(word).ok_or_else(|| format!("unknown privilege '{}'", s))?;
        Ok(PrivilegeToken {
            privilege,
            grant_option,
        })
    }
}

impl TryFrom<String> for PrivilegeToken {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PrivilegeToken> for String {
    fn from(t: PrivilegeToken) -> Self {
        t.to_string()
    }
}

const DATABASE_PRIVILEGES: &[Privilege] =
    &[Privilege::Connect, Privilege::Create, Privilege::Temporary];
const SCHEMA_PRIVILEGES: &[Privilege] = &[Privilege::Create, Privilege::Usage];
const TABLE_PRIVILEGES: &[Privilege] = &[
    Privilege::Delete,
    Privilege::Insert,
    Privilege::References,
    Privilege::Select,
    Privilege::Trigger,
    Privilege::Truncate,
    Privilege::Update,
];
const SEQUENCE_PRIVILEGES: &[Privilege] = &[Privilege::Select, Privilege::Update, Privilege::Usage];
const FUNCTION_PRIVILEGES: &[Privilege] = &[Privilege::Execute];
const TYPE_PRIVILEGES: &[Privilege] = &[Privilege::Usage];

/// Kind of object a privilege applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A database
    Database,
    /// A schema
    Schema,
    /// Ordinary or partitioned table (relkind `r` / `p`)
    Table,
    /// View (relkind `v`)
    View,
    /// Materialized view (relkind `m`)
    MaterializedView,
    /// Sequence (relkind `S`)
    Sequence,
}

impl ObjectKind {
    /// Relation kinds returned by object listing when no filter is given
    pub const DEFAULT_RELATIONS: [ObjectKind; 4] = [
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::MaterializedView,
        ObjectKind::Sequence,
    ];

    /// Map a `pg_class.relkind` code
    pub fn from_relkind(code: &str) -> Option<Self> {
        match code {
            "r" | "p" => Some(ObjectKind::Table),
            "v" => Some(ObjectKind::View),
            "m" => Some(ObjectKind::MaterializedView),
            "S" => Some(ObjectKind::Sequence),
            _ => None,
        }
    }

    /// The `pg_class.relkind` code, for relation kinds
    pub const fn relkind(&self) -> Option<&'static str> {
        match self {
            ObjectKind::Table => Some("r"),
            ObjectKind::View => Some("v"),
            ObjectKind::MaterializedView => Some("m"),
            ObjectKind::Sequence => Some("S"),
            ObjectKind::Database | ObjectKind::Schema => None,
        }
    }

    /// Keyword used after `ON` in GRANT/REVOKE. Views use TABLE.
    pub const fn grant_keyword(&self) -> &'static str {
        match self {
            ObjectKind::Database => "DATABASE",
            ObjectKind::Schema => "SCHEMA",
            ObjectKind::Table | ObjectKind::View | ObjectKind::MaterializedView => "TABLE",
            ObjectKind::Sequence => "SEQUENCE",
        }
    }

    /// Privileges that may be granted on this kind
    pub const fn allowed_privileges(&self) -> &'static [Privilege] {
        match self {
            ObjectKind::Database => DATABASE_PRIVILEGES,
            ObjectKind::Schema => SCHEMA_PRIVILEGES,
            ObjectKind::Table | ObjectKind::View | ObjectKind::MaterializedView => {
                TABLE_PRIVILEGES
            }
            ObjectKind::Sequence => SEQUENCE_PRIVILEGES,
        }
    }

    /// Whether `privilege` is on this kind's whitelist
    pub fn allows(&self, privilege: Privilege) -> bool {
        self.allowed_privileges().contains(&privilege)
    }

    /// Lower-case name used in messages
    pub const fn name(&self) -> &'static str {
        match self {
            ObjectKind::Database => "database",
            ObjectKind::Schema => "schema",
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::MaterializedView => "materialized view",
            ObjectKind::Sequence => "sequence",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object class covered by `ALTER DEFAULT PRIVILEGES`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefaultObjectType {
    /// Future functions
    Functions,
    /// Future sequences
    Sequences,
    /// Future tables (and views)
    Tables,
    /// Future types
    Types,
}

impl DefaultObjectType {
    /// All object types, in sort order
    pub const ALL: [DefaultObjectType; 4] = [
        DefaultObjectType::Functions,
        DefaultObjectType::Sequences,
        DefaultObjectType::Tables,
        DefaultObjectType::Types,
    ];

    /// Parse the contract's `on` field (`tables`, `sequences`, ...)
    pub fn from_contract(on: &str) -> Option<Self> {
        match on.trim().to_ascii_lowercase().as_str() {
            "tables" => Some(DefaultObjectType::Tables),
            "sequences" => Some(DefaultObjectType::Sequences),
            "functions" => Some(DefaultObjectType::Functions),
            "types" => Some(DefaultObjectType::Types),
            _ => None,
        }
    }

    /// Keyword used after `ON` in ALTER DEFAULT PRIVILEGES
    pub const fn keyword(&self) -> &'static str {
        match self {
            DefaultObjectType::Functions => "FUNCTIONS",
            DefaultObjectType::Sequences => "SEQUENCES",
            DefaultObjectType::Tables => "TABLES",
            DefaultObjectType::Types => "TYPES",
        }
    }

    /// `pg_default_acl.defaclobjtype` code
    pub const fn defacl_code(&self) -> &'static str {
        match self {
            DefaultObjectType::Functions => "f",
            DefaultObjectType::Sequences => "S",
            DefaultObjectType::Tables => "r",
            DefaultObjectType::Types => "T",
        }
    }

    /// Map a `pg_default_acl.defaclobjtype` code
    pub fn from_defacl_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.defacl_code() == code)
    }

    /// Privileges that may appear in default ACLs for this type
    pub const fn allowed_privileges(&self) -> &'static [Privilege] {
        match self {
            DefaultObjectType::Functions => FUNCTION_PRIVILEGES,
            DefaultObjectType::Sequences => SEQUENCE_PRIVILEGES,
            DefaultObjectType::Tables => TABLE_PRIVILEGES,
            DefaultObjectType::Types => TYPE_PRIVILEGES,
        }
    }

    /// Whether `privilege` is on this type's whitelist
    pub fn allows(&self, privilege: Privilege) -> bool {
        self.allowed_privileges().contains(&privilege)
    }
}

impl fmt::Display for DefaultObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Convert plain privileges into tokens without grant option
pub fn plain_tokens(privileges: &PrivilegeSet) -> TokenSet {
    privileges.iter().copied().map(PrivilegeToken::plain).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_order_matches_derived_order() {
        let mut keywords: Vec<&str> = Privilege::ALL.iter().map(|p| p.keyword()).collect();
        let declared = keywords.clone();
        keywords.sort();
        assert_eq!(keywords, declared);
    }

    #[test]
    fn test_from_keyword_case_insensitive() {
        assert_eq!(Privilege::from_keyword("select"), Some(Privilege::Select));
        assert_eq!(Privilege::from_keyword(" Usage "), Some(Privilege::Usage));
        assert_eq!(Privilege::from_keyword("TEMP"), Some(Privilege::Temporary));
        assert_eq!(Privilege::from_keyword("BAD"), None);
    }

    #[test]
    fn test_token_grant_option_text_form() {
        let token: PrivilegeToken = "SELECT*".parse().unwrap();
        assert_eq!(token, PrivilegeToken::grantable(Privilege::Select));
        assert_eq!(token.to_string(), "SELECT*");

        let plain: PrivilegeToken = "select".parse().unwrap();
        assert_eq!(plain.to_string(), "SELECT");
        assert!("SELEC*".parse::<PrivilegeToken>().is_err());
    }

    #[test]
    fn test_token_sorting_puts_plain_before_grantable() {
        let mut tokens = vec![
            PrivilegeToken::grantable(Privilege::Select),
            PrivilegeToken::plain(Privilege::Insert),
            PrivilegeToken::plain(Privilege::Select),
        ];
        tokens.sort();
        let text: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        assert_eq!(text, vec!["INSERT", "SELECT", "SELECT*"]);
    }

    #[test]
    fn test_token_serde_as_string() {
        let token = PrivilegeToken::grantable(Privilege::Update);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"UPDATE*\"");
        let back: PrivilegeToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert!(serde_json::from_str::<PrivilegeToken>("\"NOPE\"").is_err());
    }

    #[test]
    fn test_relkind_mapping() {
        assert_eq!(ObjectKind::from_relkind("r"), Some(ObjectKind::Table));
        assert_eq!(ObjectKind::from_relkind("p"), Some(ObjectKind::Table));
        assert_eq!(ObjectKind::from_relkind("v"), Some(ObjectKind::View));
        assert_eq!(
            ObjectKind::from_relkind("m"),
            Some(ObjectKind::MaterializedView)
        );
        assert_eq!(ObjectKind::from_relkind("S"), Some(ObjectKind::Sequence));
        assert_eq!(ObjectKind::from_relkind("i"), None);

        assert_eq!(ObjectKind::View.grant_keyword(), "TABLE");
        assert_eq!(ObjectKind::MaterializedView.grant_keyword(), "TABLE");
        assert_eq!(ObjectKind::Sequence.grant_keyword(), "SEQUENCE");
    }

    #[test]
    fn test_whitelists() {
        assert!(ObjectKind::Schema.allows(Privilege::Usage));
        assert!(!ObjectKind::Schema.allows(Privilege::Select));
        assert!(ObjectKind::Database.allows(Privilege::Temporary));
        assert!(!ObjectKind::Sequence.allows(Privilege::Insert));
        assert!(ObjectKind::View.allows(Privilege::Select));
        assert!(DefaultObjectType::Functions.allows(Privilege::Execute));
        assert!(!DefaultObjectType::Types.allows(Privilege::Select));
    }

    #[test]
    fn test_default_object_type_codes() {
        for t in DefaultObjectType::ALL {
            assert_eq!(DefaultObjectType::from_defacl_code(t.defacl_code()), Some(t));
        }
        assert_eq!(
            DefaultObjectType::from_contract("Tables"),
            Some(DefaultObjectType::Tables)
        );
        assert_eq!(DefaultObjectType::from_contract("views"), None);
        assert_eq!(
            serde_json::to_string(&DefaultObjectType::Tables).unwrap(),
            "\"TABLES\""
        );
    }
}
