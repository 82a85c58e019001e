//! In-memory PostgreSQL stand-in
//!
//! [`ReferenceCatalog`] implements [`PgSession`] well enough to run the
//! whole read → diff → apply cycle without a server:
//!
//! - catalog queries from [`crate::state::queries`] are answered from
//!   in-memory ACL maps, with the same column shapes the real queries have
//! - the GRANT / REVOKE / ALTER DEFAULT PRIVILEGES statements the executor
//!   emits are parsed and applied, with PostgreSQL's error codes for
//!   unknown roles, schemas and relations
//! - BEGIN / COMMIT / ROLLBACK snapshot and restore the whole state
//! - lock contention (`55P03`) and arbitrary statement failures can be
//!   injected
//!
//! Compiled for this crate's tests and behind the `testing` feature.

use std::collections::{BTreeMap, BTreeSet};

use grantsync_core::{DefaultObjectType, ObjectKind, ObjectRef, Privilege, PrivilegeToken};

use crate::session::{PgSession, Row, SessionError};
use crate::state::queries;

/// SQLSTATE `lock_not_available`
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Debug, Clone)]
struct Relation {
    kind: ObjectKind,
    /// `grantee -> privilege -> grant option`
    acl: BTreeMap<String, BTreeMap<Privilege, bool>>,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    roles: BTreeSet<String>,
    database_acl: BTreeMap<String, BTreeSet<Privilege>>,
    /// `schema -> grantee -> privileges`
    schemas: BTreeMap<String, BTreeMap<String, BTreeSet<Privilege>>>,
    relations: BTreeMap<(String, String), Relation>,
    /// `(owner, schema, type) -> grantee -> privileges`
    defaults: BTreeMap<(String, String, DefaultObjectType), BTreeMap<String, BTreeSet<Privilege>>>,
    /// `(schema, relation) -> dependents`
    dependents: BTreeMap<(String, String), BTreeSet<ObjectRef>>,
}

/// In-memory PostgreSQL catalog
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    database: String,
    user: String,
    state: CatalogState,
    snapshot: Option<CatalogState>,
    executed: Vec<String>,
    lock_failures: usize,
    failing: Vec<(String, SessionError)>,
    commits: usize,
    rollbacks: usize,
}

impl Default for ReferenceCatalog {
    fn default() -> Self {
        Self::new("classroom")
    }
}

impl ReferenceCatalog {
    /// Empty catalog for `database`, session user `postgres`, with schema `public`
    pub fn new(database: &str) -> Self {
        let mut state = CatalogState::default();
        state.schemas.insert("public".to_string(), BTreeMap::new());
        ReferenceCatalog {
            database: database.to_string(),
            user: "postgres".to_string(),
            state,
            snapshot: None,
            executed: Vec::new(),
            lock_failures: 0,
            failing: Vec::new(),
            commits: 0,
            rollbacks: 0,
        }
    }

    // ------------------------------------------------------------------
    // Setup

    /// Set the session user
    pub fn with_user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self.state.roles.insert(user.to_string());
        self
    }

    /// Add roles
    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.state.roles.extend(roles.iter().map(|r| r.to_string()));
        self
    }

    /// Add a schema
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.state.schemas.entry(schema.to_string()).or_default();
        self
    }

    /// Add a relation of `kind`, creating its schema if needed
    pub fn with_relation(mut self, schema: &str, name: &str, kind: ObjectKind) -> Self {
        self.state.schemas.entry(schema.to_string()).or_default();
        self.state.relations.insert(
            (schema.to_string(), name.to_string()),
            Relation {
                kind,
                acl: BTreeMap::new(),
            },
        );
        self
    }

    /// Add a table
    pub fn with_table(self, schema: &str, name: &str) -> Self {
        self.with_relation(schema, name, ObjectKind::Table)
    }

    /// Add a sequence
    pub fn with_sequence(self, schema: &str, name: &str) -> Self {
        self.with_relation(schema, name, ObjectKind::Sequence)
    }

    /// Add a view depending on `base` (`(schema, relation)` pairs)
    pub fn with_view(mut self, schema: &str, name: &str, base: &[(&str, &str)]) -> Self {
        self = self.with_relation(schema, name, ObjectKind::View);
        for (base_schema, base_name) in base {
            self.state
                .dependents
                .entry((base_schema.to_string(), base_name.to_string()))
                .or_default()
                .insert(ObjectRef::new(schema, name));
        }
        self
    }

    /// Seed a database-level grant
    pub fn with_database_grant(mut self, grantee: &str, privileges: &[Privilege]) -> Self {
        self.state
            .database_acl
            .entry(grantee.to_string())
            .or_default()
            .extend(privileges.iter().copied());
        self
    }

    /// Seed a schema-level grant
    pub fn with_schema_grant(mut self, grantee: &str, schema: &str, privileges: &[Privilege]) -> Self {
        self.state
            .schemas
            .entry(schema.to_string())
            .or_default()
            .entry(grantee.to_string())
            .or_default()
            .extend(privileges.iter().copied());
        self
    }

    /// Seed an object-level grant; the relation must already exist
    pub fn with_object_grant(
        mut self,
        grantee: &str,
        schema: &str,
        name: &str,
        tokens: &[PrivilegeToken],
    ) -> Self {
        if let Some(rel) = self
            .state
            .relations
            .get_mut(&(schema.to_string(), name.to_string()))
        {
            let acl = rel.acl.entry(grantee.to_string()).or_default();
            for token in tokens {
                let held = acl.entry(token.privilege).or_insert(false);
                *held |= token.grant_option;
            }
        }
        self
    }

    /// Seed a default-privilege grant
    pub fn with_default_grant(
        mut self,
        owner: &str,
        schema: &str,
        object_type: DefaultObjectType,
        grantee: &str,
        privileges: &[Privilege],
    ) -> Self {
        self.state
            .defaults
            .entry((owner.to_string(), schema.to_string(), object_type))
            .or_default()
            .entry(grantee.to_string())
            .or_default()
            .extend(privileges.iter().copied());
        self
    }

    /// Fail the first DDL statement of the next `n` attempts with `55P03`
    pub fn fail_with_lock(mut self, n: usize) -> Self {
        self.lock_failures = n;
        self
    }

    /// Fail every statement containing `fragment` with `code`
    pub fn fail_statement(mut self, fragment: &str, code: &str, message: &str) -> Self {
        self.failing
            .push((fragment.to_string(), SessionError::with_code(code, message)));
        self
    }

    // ------------------------------------------------------------------
    // Inspection

    /// Every statement passed to `execute`, in order, including failed ones
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// GRANT / REVOKE / ALTER statements passed to `execute`
    pub fn ddl(&self) -> Vec<&str> {
        self.executed
            .iter()
            .map(String::as_str)
            .filter(|s| is_ddl(s))
            .collect()
    }

    /// Forget the statement log
    pub fn clear_log(&mut self) {
        self.executed.clear();
    }

    /// Committed transactions
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Rolled back transactions
    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Privileges `grantee` holds on `schema`
    pub fn schema_grants(&self, grantee: &str, schema: &str) -> BTreeSet<Privilege> {
        self.state
            .schemas
            .get(schema)
            .and_then(|g| g.get(grantee))
            .cloned()
            .unwrap_or_default()
    }

    /// Tokens `grantee` holds on `schema.name`
    pub fn object_grants(&self, grantee: &str, schema: &str, name: &str) -> BTreeSet<PrivilegeToken> {
        self.state
            .relations
            .get(&(schema.to_string(), name.to_string()))
            .and_then(|rel| rel.acl.get(grantee))
            .map(|acl| {
                acl.iter()
                    .map(|(p, g)| PrivilegeToken {
                        privilege: *p,
                        grant_option: *g,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Default privileges `grantee` receives from `owner` in `schema`
    pub fn default_grants(
        &self,
        owner: &str,
        schema: &str,
        object_type: DefaultObjectType,
        grantee: &str,
    ) -> BTreeSet<Privilege> {
        self.state
            .defaults
            .get(&(owner.to_string(), schema.to_string(), object_type))
            .and_then(|g| g.get(grantee))
            .cloned()
            .unwrap_or_default()
    }

    /// Privileges `grantee` holds on the database
    pub fn database_grants(&self, grantee: &str) -> BTreeSet<Privilege> {
        self.state
            .database_acl
            .get(grantee)
            .cloned()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Query answering

    fn answer(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError> {
        let param = |i: usize| param(params, i);
        let s = &self.state;

        if sql == queries::LIST_ROLES {
            return Ok(s
                .roles
                .iter()
                .filter(|r| !r.starts_with("pg_") && r.as_str() != "postgres")
                .map(|r| row(&[r.as_str()]))
                .collect());
        }
        if sql == queries::CURRENT_DATABASE {
            return Ok(vec![row(&[self.database.as_str()])]);
        }
        if sql == queries::CURRENT_USER {
            return Ok(vec![row(&[self.user.as_str()])]);
        }
        if sql == queries::DATABASE_PRIVILEGES {
            let role = param(0)?;
            return Ok(s
                .database_acl
                .get(role)
                .into_iter()
                .flatten()
                .map(|p| row(&[p.keyword()]))
                .collect());
        }
        if sql == queries::SCHEMA_PRIVILEGES {
            let role = param(0)?;
            let mut rows = Vec::new();
            for (schema, grantees) in &s.schemas {
                for p in grantees.get(role).into_iter().flatten() {
                    rows.push(row(&[schema.as_str(), p.keyword()]));
                }
            }
            return Ok(rows);
        }
        if sql == queries::OBJECTS {
            let schema = param(0)?;
            let codes: BTreeSet<&str> = param(1)?.split(',').collect();
            return Ok(s
                .relations
                .iter()
                .filter(|((rs, _), rel)| {
                    rs == schema && rel.kind.relkind().map_or(false, |c| codes.contains(c))
                })
                .map(|((_, name), rel)| row(&[name.as_str(), rel.kind.relkind().unwrap_or("r")]))
                .collect());
        }
        if sql == queries::OBJECT_ACLS {
            let key = (param(0)?.to_string(), param(1)?.to_string());
            let mut rows = Vec::new();
            if let Some(rel) = s.relations.get(&key) {
                for (grantee, acl) in &rel.acl {
                    for (p, grant_option) in acl {
                        let flag = if *grant_option { "true" } else { "false" };
                        rows.push(row(&[grantee.as_str(), p.keyword(), flag]));
                    }
                }
            }
            return Ok(rows);
        }
        if sql == queries::DEFAULT_PRIVILEGES {
            let code = param(0)?;
            let owner = param(1)?;
            let schema = param(2)?;
            let mut rows = Vec::new();
            for ((o, sch, t), grantees) in &s.defaults {
                if t.defacl_code() != code
                    || (!owner.is_empty() && o != owner)
                    || (!schema.is_empty() && sch != schema)
                {
                    continue;
                }
                for (grantee, privileges) in grantees {
                    if grantee == o {
                        continue;
                    }
                    for p in privileges {
                        rows.push(row(&[o.as_str(), sch.as_str(), grantee.as_str(), p.keyword()]));
                    }
                }
            }
            return Ok(rows);
        }
        if sql == queries::DEPENDENCIES {
            let key = (param(0)?.to_string(), param(1)?.to_string());
            return Ok(s
                .dependents
                .get(&key)
                .into_iter()
                .flatten()
                .map(|d| row(&[d.schema.as_str(), d.object.as_str()]))
                .collect());
        }
        Err(SessionError::with_code("42601", "unsupported query"))
    }

    // ------------------------------------------------------------------
    // Statement application

    fn apply(&mut self, sql: &str) -> Result<(), SessionError> {
        let tokens = tokenize(sql)?;
        let mut p = Parser { tokens, pos: 0 };

        if p.eat_word("SET") {
            return Ok(());
        }

        if p.eat_word("ALTER") {
            p.expect_word("DEFAULT")?;
            p.expect_word("PRIVILEGES")?;
            let owner = if p.eat_word("FOR") {
                p.expect_word("ROLE")?;
                p.ident()?
            } else {
                self.user.clone()
            };
            p.expect_word("IN")?;
            p.expect_word("SCHEMA")?;
            let schema = p.ident()?;
            let change = p.change(TargetSyntax::Default)?;
            return self.apply_default(owner, schema, change);
        }

        let change = p.change(TargetSyntax::Object)?;
        self.apply_change(change)
    }

    fn check_role(&self, role: &str) -> Result<(), SessionError> {
        if role == "PUBLIC" || self.state.roles.contains(role) {
            Ok(())
        } else {
            Err(SessionError::with_code(
                "42704",
                format!("role \"{}\" does not exist", role),
            ))
        }
    }

    fn check_schema(&self, schema: &str) -> Result<(), SessionError> {
        if self.state.schemas.contains_key(schema) {
            Ok(())
        } else {
            Err(SessionError::with_code(
                "3F000",
                format!("schema \"{}\" does not exist", schema),
            ))
        }
    }

    fn apply_default(&mut self, owner: String, schema: String, change: Change) -> Result<(), SessionError> {
        self.check_role(&owner)?;
        self.check_schema(&schema)?;
        self.check_role(&change.grantee)?;
        let Target::Default(object_type) = change.target else {
            return Err(syntax("expected object type"));
        };
        let privileges = expand(change.privileges, object_type.allowed_privileges(), |p| {
            object_type.allows(p)
        })?;

        let partition = self
            .state
            .defaults
            .entry((owner.clone(), schema.clone(), object_type))
            .or_default();
        let held = partition.entry(change.grantee.clone()).or_default();
        if change.grant {
            held.extend(privileges);
        } else {
            for p in &privileges {
                held.remove(p);
            }
            if held.is_empty() {
                partition.remove(&change.grantee);
            }
        }
        if partition.is_empty() {
            self.state.defaults.remove(&(owner, schema, object_type));
        }
        Ok(())
    }

    fn apply_change(&mut self, change: Change) -> Result<(), SessionError> {
        self.check_role(&change.grantee)?;
        match change.target.clone() {
            Target::Database(name) => {
                if name != self.database {
                    return Err(SessionError::with_code(
                        "3D000",
                        format!("database \"{}\" does not exist", name),
                    ));
                }
                let privileges = expand(
                    change.privileges,
                    ObjectKind::Database.allowed_privileges(),
                    |p| ObjectKind::Database.allows(p),
                )?;
                let held = self.state.database_acl.entry(change.grantee.clone()).or_default();
                apply_plain(held, &privileges, change.grant);
                if held.is_empty() {
                    self.state.database_acl.remove(&change.grantee);
                }
            }
            Target::Schema(schema) => {
                self.check_schema(&schema)?;
                let privileges = expand(
                    change.privileges,
                    ObjectKind::Schema.allowed_privileges(),
                    |p| ObjectKind::Schema.allows(p),
                )?;
                if let Some(grantees) = self.state.schemas.get_mut(&schema) {
                    let held = grantees.entry(change.grantee.clone()).or_default();
                    apply_plain(held, &privileges, change.grant);
                    if held.is_empty() {
                        grantees.remove(&change.grantee);
                    }
                }
            }
            Target::Relation(keyword, schema, name) => {
                self.check_schema(&schema)?;
                let Some(rel) = self.state.relations.get_mut(&(schema.clone(), name.clone())) else {
                    return Err(SessionError::with_code(
                        "42P01",
                        format!("relation \"{}.{}\" does not exist", schema, name),
                    ));
                };
                if keyword == ObjectKind::Sequence && rel.kind != ObjectKind::Sequence {
                    return Err(SessionError::with_code(
                        "42809",
                        format!("\"{}\" is not a sequence", name),
                    ));
                }
                let kind = rel.kind;
                let privileges =
                    expand(change.privileges, kind.allowed_privileges(), |p| kind.allows(p))?;
                let acl = rel.acl.entry(change.grantee.clone()).or_default();
                for p in privileges {
                    if change.grant {
                        let held = acl.entry(p).or_insert(false);
                        *held |= change.with_grant_option;
                    } else {
                        acl.remove(&p);
                    }
                }
                if acl.is_empty() {
                    rel.acl.remove(&change.grantee);
                }
            }
            Target::Default(_) => return Err(syntax("object type outside ALTER DEFAULT PRIVILEGES")),
        }
        Ok(())
    }
}

impl PgSession for ReferenceCatalog {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError> {
        self.answer(sql, params)
    }

    fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        self.executed.push(sql.to_string());
        let trimmed = sql.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "BEGIN" => {
                if self.snapshot.is_some() {
                    return Err(SessionError::with_code(
                        "25001",
                        "there is already a transaction in progress",
                    ));
                }
                self.snapshot = Some(self.state.clone());
                return Ok(());
            }
            "COMMIT" => {
                self.snapshot = None;
                self.commits += 1;
                return Ok(());
            }
            "ROLLBACK" => {
                if let Some(saved) = self.snapshot.take() {
                    self.state = saved;
                }
                self.rollbacks += 1;
                return Ok(());
            }
            _ => {}
        }

        if let Some((_, err)) = self.failing.iter().find(|(f, _)| trimmed.contains(f.as_str())) {
            return Err(err.clone());
        }
        if is_ddl(trimmed) && self.lock_failures > 0 {
            self.lock_failures -= 1;
            return Err(SessionError::with_code(
                LOCK_NOT_AVAILABLE,
                "could not obtain lock on relation",
            ));
        }
        self.apply(trimmed)
    }
}

fn is_ddl(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    upper.starts_with("GRANT") || upper.starts_with("REVOKE") || upper.starts_with("ALTER")
}

fn param<'a>(params: &[&'a str], i: usize) -> Result<&'a str, SessionError> {
    params
        .get(i)
        .copied()
        .ok_or_else(|| SessionError::with_code("08P01", format!("missing parameter ${}", i + 1)))
}

fn row(cols: &[&str]) -> Row {
    cols.iter().map(|c| Some(c.to_string())).collect()
}

fn syntax(message: &str) -> SessionError {
    SessionError::with_code("42601", format!("syntax error: {}", message))
}

fn apply_plain(held: &mut BTreeSet<Privilege>, privileges: &[Privilege], grant: bool) {
    for p in privileges {
        if grant {
            held.insert(*p);
        } else {
            held.remove(p);
        }
    }
}

/// `None` is ALL PRIVILEGES
fn expand(
    privileges: Option<Vec<Privilege>>,
    all: &[Privilege],
    allowed: impl Fn(Privilege) -> bool,
) -> Result<Vec<Privilege>, SessionError> {
    match privileges {
        None => Ok(all.to_vec()),
        Some(list) => {
            if let Some(bad) = list.iter().find(|p| !allowed(**p)) {
                return Err(SessionError::with_code(
                    "0LP01",
                    format!("invalid privilege type {} for this object", bad),
                ));
            }
            Ok(list)
        }
    }
}

// ----------------------------------------------------------------------
// A parser for the statements the executor emits

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Ident(String),
    Comma,
    Dot,
}

fn tokenize(sql: &str) -> Result<Vec<Token>, SessionError> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ';' => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut ident = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            ident.push('"');
                        }
                        Some('"') => break,
                        Some(ch) => ident.push(ch),
                        None => return Err(syntax("unterminated quoted identifier")),
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '\'' => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '\'' || ch == '=' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            '=' => {
                chars.next();
            }
            other => return Err(syntax(&format!("unexpected character {:?}", other))),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetSyntax {
    Object,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Database(String),
    Schema(String),
    /// `ON TABLE` or `ON SEQUENCE`
    Relation(ObjectKind, String, String),
    Default(DefaultObjectType),
}

#[derive(Debug, Clone)]
struct Change {
    grant: bool,
    /// `None` for ALL PRIVILEGES
    privileges: Option<Vec<Privilege>>,
    target: Target,
    grantee: String,
    with_grant_option: bool,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_word(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(word) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), SessionError> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(syntax(&format!("expected {}", word)))
        }
    }

    fn ident(&mut self) -> Result<String, SessionError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(Token::Word(name)) => Ok(name.to_ascii_lowercase()),
            _ => Err(syntax("expected identifier")),
        }
    }

    fn change(&mut self, syntax_kind: TargetSyntax) -> Result<Change, SessionError> {
        let grant = if self.eat_word("GRANT") {
            true
        } else if self.eat_word("REVOKE") {
            false
        } else {
            return Err(syntax("expected GRANT or REVOKE"));
        };

        let privileges = if self.eat_word("ALL") {
            self.eat_word("PRIVILEGES");
            None
        } else {
            let mut list = Vec::new();
            loop {
                match self.next() {
                    Some(Token::Word(w)) => {
                        let p = Privilege::from_keyword(&w).ok_or_else(|| {
                            SessionError::with_code(
                                "42601",
                                format!("unrecognized privilege type \"{}\"", w.to_lowercase()),
                            )
                        })?;
                        list.push(p);
                    }
                    _ => return Err(syntax("expected privilege")),
                }
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            Some(list)
        };

        self.expect_word("ON")?;
        let target = match syntax_kind {
            TargetSyntax::Default => {
                let word = match self.next() {
                    Some(Token::Word(w)) => w,
                    _ => return Err(syntax("expected object type")),
                };
                let object_type = DefaultObjectType::from_contract(&word)
                    .ok_or_else(|| syntax("unknown object type"))?;
                Target::Default(object_type)
            }
            TargetSyntax::Object => {
                if self.eat_word("DATABASE") {
                    Target::Database(self.ident()?)
                } else if self.eat_word("SCHEMA") {
                    Target::Schema(self.ident()?)
                } else {
                    let kind = if self.eat_word("TABLE") {
                        ObjectKind::Table
                    } else if self.eat_word("SEQUENCE") {
                        ObjectKind::Sequence
                    } else {
                        return Err(syntax("expected DATABASE, SCHEMA, TABLE or SEQUENCE"));
                    };
                    let schema = self.ident()?;
                    if self.next() != Some(Token::Dot) {
                        return Err(syntax("expected qualified relation name"));
                    }
                    let name = self.ident()?;
                    Target::Relation(kind, schema, name)
                }
            }
        };

        if grant {
            self.expect_word("TO")?;
        } else {
            self.expect_word("FROM")?;
        }
        let grantee = match self.next() {
            Some(Token::Ident(name)) => name,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("PUBLIC") => "PUBLIC".to_string(),
            Some(Token::Word(w)) => w.to_ascii_lowercase(),
            _ => return Err(syntax("expected grantee")),
        };

        let mut with_grant_option = false;
        if self.eat_word("WITH") {
            self.expect_word("GRANT")?;
            self.expect_word("OPTION")?;
            with_grant_option = true;
        }
        if self.peek().is_some() {
            return Err(syntax("trailing input"));
        }

        Ok(Change {
            grant,
            privileges,
            target,
            grantee,
            with_grant_option,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new("classroom")
            .with_roles(&["grp_geo", "usr_prof"])
            .with_table("public", "rivers")
            .with_sequence("public", "rivers_id_seq")
            .with_view("public", "rivers_v", &[("public", "rivers")])
    }

    #[test]
    fn test_schema_grant_and_revoke() {
        let mut c = catalog();
        c.execute(r#"GRANT USAGE, CREATE ON SCHEMA "public" TO "grp_geo""#)
            .unwrap();
        assert_eq!(c.schema_grants("grp_geo", "public").len(), 2);
        c.execute(r#"REVOKE CREATE ON SCHEMA "public" FROM "grp_geo""#)
            .unwrap();
        assert_eq!(
            c.schema_grants("grp_geo", "public"),
            [Privilege::Usage].into_iter().collect()
        );
    }

    #[test]
    fn test_grant_option_and_plain_revoke() {
        let mut c = catalog();
        c.execute(r#"GRANT SELECT ON TABLE "public"."rivers" TO "grp_geo" WITH GRANT OPTION"#)
            .unwrap();
        assert!(c
            .object_grants("grp_geo", "public", "rivers")
            .contains(&PrivilegeToken::grantable(Privilege::Select)));

        c.execute(r#"GRANT SELECT ON TABLE "public"."rivers" TO "grp_geo""#)
            .unwrap();
        assert!(c
            .object_grants("grp_geo", "public", "rivers")
            .contains(&PrivilegeToken::grantable(Privilege::Select)));

        c.execute(r#"REVOKE SELECT ON TABLE "public"."rivers" FROM "grp_geo""#)
            .unwrap();
        assert!(c.object_grants("grp_geo", "public", "rivers").is_empty());
    }

    #[test]
    fn test_all_privileges_expands_by_kind() {
        let mut c = catalog();
        c.execute(r#"GRANT ALL PRIVILEGES ON SEQUENCE "public"."rivers_id_seq" TO "grp_geo""#)
            .unwrap();
        assert_eq!(c.object_grants("grp_geo", "public", "rivers_id_seq").len(), 3);
    }

    #[test]
    fn test_unknown_relation_and_role_errors() {
        let mut c = catalog();
        let err = c
            .execute(r#"GRANT SELECT ON TABLE "public"."nope" TO "grp_geo""#)
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("42P01"));

        let err = c
            .execute(r#"GRANT USAGE ON SCHEMA "public" TO "ghost""#)
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("42704"));

        let err = c
            .execute(r#"GRANT USAGE ON SCHEMA "nope" TO "grp_geo""#)
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("3F000"));
    }

    #[test]
    fn test_default_privileges_are_per_owner() {
        let mut c = catalog();
        c.execute(
            r#"ALTER DEFAULT PRIVILEGES FOR ROLE "usr_prof" IN SCHEMA "public" GRANT SELECT ON TABLES TO "grp_geo""#,
        )
        .unwrap();
        assert_eq!(
            c.default_grants("usr_prof", "public", DefaultObjectType::Tables, "grp_geo"),
            [Privilege::Select].into_iter().collect()
        );
        assert!(c
            .default_grants("postgres", "public", DefaultObjectType::Tables, "grp_geo")
            .is_empty());

        let rows = c
            .query(queries::DEFAULT_PRIVILEGES, &["r", "usr_prof", "public"])
            .unwrap();
        assert_eq!(rows.len(), 1);
        let rows = c.query(queries::DEFAULT_PRIVILEGES, &["r", "postgres", ""]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_transaction_rollback_restores_state() {
        let mut c = catalog();
        c.begin().unwrap();
        c.execute(r#"GRANT USAGE ON SCHEMA "public" TO "grp_geo""#)
            .unwrap();
        assert!(c.in_transaction());
        c.rollback().unwrap();
        assert!(c.schema_grants("grp_geo", "public").is_empty());
        assert_eq!(c.rollbacks(), 1);

        c.begin().unwrap();
        c.execute(r#"GRANT USAGE ON SCHEMA "public" TO "grp_geo""#)
            .unwrap();
        c.commit().unwrap();
        assert_eq!(c.schema_grants("grp_geo", "public").len(), 1);
        assert_eq!(c.commits(), 1);
    }

    #[test]
    fn test_lock_failure_injection() {
        let mut c = catalog().fail_with_lock(1);
        c.execute("SET LOCAL lock_timeout = '100ms'").unwrap();
        let err = c
            .execute(r#"GRANT USAGE ON SCHEMA "public" TO "grp_geo""#)
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some(LOCK_NOT_AVAILABLE));
        c.execute(r#"GRANT USAGE ON SCHEMA "public" TO "grp_geo""#)
            .unwrap();
    }

    #[test]
    fn test_catalog_queries() {
        let mut c = catalog().with_object_grant(
            "grp_geo",
            "public",
            "rivers",
            &[PrivilegeToken::grantable(Privilege::Select)],
        );
        let rows = c.query(queries::OBJECTS, &["public", "r,p,v,m,S"]).unwrap();
        assert_eq!(rows.len(), 3);
        let rows = c.query(queries::OBJECTS, &["public", "S"]).unwrap();
        assert_eq!(rows, vec![row(&["rivers_id_seq", "S"])]);

        let rows = c.query(queries::OBJECT_ACLS, &["public", "rivers"]).unwrap();
        assert_eq!(rows, vec![row(&["grp_geo", "SELECT", "true"])]);

        let rows = c.query(queries::DEPENDENCIES, &["public", "rivers"]).unwrap();
        assert_eq!(rows, vec![row(&["public", "rivers_v"])]);

        assert!(c.query("SELECT 1", &[]).is_err());
    }
}
