//! Managed principal matching
//!
//! A [`PrincipalMatcher`] decides which roles the engine may read and alter.
//! Every other role is invisible: its privileges are never diffed and never
//! revoked.
//!
//! `PUBLIC`, `postgres` and `pg_*` are reserved and never match, whatever
//! the contract says.

use regex::Regex;
use std::fmt;

use super::document::{PrincipalMode, BUILTIN_PRINCIPAL_PATTERNS};
use crate::error::{Error, Result};

#[derive(Clone)]
enum Rule {
    Pattern(Regex),
    Literal(String),
}

/// Compiled `managed_principals`
#[derive(Clone)]
pub struct PrincipalMatcher {
    mode: PrincipalMode,
    rules: Vec<Rule>,
    builtin: Vec<Regex>,
}

impl PrincipalMatcher {
    /// Compile `entries` under `mode`
    ///
    /// In regex mode each entry is matched from the start of the role name,
    /// so `grp_` manages `grp_geo` but not `old_grp_geo`.
    pub fn new(mode: PrincipalMode, entries: &[String]) -> Result<Self> {
        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_empty() {
                return Err(Error::schema("managed_principals entries must not be empty"));
            }
            let rule = match mode {
                PrincipalMode::Regex => Rule::Pattern(compile_prefix(entry)?),
                PrincipalMode::Literal | PrincipalMode::Conservative => {
                    Rule::Literal(entry.clone())
                }
            };
            rules.push(rule);
        }

        let builtin = BUILTIN_PRINCIPAL_PATTERNS
            .iter()
            .map(|p| compile_prefix(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(PrincipalMatcher {
            mode,
            rules,
            builtin,
        })
    }

    /// Matcher over the built-in patterns
    pub fn builtin() -> Result<Self> {
        let entries: Vec<String> = BUILTIN_PRINCIPAL_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        Self::new(PrincipalMode::Regex, &entries)
    }

    /// The mode this matcher was compiled with
    pub fn mode(&self) -> PrincipalMode {
        self.mode
    }

    /// Whether `role` is managed
    pub fn is_managed(&self, role: &str) -> bool {
        if is_reserved(role) {
            return false;
        }
        let listed = self.rules.iter().any(|rule| match rule {
            Rule::Pattern(re) => re.is_match(role),
            Rule::Literal(name) => name == role,
        });
        match self.mode {
            PrincipalMode::Regex | PrincipalMode::Literal => listed,
            PrincipalMode::Conservative => listed && self.builtin.iter().any(|re| re.is_match(role)),
        }
    }

    /// Keep the managed names, preserving order
    pub fn filter<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|n| self.is_managed(n))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for PrincipalMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<&str> = self
            .rules
            .iter()
            .map(|r| match r {
                Rule::Pattern(re) => re.as_str(),
                Rule::Literal(name) => name.as_str(),
            })
            .collect();
        f.debug_struct("PrincipalMatcher")
            .field("mode", &self.mode)
            .field("rules", &rules)
            .finish()
    }
}

/// Roles no contract may manage
pub fn is_reserved(role: &str) -> bool {
    role.eq_ignore_ascii_case("public") || role == "postgres" || role.starts_with("pg_")
}

fn compile_prefix(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| Error::schema(format!("invalid managed principal pattern '{}': {}", pattern, e)))
}
