//! Contract validation
//!
//! [`ContractValidator`] turns an authored [`PermissionContract`] into a
//! [`ValidatedContract`]: every privilege string parsed into a typed token
//! and checked against its whitelist, every cross-field rule enforced. The
//! rest of the engine only ever sees validated contracts.
//!
//! Checks, in order:
//!
//! 1. `contract_version` equals [`CONTRACT_VERSION`] exactly (`Schema`)
//! 2. `managed_principals` is non-empty and compiles (`Schema`)
//! 3. every privilege token parses and is allowed where it appears
//!    (`PrivilegeWhitelist`); `*` is only allowed on object privileges
//! 4. every default-privilege `on` names a known object class (`Schema`)
//! 5. every grantee is a managed principal (`ReferentialIntegrity`)
//! 6. every schema lies inside `scope.schema` when one is set
//!    (`ReferentialIntegrity`)
//! 7. object and default grants have schema USAGE for their grantee
//!    (`ReferentialIntegrity`)
//! 8. `for_role` names a live role, when live roles are supplied
//!    (`ReferentialIntegrity`)
//!
//! Validation has no side effects.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::document::{ContractScope, PermissionContract, CONTRACT_VERSION};
use super::principals::PrincipalMatcher;
use crate::error::{Error, Result};
use crate::privilege::{
    DefaultObjectType, ObjectKind, Privilege, PrivilegeSet, PrivilegeToken, TokenSet,
};

/// Desired default ACL for one `(for_role, schema, object type)` partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultGrant {
    /// Creator role; `None` means the session user
    pub for_role: Option<String>,
    /// Schema the future objects live in
    pub in_schema: String,
    /// Object class
    pub object_type: DefaultObjectType,
    /// `grantee -> privileges`
    pub grants: BTreeMap<String, PrivilegeSet>,
}

/// A contract that passed validation, with typed privileges
#[derive(Debug, Clone)]
pub struct ValidatedContract {
    scope: ContractScope,
    matcher: PrincipalMatcher,
    auto_onboard_creators: bool,
    database: BTreeMap<String, PrivilegeSet>,
    schemas: BTreeMap<String, BTreeMap<String, PrivilegeSet>>,
    objects: BTreeMap<String, BTreeMap<String, BTreeMap<String, TokenSet>>>,
    defaults: Vec<DefaultGrant>,
}

impl ValidatedContract {
    /// Database/schema restriction (empty when the contract has none)
    pub fn scope(&self) -> &ContractScope {
        &self.scope
    }

    /// Managed principal matcher
    pub fn matcher(&self) -> &PrincipalMatcher {
        &self.matcher
    }

    /// Whether every live creator's default ACL is reconciled
    pub fn auto_onboard_creators(&self) -> bool {
        self.auto_onboard_creators
    }

    /// `grantee -> privileges` on the scoped database
    pub fn database_privileges(&self) -> &BTreeMap<String, PrivilegeSet> {
        &self.database
    }

    /// `grantee -> schema -> privileges`
    pub fn schema_privileges(&self) -> &BTreeMap<String, BTreeMap<String, PrivilegeSet>> {
        &self.schemas
    }

    /// `grantee -> schema -> object -> tokens`
    pub fn object_privileges(&self) -> &BTreeMap<String, BTreeMap<String, BTreeMap<String, TokenSet>>> {
        &self.objects
    }

    /// Default-privilege partitions, duplicates merged
    pub fn default_privileges(&self) -> &[DefaultGrant] {
        &self.defaults
    }

    /// Whether `schema` is inside `scope.schema`
    pub fn in_scope(&self, schema: &str) -> bool {
        self.scope.schema.as_deref().map_or(true, |s| s == schema)
    }
}

/// Validates permission contracts
#[derive(Debug, Clone, Default)]
pub struct ContractValidator {
    live_roles: Option<BTreeSet<String>>,
}

impl ContractValidator {
    /// Validator without a live role list; `for_role` existence is not checked
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `for_role` entries against these role names
    pub fn with_live_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.live_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Parse and validate a JSON document
    pub fn validate_json(&self, json: &str) -> Result<ValidatedContract> {
        let contract = PermissionContract::from_json(json)?;
        self.validate(&contract)
    }

    /// Validate `contract`
    pub fn validate(&self, contract: &PermissionContract) -> Result<ValidatedContract> {
        if contract.contract_version != CONTRACT_VERSION {
            return Err(Error::schema(format!(
                "contract_version '{}' does not match required '{}'",
                contract.contract_version, CONTRACT_VERSION
            )));
        }
        if contract.managed_principals.is_empty() {
            return Err(Error::schema("managed_principals must list at least one entry"));
        }
        let matcher = PrincipalMatcher::new(
            contract.managed_principals_mode,
            &contract.managed_principals,
        )?;
        let scope = contract.scope.clone().unwrap_or_default();

        let check_grantee = |grantee: &str, section: &str| -> Result<()> {
            if matcher.is_managed(grantee) {
                Ok(())
            } else {
                Err(Error::referential(format!(
                    "{}: grantee '{}' is not a managed principal",
                    section, grantee
                )))
            }
        };
        let check_schema = |schema: &str, section: &str| -> Result<()> {
            match scope.schema.as_deref() {
                Some(allowed) if allowed != schema => Err(Error::referential(format!(
                    "{}: schema '{}' is outside contract scope '{}'",
                    section, schema, allowed
                ))),
                _ => Ok(()),
            }
        };

        let mut database = BTreeMap::new();
        for (grantee, privileges) in &contract.database_privileges {
            check_grantee(grantee, "database_privileges")?;
            let set = parse_privileges(privileges, "database", |p| ObjectKind::Database.allows(p))?;
            database.insert(grantee.clone(), set);
        }

        let mut schemas: BTreeMap<String, BTreeMap<String, PrivilegeSet>> = BTreeMap::new();
        for (grantee, by_schema) in &contract.schema_privileges {
            check_grantee(grantee, "schema_privileges")?;
            for (schema, privileges) in by_schema {
                check_schema(schema, "schema_privileges")?;
                let set = parse_privileges(privileges, "schema", |p| ObjectKind::Schema.allows(p))?;
                schemas
                    .entry(grantee.clone())
                    .or_default()
                    .insert(schema.clone(), set);
            }
        }

        let has_usage = |grantee: &str, schema: &str| {
            schemas
                .get(grantee)
                .and_then(|m| m.get(schema))
                .map_or(false, |set| set.contains(&Privilege::Usage))
        };

        let mut objects: BTreeMap<String, BTreeMap<String, BTreeMap<String, TokenSet>>> =
            BTreeMap::new();
        for (grantee, by_schema) in &contract.object_privileges {
            check_grantee(grantee, "object_privileges")?;
            for (schema, by_object) in by_schema {
                check_schema(schema, "object_privileges")?;
                if !has_usage(grantee, schema) {
                    return Err(Error::referential(format!(
                        "object_privileges: grantee '{}' lacks USAGE on schema '{}'",
                        grantee, schema
                    )));
                }
                for (object, privileges) in by_object {
                    let tokens = parse_object_tokens(privileges)?;
                    objects
                        .entry(grantee.clone())
                        .or_default()
                        .entry(schema.clone())
                        .or_default()
                        .insert(object.clone(), tokens);
                }
            }
        }

        let mut merged: BTreeMap<(Option<String>, String, DefaultObjectType), BTreeMap<String, PrivilegeSet>> =
            BTreeMap::new();
        for entry in &contract.default_privileges {
            let object_type = DefaultObjectType::from_contract(&entry.on).ok_or_else(|| {
                Error::schema(format!(
                    "default_privileges: unknown object type '{}' (expected tables, sequences, functions or types)",
                    entry.on
                ))
            })?;
            check_schema(&entry.in_schema, "default_privileges")?;

            if let (Some(role), Some(live)) = (&entry.for_role, &self.live_roles) {
                if !live.contains(role) {
                    return Err(Error::referential(format!(
                        "default_privileges: for_role '{}' does not exist",
                        role
                    )));
                }
            }

            let partition = merged
                .entry((entry.for_role.clone(), entry.in_schema.clone(), object_type))
                .or_default();
            for (grantee, privileges) in &entry.grants {
                check_grantee(grantee, "default_privileges")?;
                if !has_usage(grantee, &entry.in_schema) {
                    return Err(Error::referential(format!(
                        "default_privileges: grantee '{}' lacks USAGE on schema '{}'",
                        grantee, entry.in_schema
                    )));
                }
                let set = parse_privileges(privileges, object_type.keyword(), |p| {
                    object_type.allows(p)
                })?;
                partition.entry(grantee.clone()).or_default().extend(set);
            }
        }
        let defaults = merged
            .into_iter()
            .map(|((for_role, in_schema, object_type), grants)| DefaultGrant {
                for_role,
                in_schema,
                object_type,
                grants,
            })
            .collect::<Vec<_>>();

        debug!(
            target: "grantsync::contract",
            mode = %contract.managed_principals_mode,
            grantees = schemas.len(),
            default_partitions = defaults.len(),
            "contract validated"
        );

        Ok(ValidatedContract {
            scope,
            matcher,
            auto_onboard_creators: contract.auto_onboard_creators,
            database,
            schemas,
            objects,
            defaults,
        })
    }
}

fn parse_privileges(
    raw: &[String],
    kind: &str,
    allowed: impl Fn(Privilege) -> bool,
) -> Result<PrivilegeSet> {
    raw.iter()
        .map(|word| match Privilege::from_keyword(word) {
            Some(p) if allowed(p) => Ok(p),
            _ => Err(Error::whitelist(word.clone(), kind)),
        })
        .collect()
}

fn parse_object_tokens(raw: &[String]) -> Result<TokenSet> {
    raw.iter()
        .map(|word| match word.parse::<PrivilegeToken>() {
            Ok(token)
                if ObjectKind::Table.allows(token.privilege)
                    || ObjectKind::Sequence.allows(token.privilege) =>
            {
                Ok(token)
            }
            _ => Err(Error::whitelist(word.clone(), "relation")),
        })
        .collect::<Result<TokenSet>>()
        .map(merge_grant_options)
}

/// A starred token subsumes the plain token of the same privilege.
fn merge_grant_options(tokens: TokenSet) -> TokenSet {
    let starred: PrivilegeSet = tokens
        .iter()
        .filter(|t| t.grant_option)
        .map(|t| t.privilege)
        .collect();
    tokens
        .into_iter()
        .filter(|t| t.grant_option || !starred.contains(&t.privilege))
        .collect()
}
