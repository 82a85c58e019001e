//! # grantsync executor
//!
//! Applies reconciliation plans to PostgreSQL. This is the only crate most
//! callers need to import: the contract model and the reconciliation engine
//! are re-exported here.
//!
//! - [`ContractValidator`] - parse and check a permission contract
//! - [`Reconciler`] - diff a contract against the live catalog
//! - [`Executor`] - apply the diff in one transaction, retrying lock timeouts
//!
//! ## Quick Start
//!
//! ```text
//! use grantsync_executor::{ContractValidator, Executor, Reconciler, RetryConfig};
//!
//! let contract = ContractValidator::new().validate_json(&json)?;
//!
//! let mut reconciler = Reconciler::new(session);
//! let ops = reconciler.diff(&contract)?;
//!
//! let mut executor = Executor::new(reconciler.into_inner(), RetryConfig::default());
//! executor.apply(&ops)?;
//! ```
//!
//! ## Statement Shapes
//!
//! | Target | SQL |
//! |--------|-----|
//! | DATABASE | `GRANT CONNECT ON DATABASE "db" TO "grp"` |
//! | SCHEMA | `GRANT USAGE ON SCHEMA "s" TO "grp"` |
//! | TABLE | `GRANT SELECT ON TABLE "s"."t" TO "grp" WITH GRANT OPTION` |
//! | SEQUENCE | `REVOKE USAGE ON SEQUENCE "s"."q" FROM "grp"` |
//! | DEFAULT | `ALTER DEFAULT PRIVILEGES FOR ROLE "o" IN SCHEMA "s" GRANT SELECT ON TABLES TO "grp"` |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod executor;
mod retry;
mod statement;

#[cfg(test)]
mod tests;

pub use executor::{ApplyReport, ApplyState, Executor};
pub use retry::{PgLockRetryPolicy, RetryDecision, RetryPolicy, LOCK_NOT_AVAILABLE};
pub use statement::{compile_all, compile_operation};

pub use grantsync_core::{
    default_contract, quote_identifier, Action, Badge, ContractScope, ContractValidator,
    DefaultGrant, DefaultObjectType, DefaultPrivilegeEntry, Error, ObjectKind, ObjectRef,
    Operation, PermissionContract, PrincipalMatcher, PrincipalMode, Privilege, PrivilegeSet,
    PrivilegeToken, Result, Target, TokenSet, ValidatedContract, CONTRACT_VERSION,
};
pub use grantsync_engine::{
    diff_catalog, CatalogReader, DefaultPrivileges, ExecutorConfig, GrantsyncConfig,
    LoggingConfig, PgSession, Reconciler, RetryConfig, Row, SessionError, StateReader,
    CONFIG_FILE_NAME,
};
