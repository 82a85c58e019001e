//! Core types for grantsync
//!
//! This crate defines the data model shared by the reconciliation engine:
//! - Privilege, PrivilegeToken: upper-cased keywords, with grant option
//! - ObjectKind, DefaultObjectType: what privileges apply to, with whitelists
//! - Identifier: the allow-list guard for DDL interpolation
//! - PermissionContract, ValidatedContract: the desired state
//! - PrincipalMatcher: which roles may be touched
//! - Operation: the unit of change
//! - Error: the error taxonomy
//!
//! Nothing here performs I/O against a database.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod identifier;
pub mod operation;
pub mod privilege;

pub use contract::{
    default_contract, ContractScope, ContractValidator, DefaultGrant, DefaultPrivilegeEntry,
    PermissionContract, PrincipalMatcher, PrincipalMode, ValidatedContract, CONTRACT_VERSION,
};
pub use error::{Error, Result};
pub use identifier::{quote_identifier, Identifier, IdentifierError, MAX_IDENTIFIER_LENGTH};
pub use operation::{Action, Badge, ObjectRef, Operation, Target};
pub use privilege::{
    plain_tokens, DefaultObjectType, ObjectKind, Privilege, PrivilegeSet, PrivilegeToken, TokenSet,
};
