//! Permission contract
//!
//! The contract is the declarative desired state: which roles the engine
//! manages and which privileges they should hold.
//!
//! ## Module Structure
//!
//! - `document`: the serde model of the JSON document
//! - `principals`: managed principal matching
//! - `validator`: structural and referential validation
//!
//! ## Usage
//!
//! ```
//! use grantsync_core::contract::{ContractValidator, PermissionContract};
//!
//! let contract = PermissionContract::new(["^grp_"])
//!     .grant_schema("grp_geo", "public", &["USAGE"]);
//! let validated = ContractValidator::new().validate(&contract).unwrap();
//! assert!(validated.matcher().is_managed("grp_geo"));
//! ```

pub mod document;
pub mod principals;
pub mod validator;

pub use document::{
    ContractScope, DefaultPrivilegeEntry, PermissionContract, PrincipalMode,
    BUILTIN_PRINCIPAL_PATTERNS, CONTRACT_VERSION,
};
pub use principals::{is_reserved, PrincipalMatcher};
pub use validator::{ContractValidator, DefaultGrant, ValidatedContract};

use once_cell::sync::Lazy;

use crate::error::Result;

static DEFAULT_CONTRACT: Lazy<Result<ValidatedContract>> =
    Lazy::new(|| ContractValidator::new().validate(&PermissionContract::builtin_default()));

/// The built-in contract, validated on first use
///
/// Returns the validation error if the built-in contract is malformed, so
/// callers can refuse to start.
pub fn default_contract() -> Result<&'static ValidatedContract> {
    DEFAULT_CONTRACT.as_ref().map_err(Clone::clone)
}
