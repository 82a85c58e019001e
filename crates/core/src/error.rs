//! Error types for grantsync
//!
//! This module defines the error taxonomy shared by every layer of the
//! reconciliation engine. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.
//!
//! | Category | Variants | Raised by |
//! |----------|----------|-----------|
//! | Contract | `Schema`, `ReferentialIntegrity`, `PrivilegeWhitelist` | validator, reconciler, executor |
//! | Guard | `InvalidIdentifier` | executor (before any SQL runs) |
//! | Database | `Catalog`, `Database`, `RetryableLock`, `ScopeMismatch` | state reader, executor |
//! | Ambient | `Config` | configuration loading |

use thiserror::Error;

/// Result type alias for grantsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The contract failed structural validation (missing or mistyped
    /// fields, wrong `contract_version`, malformed pattern)
    #[error("schema error: {reason}")]
    Schema {
        /// What was wrong with the document
        reason: String,
    },

    /// The contract is well-formed but violates a cross-field rule
    #[error("referential integrity error: {reason}")]
    ReferentialIntegrity {
        /// Which rule was violated and where
        reason: String,
    },

    /// A privilege keyword outside the allowed set for its object kind
    #[error("privilege '{privilege}' is not allowed on {kind}")]
    PrivilegeWhitelist {
        /// The offending token as written
        privilege: String,
        /// The object kind it was applied to
        kind: String,
    },

    /// An identifier that may not be interpolated into DDL
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The rejected identifier
        identifier: String,
        /// Why it was rejected
        reason: String,
    },

    /// A catalog read failed while computing a diff
    #[error("catalog read failed: {reason}")]
    Catalog {
        /// Underlying failure
        reason: String,
    },

    /// Fatal database error; the transaction was rolled back
    #[error("database error{}: {message}", .code.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default())]
    Database {
        /// SQLSTATE reported by the server, when available
        code: Option<String>,
        /// Server message, preserved verbatim
        message: String,
    },

    /// `lock_not_available` persisted through every retry
    #[error("lock not available after {attempts} attempts: {message}")]
    RetryableLock {
        /// Number of attempts made
        attempts: usize,
        /// Last server message
        message: String,
    },

    /// The contract targets a different database than the session
    #[error("contract targets database '{expected}' but session is connected to '{actual}'")]
    ScopeMismatch {
        /// Database named in `scope.database`
        expected: String,
        /// Database reported by the session
        actual: String,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {reason}")]
    Config {
        /// What went wrong
        reason: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Schema`]
    pub fn schema(reason: impl Into<String>) -> Self {
        Error::Schema {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::ReferentialIntegrity`]
    pub fn referential(reason: impl Into<String>) -> Self {
        Error::ReferentialIntegrity {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::PrivilegeWhitelist`]
    pub fn whitelist(privilege: impl Into<String>, kind: impl Into<String>) -> Self {
        Error::PrivilegeWhitelist {
            privilege: privilege.into(),
            kind: kind.into(),
        }
    }

    /// Shorthand for [`Error::Catalog`]
    pub fn catalog(reason: impl Into<String>) -> Self {
        Error::Catalog {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Config`]
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// True for errors raised before the database is touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Schema { .. }
                | Error::ReferentialIntegrity { .. }
                | Error::PrivilegeWhitelist { .. }
                | Error::InvalidIdentifier { .. }
        )
    }

    /// True when the failure was a lock timeout that exhausted its retries
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RetryableLock { .. })
    }
}
