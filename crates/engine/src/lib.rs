//! Reconciliation engine for grantsync
//!
//! This crate sits between the typed model in `grantsync-core` and a live
//! PostgreSQL session:
//! - PgSession: the connection seam, supplied by the caller
//! - StateReader: catalog queries producing typed privilege snapshots
//! - Reconciler: `diff(contract) -> [Operation]`
//! - GrantsyncConfig: `grantsync.toml`
//! - RetryConfig: retry settings consumed by the executor
//!
//! The engine never opens connections and never holds state between calls.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ExecutorConfig, GrantsyncConfig, LoggingConfig, CONFIG_FILE_NAME};
pub use reconcile::{diff_catalog, Reconciler};
pub use retry::RetryConfig;
pub use session::{PgSession, Row, SessionError};
pub use state::{CatalogReader, DefaultPrivileges, SchemaGrants, StateReader};
