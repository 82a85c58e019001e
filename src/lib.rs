//! grantsync - declarative PostgreSQL privilege reconciliation
//!
//! A permission contract declares which managed roles should hold which
//! privileges on schemas, relations, the database, and objects created in
//! the future. grantsync reads the live catalog, computes the GRANT/REVOKE
//! operations that close the gap, and applies them in one transaction.
//!
//! # Quick Start
//!
//! ```ignore
//! use grantsync::{ContractValidator, Executor, Reconciler, RetryConfig};
//!
//! let contract = ContractValidator::new().validate_json(&std::fs::read_to_string("contract.json")?)?;
//!
//! let mut reconciler = Reconciler::new(session);
//! let ops = reconciler.diff(&contract)?;
//! for op in &ops {
//!     println!("{} {}", op.action, op.describe_target());
//! }
//!
//! let mut executor = Executor::new(reconciler.into_inner(), RetryConfig::default());
//! executor.apply(&ops)?;
//! ```
//!
//! # Architecture
//!
//! - `grantsync-core`: contract model, validation, operations, errors
//! - `grantsync-engine`: the `PgSession` seam, catalog reads, diffing, config
//! - `grantsync-executor`: SQL compilation and transactional apply
//!
//! Connections are supplied by the caller through [`PgSession`].

pub use grantsync_executor::*;
