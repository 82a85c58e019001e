//! Live-state inspection
//!
//! - `queries`: the catalog SQL
//! - `reader`: [`CatalogReader`] and its PostgreSQL implementation

pub mod queries;
pub mod reader;

pub use reader::{CatalogReader, DefaultPrivileges, SchemaGrants, StateReader};
