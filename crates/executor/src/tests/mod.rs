//! Test modules for the executor crate.
//!
//! Everything here runs against `ReferenceCatalog`, the in-memory catalog
//! from `grantsync-engine`'s `testing` feature.

pub mod atomicity;
pub mod determinism;
pub mod idempotence;
pub mod postconditions;
pub mod scenario;

use std::time::Duration;

use grantsync_engine::testing::ReferenceCatalog;

use crate::{
    ApplyReport, ContractValidator, Executor, Operation, PermissionContract, Reconciler, Result,
    RetryConfig, ValidatedContract,
};

/// Retry settings that keep tests fast
pub(crate) fn fast_retry(max_retries: usize) -> RetryConfig {
    RetryConfig::new()
        .with_max_retries(max_retries)
        .with_retry_interval(Duration::from_millis(1))
}

pub(crate) fn validate(contract: PermissionContract) -> ValidatedContract {
    ContractValidator::new().validate(&contract).unwrap()
}

pub(crate) fn diff(catalog: &mut ReferenceCatalog, contract: &ValidatedContract) -> Vec<Operation> {
    Reconciler::new(catalog).diff(contract).unwrap()
}

pub(crate) fn apply(catalog: &mut ReferenceCatalog, ops: &[Operation]) -> Result<ApplyReport> {
    Executor::new(catalog, fast_retry(3)).apply(ops)
}

/// The catalog most tests start from
pub(crate) fn geo_catalog() -> ReferenceCatalog {
    ReferenceCatalog::new("classroom")
        .with_user("usr_admin")
        .with_roles(&["grp_geo", "grp_bio", "usr_prof", "usr_ta"])
        .with_schema("staging")
        .with_table("public", "rivers")
        .with_table("public", "lakes")
        .with_sequence("public", "rivers_id_seq")
        .with_view("public", "rivers_v", &[("public", "rivers")])
}
