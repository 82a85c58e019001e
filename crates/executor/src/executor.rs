//! The Executor: applies an operation list in one transaction
//!
//! Every statement is compiled before the transaction opens, so a batch
//! containing a bad identifier or a non-whitelisted privilege never touches
//! the database. Each attempt runs
//!
//! ```text
//! BEGIN
//! SET LOCAL lock_timeout = '<n>ms'   -- when configured
//! <statements...>
//! COMMIT
//! ```
//!
//! and any failure rolls the attempt back in full. Errors the
//! [`RetryPolicy`] marks retryable rerun the whole batch after
//! `retry_interval`, up to `max_retries` times.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use grantsync_core::{Error, Operation, Result};
use grantsync_engine::{ExecutorConfig, PgSession, RetryConfig, SessionError};

use crate::retry::{PgLockRetryPolicy, RetryDecision, RetryPolicy};
use crate::statement;

/// Where the most recent apply ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyState {
    /// Nothing applied yet, or an apply is in flight
    Pending,
    /// The batch committed
    Committed,
    /// The batch was rolled back and nothing changed
    RolledBack,
}

/// Summary of a committed apply
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Identifier for this apply, used in log lines
    pub run_id: Uuid,
    /// Final state (always `Committed` for a returned report)
    pub state: ApplyState,
    /// Statements executed, in order, excluding transaction control
    pub statements: Vec<String>,
    /// Attempts made; 0 when there was nothing to apply
    pub attempts: usize,
    /// When the apply started
    pub started_at: DateTime<Utc>,
    /// When the batch committed
    pub finished_at: DateTime<Utc>,
}

/// Transactional GRANT/REVOKE executor
///
/// # Example
///
/// ```ignore
/// use grantsync_executor::{Executor, Reconciler, RetryConfig};
///
/// let mut reconciler = Reconciler::new(session);
/// let ops = reconciler.diff(&contract)?;
///
/// let mut executor = Executor::new(reconciler.into_inner(), RetryConfig::default());
/// let report = executor.apply(&ops)?;
/// println!("{} statements in {} attempt(s)", report.statements.len(), report.attempts);
/// ```
pub struct Executor<S: PgSession, P: RetryPolicy = PgLockRetryPolicy> {
    session: S,
    retry: RetryConfig,
    policy: P,
    lock_timeout: Option<Duration>,
    state: ApplyState,
}

impl<S: PgSession> Executor<S> {
    /// Create an executor that retries on `lock_not_available`
    pub fn new(session: S, retry: RetryConfig) -> Self {
        Executor {
            session,
            retry,
            policy: PgLockRetryPolicy,
            lock_timeout: None,
            state: ApplyState::Pending,
        }
    }

    /// Create an executor from the `[executor]` config section
    pub fn from_config(session: S, config: &ExecutorConfig) -> Self {
        let executor = Self::new(session, config.retry_config());
        match config.lock_timeout() {
            Some(timeout) => executor.with_lock_timeout(timeout),
            None => executor,
        }
    }
}

impl<S: PgSession, P: RetryPolicy> Executor<S, P> {
    /// Replace the retry policy
    pub fn with_policy<Q: RetryPolicy>(self, policy: Q) -> Executor<S, Q> {
        Executor {
            session: self.session,
            retry: self.retry,
            policy,
            lock_timeout: self.lock_timeout,
            state: self.state,
        }
    }

    /// Issue `SET LOCAL lock_timeout` at the start of every attempt
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Retry settings in effect
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Outcome of the most recent [`apply`](Self::apply)
    pub fn state(&self) -> ApplyState {
        self.state
    }

    /// Give the session back
    pub fn into_inner(self) -> S {
        self.session
    }

    /// Compile `ops` without executing anything
    pub fn plan_statements(ops: &[Operation]) -> Result<Vec<String>> {
        statement::compile_all(ops)
    }

    /// Apply `ops` atomically
    ///
    /// Returns `Error::RetryableLock` when every attempt failed with a
    /// retryable error, and `Error::Database` for anything else the server
    /// rejected. Either way the database is left as it was.
    pub fn apply(&mut self, ops: &[Operation]) -> Result<ApplyReport> {
        let statements = Self::plan_statements(ops)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.state = ApplyState::Pending;

        if statements.is_empty() {
            debug!(target: "grantsync::executor", %run_id, "Nothing to apply");
            self.state = ApplyState::Committed;
            return Ok(ApplyReport {
                run_id,
                state: self.state,
                statements,
                attempts: 0,
                started_at,
                finished_at: Utc::now(),
            });
        }

        info!(
            target: "grantsync::executor",
            %run_id,
            operations = ops.len(),
            statements = statements.len(),
            "Applying batch"
        );

        let max_retries = self.retry.max_retries;
        for attempt in 0..=max_retries {
            match self.run_attempt(run_id, &statements) {
                Ok(()) => {
                    self.state = ApplyState::Committed;
                    info!(
                        target: "grantsync::executor",
                        %run_id,
                        attempts = attempt + 1,
                        "Batch committed"
                    );
                    return Ok(ApplyReport {
                        run_id,
                        state: self.state,
                        statements,
                        attempts: attempt + 1,
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
                Err(e) => {
                    self.state = ApplyState::RolledBack;
                    match self.policy.classify(&e) {
                        RetryDecision::Retryable if attempt < max_retries => {
                            warn!(
                                target: "grantsync::executor",
                                %run_id,
                                attempt = attempt + 1,
                                error = %e,
                                "Retryable failure, retrying in {:?}",
                                self.retry.retry_interval
                            );
                            thread::sleep(self.retry.retry_interval);
                        }
                        RetryDecision::Retryable => {
                            return Err(Error::RetryableLock {
                                attempts: attempt + 1,
                                message: e.message,
                            });
                        }
                        RetryDecision::Fatal => return Err(e.into()),
                    }
                }
            }
        }

        // The final attempt always returns from inside the loop
        Err(Error::RetryableLock {
            attempts: self.retry.max_attempts(),
            message: "retries exhausted".to_string(),
        })
    }

    fn run_attempt(&mut self, run_id: Uuid, statements: &[String]) -> std::result::Result<(), SessionError> {
        self.session.begin()?;
        match self.execute_batch(statements) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(target: "grantsync::executor", %run_id, error = %e, "Rolling back");
                if let Err(rollback) = self.session.rollback() {
                    warn!(
                        target: "grantsync::executor",
                        %run_id,
                        error = %rollback,
                        "Rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    fn execute_batch(&mut self, statements: &[String]) -> std::result::Result<(), SessionError> {
        if let Some(timeout) = self.lock_timeout {
            self.session
                .execute(&format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis()))?;
        }
        for sql in statements {
            debug!(target: "grantsync::executor", sql = %sql, "Executing");
            self.session.execute(sql)?;
        }
        self.session.commit()
    }
}
