//! Which session errors are worth another attempt

use grantsync_engine::SessionError;

/// SQLSTATE `lock_not_available`, raised when `lock_timeout` expires
pub const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Outcome of classifying a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Roll back, wait, and run the whole batch again
    Retryable,
    /// Roll back and surface the error
    Fatal,
}

/// Classifies errors raised inside an apply transaction
pub trait RetryPolicy {
    /// Decide whether `error` warrants another attempt
    fn classify(&self, error: &SessionError) -> RetryDecision;
}

/// Retries `lock_not_available` only
#[derive(Debug, Clone, Copy, Default)]
pub struct PgLockRetryPolicy;

impl RetryPolicy for PgLockRetryPolicy {
    fn classify(&self, error: &SessionError) -> RetryDecision {
        match error.code.as_deref() {
            Some(LOCK_NOT_AVAILABLE) => RetryDecision::Retryable,
            _ => RetryDecision::Fatal,
        }
    }
}

impl<F> RetryPolicy for F
where
    F: Fn(&SessionError) -> RetryDecision,
{
    fn classify(&self, error: &SessionError) -> RetryDecision {
        self(error)
    }
}
