//! The database session seam
//!
//! The engine never opens connections. Callers hand it a [`PgSession`]: an
//! exclusive, synchronous handle onto one PostgreSQL connection. Catalog
//! reads go through [`PgSession::query`]; DDL goes through
//! [`PgSession::execute`].
//!
//! Every column comes back as text (`NULL` as `None`). Catalog queries cast
//! their outputs to `text`, which keeps the seam independent of any driver's
//! type mapping.

use std::fmt;

use grantsync_core::Error;

/// One result row, every column as text
pub type Row = Vec<Option<String>>;

/// A failure reported by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    /// SQLSTATE, when the server reported one
    pub code: Option<String>,
    /// Server or driver message
    pub message: String,
}

impl SessionError {
    /// Error with a SQLSTATE
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        SessionError {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Error without a SQLSTATE (driver or I/O failure)
    pub fn other(message: impl Into<String>) -> Self {
        SessionError {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Error::Database {
            code: e.code,
            message: e.message,
        }
    }
}

/// An exclusive handle onto one PostgreSQL connection
///
/// Implementations must not be shared between concurrent reconciliation
/// runs; `&mut self` on every method enforces that at compile time.
pub trait PgSession {
    /// Run a read query with text parameters (`$1`, `$2`, ...)
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError>;

    /// Run a statement that returns no rows
    fn execute(&mut self, sql: &str) -> Result<(), SessionError>;

    /// Open a transaction
    fn begin(&mut self) -> Result<(), SessionError> {
        self.execute("BEGIN")
    }

    /// Commit the open transaction
    fn commit(&mut self) -> Result<(), SessionError> {
        self.execute("COMMIT")
    }

    /// Roll back the open transaction
    fn rollback(&mut self) -> Result<(), SessionError> {
        self.execute("ROLLBACK")
    }
}

impl<S: PgSession + ?Sized> PgSession for &mut S {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError> {
        (**self).query(sql, params)
    }

    fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        (**self).execute(sql)
    }

    fn begin(&mut self) -> Result<(), SessionError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), SessionError> {
        (**self).rollback()
    }
}
