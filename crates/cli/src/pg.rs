//! `PgSession` over a single sqlx connection.
//!
//! The engine is synchronous; this adapter owns a current-thread tokio
//! runtime and blocks on each sqlx future. Queries use the extended
//! protocol with text parameters. Statements go through `raw_sql` (simple
//! protocol), which is what `BEGIN`/`SET LOCAL`/DDL want.

use anyhow::Context;
use sqlx::{Connection, PgConnection, Row as _};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use grantsync_executor::{PgSession, Row, SessionError};

/// One exclusive PostgreSQL connection
pub struct SqlxSession {
    runtime: Runtime,
    conn: PgConnection,
}

impl SqlxSession {
    /// Connect to `url`
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let conn = runtime
            .block_on(PgConnection::connect(url))
            .context("failed to connect to PostgreSQL")?;
        debug!(target: "grantsync::cli", "Connected");
        Ok(SqlxSession { runtime, conn })
    }

    /// Close the connection cleanly
    pub fn close(self) -> anyhow::Result<()> {
        let SqlxSession { runtime, conn } = self;
        runtime
            .block_on(conn.close())
            .context("failed to close connection")
    }
}

impl PgSession for SqlxSession {
    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, SessionError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = self
            .runtime
            .block_on(query.fetch_all(&mut self.conn))
            .map_err(session_error)?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.try_get::<Option<String>, _>(i))
                    .collect::<Result<Row, _>>()
                    .map_err(session_error)
            })
            .collect()
    }

    fn execute(&mut self, sql: &str) -> Result<(), SessionError> {
        self.runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut self.conn))
            .map(|_| ())
            .map_err(session_error)
    }
}

fn session_error(e: sqlx::Error) -> SessionError {
    match &e {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => SessionError::with_code(code.into_owned(), db.message()),
            None => SessionError::other(db.message()),
        },
        _ => SessionError::other(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantsync_executor::{
        Action, ContractValidator, Executor, PermissionContract, Reconciler, RetryConfig,
    };

    /// Live test; runs only when `GRANTSYNC_TEST_DATABASE_URL` is set.
    #[test]
    fn test_live_round_trip() {
        let url = match std::env::var("GRANTSYNC_TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => return,
        };
        let mut session = SqlxSession::connect(&url).unwrap();
        for sql in [
            "DROP SCHEMA IF EXISTS grantsync_live CASCADE",
            "DROP ROLE IF EXISTS grp_grantsync_live",
            "CREATE ROLE grp_grantsync_live NOLOGIN",
            "CREATE SCHEMA grantsync_live",
            "CREATE TABLE grantsync_live.t (id int)",
        ] {
            session.execute(sql).unwrap();
        }

        let contract = ContractValidator::new()
            .validate(
                &PermissionContract::new(["^grp_grantsync_live$"])
                    .grant_schema("grp_grantsync_live", "grantsync_live", &["USAGE"])
                    .grant_object("grp_grantsync_live", "grantsync_live", "t", &["SELECT*"]),
            )
            .unwrap();

        let ops = Reconciler::new(&mut session).diff(&contract).unwrap();
        assert!(ops.iter().all(|op| op.action == Action::Grant));
        Executor::new(&mut session, RetryConfig::new()).apply(&ops).unwrap();
        assert!(Reconciler::new(&mut session).diff(&contract).unwrap().is_empty());

        for sql in [
            "DROP SCHEMA grantsync_live CASCADE",
            "DROP ROLE grp_grantsync_live",
        ] {
            session.execute(sql).unwrap();
        }
        session.close().unwrap();
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let err = SqlxSession::connect("not a url").err().unwrap();
        assert!(format!("{:#}", err).contains("failed to connect"));
    }
}
