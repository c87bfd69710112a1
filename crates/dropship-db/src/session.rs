//! # Guarded Sessions
//!
//! A [`Session`] is one transaction on one pooled connection, pinned to the
//! writer or the replica pool. Every statement is run through
//! [`check_access`](crate::guard::check_access) before it reaches SQLite.
//!
//! ## Lifecycle
//! ```text
//! Database::session(writer_allowed)
//!      │
//!      ▼
//!   ┌──────┐  execute / fetch_*   ┌──────┐
//!   │ Open │ ───────────────────► │ Open │
//!   └──┬───┘                      └──┬───┘
//!      │ commit()     rollback()     │ drop (error, `?`, cancellation)
//!      ▼                ▼            ▼
//!   committed       rolled back   rolled back
//!      └────────────────┴────────────┘
//!                      │
//!                      ▼
//!        connection returned to its pool (once)
//! ```
//!
//! Nothing is committed implicitly. After `commit` or `rollback` every
//! further call fails with [`DbError::SessionClosed`].

use std::fmt;

use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Execute, Executor, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::guard::{check_access, Role};

/// A scoped, role-bound database session.
pub struct Session {
    role: Role,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl Session {
    pub(crate) fn new(role: Role, tx: Transaction<'static, Sqlite>) -> Self {
        debug!(role = %role, "Session opened");
        Session { role, tx: Some(tx) }
    }

    /// Pool this session is bound to.
    pub fn role(&self) -> Role {
        self.role
    }

    /// `false` once the session has been committed or rolled back.
    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    /// Checks the statement and returns the live transaction.
    fn prepare(&mut self, sql: &str) -> DbResult<&mut Transaction<'static, Sqlite>> {
        if self.tx.is_none() {
            return Err(DbError::SessionClosed);
        }
        check_access(self.role, sql)?;
        self.tx.as_mut().ok_or(DbError::SessionClosed)
    }

    /// Executes a statement and returns the number of rows affected.
    pub async fn execute<'q, E>(&mut self, query: E) -> DbResult<u64>
    where
        E: Execute<'q, Sqlite> + 'q,
    {
        let tx = self.prepare(query.sql())?;
        let result = (&mut **tx).execute(query).await?;
        Ok(result.rows_affected())
    }

    /// Runs a query and returns every row.
    pub async fn fetch_all<'q, E>(&mut self, query: E) -> DbResult<Vec<SqliteRow>>
    where
        E: Execute<'q, Sqlite> + 'q,
    {
        let tx = self.prepare(query.sql())?;
        Ok((&mut **tx).fetch_all(query).await?)
    }

    /// Runs a query that must return exactly one row.
    pub async fn fetch_one<'q, E>(&mut self, query: E) -> DbResult<SqliteRow>
    where
        E: Execute<'q, Sqlite> + 'q,
    {
        let tx = self.prepare(query.sql())?;
        Ok((&mut **tx).fetch_one(query).await?)
    }

    /// Runs a query that returns at most one row.
    pub async fn fetch_optional<'q, E>(&mut self, query: E) -> DbResult<Option<SqliteRow>>
    where
        E: Execute<'q, Sqlite> + 'q,
    {
        let tx = self.prepare(query.sql())?;
        Ok((&mut **tx).fetch_optional(query).await?)
    }

    /// Commits the transaction and releases the connection.
    pub async fn commit(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::SessionClosed)?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!(role = %self.role, "Session committed");
        Ok(())
    }

    /// Rolls the transaction back and releases the connection.
    pub async fn rollback(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::SessionClosed)?;
        tx.rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!(role = %self.role, "Session rolled back");
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // sqlx queues the rollback when the transaction is dropped.
        if self.tx.is_some() {
            debug!(role = %self.role, "Session dropped while open, rolling back");
        }
    }
}
