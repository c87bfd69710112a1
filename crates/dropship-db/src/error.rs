//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      Guard check (guard.rs)                │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  DbError (this module) ◄── UnsafeWriterAccess / FieldError /           │
//! │       │                    SanitizeError / MoneyError                  │
//! │       ▼                                                                 │
//! │  API layer (out of scope) ← translates to user-facing responses        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use dropship_core::{MoneyError, ValidationError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::fields::{FieldError, SanitizeError};
use crate::guard::UnsafeWriterAccess;

/// Database operation errors.
///
/// These errors wrap sqlx errors and the programmer-error failures of the
/// monetary layer so that a repository call has a single error type.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Invalid connection URL
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored column could not be decoded into its domain type.
    #[error("Cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },

    /// The session was already committed or rolled back.
    #[error("Session already closed")]
    SessionClosed,

    /// Mutating statement on a replica-bound session outside a writer scope.
    ///
    /// ## When This Occurs
    /// ```text
    /// let mut s = db.session(false).await?;   // replica-bound
    /// s.execute(sqlx::query("UPDATE ...")).await
    ///      │
    ///      ▼
    /// no allow_writer(..) scope active
    ///      │
    ///      ▼
    /// UnsafeWriterAccess (with bounded trace)
    /// ```
    #[error("{0}")]
    UnsafeWriterAccess(Box<UnsafeWriterAccess>),

    /// Composite column mapping failure.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Sanitizer rejected a structured payload.
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    /// Monetary arithmetic failure.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Value does not fit its column.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Decode error for a stored column.
    pub fn decode(column: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Decode {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns the guard violation, if this is one.
    pub fn as_unsafe_writer_access(&self) -> Option<&UnsafeWriterAccess> {
        match self {
            DbError::UnsafeWriterAccess(violation) => Some(violation.as_ref()),
            _ => None,
        }
    }
}

impl From<UnsafeWriterAccess> for DbError {
    fn from(violation: UnsafeWriterAccess) -> Self {
        DbError::UnsafeWriterAccess(Box::new(violation))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::ColumnDecode   → DbError::Decode
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::ColumnDecode { index, source } => DbError::Decode {
                column: index,
                reason: source.to_string(),
            },

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_money_error_is_transparent() {
        let err: DbError = MoneyError::DivisionByZero.into();
        assert_eq!(err.to_string(), "Division by zero");
    }
}
