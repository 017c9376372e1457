//! # Ledger Storage Errors
//!
//! `DbError` is the single error type returned by the [`Ledger`](crate::Ledger).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error ──────────┐                ┌────────── CoreError           │
//! │  MigrateError ─────────┤                │  (stock, settlement, rules)   │
//! │  ConfigError ──────────┼──► DbError ◄───┘                               │
//! │                        │       │                                        │
//! │                        │       ├── Busy, StaleWrite ──► tx::with_retry  │
//! │                        │       │       (re-runs the whole transaction)  │
//! │                        │       └── everything else ──► caller           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use depot_core::{CoreError, ValidationError};
use thiserror::Error;

/// Primary SQLite result codes that mean "another writer holds the lock".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum DbError {
    /// No row for the id, or the row was deleted by an earlier operation.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write. `field` is `table.column`.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row references a category, supplier, customer or parent that is gone.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// SQLITE_BUSY or SQLITE_LOCKED. Retryable.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// A versioned product write matched no row: a concurrent transaction
    /// committed a newer version first. Retryable.
    #[error("{entity} {id} was modified concurrently")]
    StaleWrite { entity: String, id: String },

    /// Every attempt of `operation` lost a race.
    ///
    /// ```text
    /// attempt 1 ──► Busy ──► sleep(backoff)
    /// attempt 2 ──► StaleWrite ──► sleep(2 × backoff)
    /// ...
    /// attempt N ──► ConcurrencyConflict { operation, attempts: N }
    /// ```
    #[error("{operation} did not complete after {attempts} attempts")]
    ConcurrencyConflict { operation: String, attempts: u32 },

    /// No connection became free within `connect_timeout`.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Configuration error: {0}")]
    Config(String),

    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn stale(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::StaleWrite {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether re-running the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::StaleWrite { .. })
    }

    /// The ledger rule behind this error, if any.
    pub fn as_ledger(&self) -> Option<&CoreError> {
        match self {
            DbError::Ledger(err) => Some(err),
            _ => None,
        }
    }

    /// Classifies a driver-level failure by result code, then by message.
    fn from_database(code: Option<&str>, message: &str) -> Self {
        // extended codes carry the primary code in the low byte (517 → 5)
        let primary = code.and_then(|c| c.parse::<i32>().ok()).map(|c| c & 0xff);
        if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED)) {
            return DbError::Busy(message.to_string());
        }

        if let Some(column) = message.strip_prefix("UNIQUE constraint failed: ") {
            DbError::UniqueViolation {
                field: column.to_string(),
                value: "unknown".to_string(),
            }
        } else if message.starts_with("FOREIGN KEY constraint failed") {
            DbError::ForeignKeyViolation {
                message: message.to_string(),
            }
        } else {
            DbError::QueryFailed(message.to_string())
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Ledger(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                DbError::from_database(code.as_deref(), db_err.message())
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<config::ConfigError> for DbError {
    fn from(err: config::ConfigError) -> Self {
        DbError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_variants() {
        assert!(DbError::Busy("database is locked".to_string()).is_retryable());
        assert!(DbError::stale("Product", "p1").is_retryable());
        assert!(!DbError::not_found("Order", "o1").is_retryable());
        assert!(!DbError::Ledger(CoreError::InvalidQuantity(0)).is_retryable());
    }

    #[test]
    fn test_busy_snapshot_code_is_busy() {
        let err = DbError::from_database(Some("517"), "database is locked");
        assert!(matches!(err, DbError::Busy(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_constraint_messages() {
        let err = DbError::from_database(Some("2067"), "UNIQUE constraint failed: categories.name");
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "categories.name"));

        let err = DbError::from_database(Some("787"), "FOREIGN KEY constraint failed");
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_ledger_errors_pass_through() {
        let err: DbError = CoreError::InvalidPackage(-1).into();
        assert_eq!(err.to_string(), "Package must be greater than zero, got -1");
        assert!(matches!(err.as_ledger(), Some(CoreError::InvalidPackage(-1))));
    }

    #[test]
    fn test_validation_errors_become_ledger_errors() {
        let err: DbError = ValidationError::Required {
            field: "items".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            DbError::Ledger(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }
}
