//! Storage error types shared by every repository implementation.

use std::time::Duration;
use thiserror::Error;

/// Repository errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Operation exceeded its deadline
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated")]
    UniqueViolation,

    /// A foreign key still references the row being removed
    #[error("Row is still referenced by another table")]
    ForeignKeyViolation,

    /// A row the operation depends on was not present
    #[error("Record not found")]
    NotFound,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation;
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation;
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for repository operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_plain_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_timeout_display() {
        let err = StoreError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }
}
