//! Error types for the persistence layer.

use thiserror::Error;

/// Primary error type for store operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database migrations failed to apply.
    #[error("failed to run database migrations")]
    Migration {
        /// Underlying migration failure.
        #[source]
        source: sqlx::migrate::MigrateError,
    },
    /// A database operation failed.
    #[error("database operation failed")]
    Database {
        /// Operation label identifying the failed call site.
        operation: &'static str,
        /// Underlying database failure.
        #[source]
        source: sqlx::Error,
    },
}

impl DataError {
    /// Wrap a database failure with its call-site label.
    #[must_use]
    pub const fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }
}

/// Convenience alias for store results.
pub type DataResult<T> = Result<T, DataError>;
