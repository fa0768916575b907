//! Application-level error type for the bootstrap sequence.

use thiserror::Error;

/// Failures that abort application startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing.
    #[error("required environment variable {name} is not set")]
    MissingEnv {
        /// Name of the missing variable.
        name: &'static str,
    },
    /// Configuration loading or validation failed.
    #[error("configuration error")]
    Config {
        /// Underlying configuration failure.
        #[from]
        source: strand_config::ConfigError,
    },
    /// The database could not be reached.
    #[error("database connection failed")]
    Database {
        /// Underlying connection failure.
        #[from]
        source: sqlx::Error,
    },
    /// The persistence layer failed to initialise.
    #[error("persistence error")]
    Data {
        /// Underlying store failure.
        #[from]
        source: strand_data::DataError,
    },
    /// The provider client could not be constructed.
    #[error("provider client error")]
    Debrid {
        /// Underlying client failure.
        #[from]
        source: strand_debrid::DebridError,
    },
    /// The worker backend could not be constructed.
    #[error("worker backend error")]
    Worker {
        /// Underlying backend failure.
        #[from]
        source: strand_workers::WorkerError,
    },
    /// Any other startup failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias for bootstrap results.
pub type AppResult<T> = Result<T, AppError>;
