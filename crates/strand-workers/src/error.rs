//! Error types for worker construction and backend calls.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for worker operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Download row carries no resolved link.
    #[error("download link is not resolved")]
    MissingLink,
    /// Backend required by the configured client is not wired.
    #[error("download backend is not configured")]
    BackendUnavailable {
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// An HTTP transfer failed.
    #[error("http {operation} failed: {detail}")]
    Http {
        /// Operation label identifying the failed call site.
        operation: &'static str,
        /// Failure detail from the transport or the server.
        detail: String,
    },
    /// A JSON-RPC call against the aria2c daemon failed.
    #[error("aria2c {method} failed: {detail}")]
    Rpc {
        /// RPC method that failed.
        method: &'static str,
        /// Failure detail from the daemon or the transport.
        detail: String,
    },
    /// A filesystem operation failed.
    #[error("filesystem operation failed for {path}: {source}")]
    Io {
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// An archive could not be read or extracted.
    #[error("archive extraction failed for {path}: {detail}")]
    Archive {
        /// Archive the extraction targeted.
        path: PathBuf,
        /// Failure detail.
        detail: String,
    },
}

impl WorkerError {
    /// Wrap an IO failure with the path it targeted.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for worker results.
pub type WorkerResult<T> = Result<T, WorkerError>;
