//! Error types for the debrid provider client.

use thiserror::Error;

/// Primary error type for provider API operations.
#[derive(Debug, Error)]
pub enum DebridError {
    /// The client could not be constructed.
    #[error("failed to build provider client")]
    Build {
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The request could not be sent or the response body not read.
    #[error("provider request failed")]
    Http {
        /// Operation label identifying the failed call site.
        operation: &'static str,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The provider answered with a non-success status.
    #[error("provider rejected the request with status {status}")]
    Api {
        /// Operation label identifying the failed call site.
        operation: &'static str,
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error detail decoded from the response body, when present.
        detail: Option<String>,
    },
    /// The response body could not be decoded.
    #[error("failed to decode provider response")]
    Decode {
        /// Operation label identifying the failed call site.
        operation: &'static str,
        /// Underlying decode failure.
        #[source]
        source: reqwest::Error,
    },
}

/// Convenience alias for provider results.
pub type DebridResult<T> = Result<T, DebridError>;
