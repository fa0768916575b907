//! Error types shared by the collaborator facades.

use thiserror::Error;
use uuid::Uuid;

/// Primary error type for facade operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Torrent row does not exist.
    #[error("torrent not found")]
    TorrentNotFound {
        /// Missing torrent identifier.
        torrent_id: Uuid,
    },
    /// Download row does not exist.
    #[error("download not found")]
    DownloadNotFound {
        /// Missing download identifier.
        download_id: Uuid,
    },
    /// Download has no resolvable restricted link.
    #[error("download has no restricted link")]
    MissingRestrictedLink {
        /// Affected download identifier.
        download_id: Uuid,
    },
}

/// Convenience alias for facade results.
pub type CoreResult<T> = Result<T, CoreError>;
