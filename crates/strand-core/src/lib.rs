#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Domain model and collaborator facades shared across the Strand workspace.
//!
//! The runner crate drives torrents exclusively through the traits defined
//! here; the concrete debrid gateway, store, and worker implementations live
//! in their own crates and are swapped for recording stubs in tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod error;
/// Domain model types.
pub mod model;

pub use error::{CoreError, CoreResult};
pub use model::{
    Download, DownloadClientKind, FinishedAction, HostDownloadAction, RemoteStatus, Torrent,
    TorrentTotals,
};

/// Status of one backend-managed transfer, as returned by a bulk query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteTaskStatus {
    /// Backend-assigned identifier of the transfer.
    pub remote_id: String,
    /// Raw backend status string (e.g. `active`, `complete`, `error`).
    pub status: String,
    /// Bytes transferred so far.
    pub bytes_done: u64,
    /// Expected total bytes.
    pub bytes_total: u64,
    /// Failure detail reported by the backend, if any.
    pub error: Option<String>,
}

/// Facade over the debrid provider and the torrent rows it maintains.
///
/// The gateway owns torrent row creation/destruction and the retry counter;
/// the runner only reads rows and requests status transitions.
#[async_trait]
pub trait TorrentGateway: Send + Sync {
    /// Fetch every torrent row together with its child downloads.
    async fn list(&self) -> anyhow::Result<Vec<Torrent>>;

    /// Resolve the restricted link of a download into a direct URL.
    async fn unrestrict_link(&self, download_id: Uuid) -> anyhow::Result<String>;

    /// Re-submit a torrent to the provider, consuming one retry.
    ///
    /// The gateway increments the stored retry counter as part of the
    /// re-submission; callers must not bump it themselves.
    async fn retry_torrent(&self, torrent_id: Uuid, retry_count: i32) -> anyhow::Result<()>;

    /// Overwrite the retry marker and counter on a torrent row.
    async fn update_retry(
        &self,
        torrent_id: Uuid,
        retry: Option<DateTime<Utc>>,
        retry_count: i32,
    ) -> anyhow::Result<()>;

    /// Confirm file selection against the provider.
    async fn select_files(&self, torrent_id: Uuid) -> anyhow::Result<()>;

    /// Record when file selection was confirmed.
    async fn update_files_selected(
        &self,
        torrent_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Expand the provider's selected files into download rows. Called once
    /// per torrent, after `files_selected` is set and the provider reports
    /// the torrent finished.
    async fn create_downloads(&self, torrent_id: Uuid) -> anyhow::Result<()>;

    /// Record an error on the torrent without completing it.
    async fn update_error(&self, torrent_id: Uuid, message: &str) -> anyhow::Result<()>;

    /// Mark the torrent completed, optionally with a terminal error.
    ///
    /// When `terminal` is false and an error is present, the gateway may arm
    /// the retry marker if the torrent's retry budget still has room.
    async fn update_complete(
        &self,
        torrent_id: Uuid,
        error: Option<String>,
        at: DateTime<Utc>,
        terminal: bool,
    ) -> anyhow::Result<()>;

    /// Delete the torrent from the selected surfaces.
    async fn delete(
        &self,
        torrent_id: Uuid,
        remove_remote: bool,
        remove_client: bool,
        remove_files: bool,
    ) -> anyhow::Result<()>;

    /// Best-effort post-completion hook (library refresh, notifications).
    async fn run_torrent_complete(&self, torrent_id: Uuid) -> anyhow::Result<()>;
}

/// Facade over the persistent download rows.
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Load a download row by id.
    async fn get(&self, download_id: Uuid) -> anyhow::Result<Option<Download>>;

    /// Set or clear the download-stage start timestamp.
    async fn update_download_started(
        &self,
        download_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;

    /// Record a clean transfer finish: sets `finished` and `unpacking_queued`
    /// to `at` in a single write.
    async fn finish_download_stage(
        &self,
        download_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Set or clear the unpack-stage start timestamp.
    async fn update_unpacking_started(
        &self,
        download_id: Uuid,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;

    /// Record when the unpack stage finished.
    async fn update_unpacking_finished(
        &self,
        download_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Skip the unpack stage entirely: sets `unpacking_started`,
    /// `unpacking_finished`, and `completed` to `at` in a single write.
    async fn skip_unpacking(&self, download_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Record a terminal error on the download.
    async fn update_error(&self, download_id: Uuid, message: &str) -> anyhow::Result<()>;

    /// Record the terminal timestamp on the download.
    async fn update_completed(&self, download_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Overwrite the retry counter.
    async fn update_retry_count(&self, download_id: Uuid, retry_count: i32)
    -> anyhow::Result<()>;

    /// Clear all stage timestamps and the error, re-queueing the download
    /// from scratch. The retry counter is left untouched.
    async fn reset(&self, download_id: Uuid) -> anyhow::Result<()>;

    /// Record backend-assigned remote ids for a batch of downloads.
    async fn update_remote_id_batch(
        &self,
        updates: &HashMap<Uuid, String>,
    ) -> anyhow::Result<()>;

    /// Record start failures for a batch of downloads.
    async fn update_error_batch(&self, updates: &HashMap<Uuid, String>) -> anyhow::Result<()>;

    /// Clear `started` on every non-completed download a crash left
    /// mid-transfer. Returns the number of rewound rows.
    async fn rewind_interrupted_downloads(&self) -> anyhow::Result<u64>;

    /// Clear `unpacking_started` on every non-completed download a crash left
    /// mid-unpack. Returns the number of rewound rows.
    async fn rewind_interrupted_unpacks(&self) -> anyhow::Result<u64>;
}

/// Observable handle over a running download worker.
///
/// Workers execute on their own tasks; the runner observes them exclusively
/// through this handle and the registries.
#[async_trait]
pub trait DownloadHandle: Send + Sync {
    /// Backend variant this worker belongs to.
    fn kind(&self) -> DownloadClientKind;

    /// Whether the worker finished (cleanly or with an error).
    fn finished(&self) -> bool;

    /// Failure detail when the worker finished with an error.
    fn error(&self) -> Option<String>;

    /// Expected total bytes, as far as the worker knows.
    fn bytes_total(&self) -> u64;

    /// Bytes transferred so far.
    fn bytes_done(&self) -> u64;

    /// Launch the transfer. Returns the backend-assigned remote id, when the
    /// backend issues one.
    async fn start(&self) -> anyhow::Result<Option<String>>;

    /// Whether the worker consumes aggregated bulk status updates; default
    /// implementation reports lack of support.
    fn supports_bulk_status(&self) -> bool {
        false
    }

    /// Feed a bulk status result to the worker; default implementation
    /// ignores it.
    fn apply_bulk_status(&self, statuses: &[RemoteTaskStatus]) {
        let _ = statuses;
    }
}

/// Observable handle over a running unpack worker.
#[async_trait]
pub trait UnpackHandle: Send + Sync {
    /// Whether the worker finished (cleanly or with an error).
    fn finished(&self) -> bool;

    /// Failure detail when the worker finished with an error.
    fn error(&self) -> Option<String>;

    /// Launch the extraction.
    async fn start(&self) -> anyhow::Result<()>;
}

/// Factory constructing workers for the configured backend.
#[async_trait]
pub trait WorkerFactory: Send + Sync {
    /// Backend variant this factory produces download workers for.
    fn client_kind(&self) -> DownloadClientKind;

    /// Build a download worker over a resolved download and its target
    /// directory.
    async fn download_handle(
        &self,
        download: &Download,
        torrent: &Torrent,
        target_dir: &Path,
    ) -> anyhow::Result<Arc<dyn DownloadHandle>>;

    /// Build an unpack worker over a finished download.
    async fn unpack_handle(
        &self,
        download: &Download,
        target_dir: &Path,
    ) -> anyhow::Result<Arc<dyn UnpackHandle>>;
}

/// Bulk status endpoint exposed by Aria2c-style backends.
#[async_trait]
pub trait BulkStatusClient: Send + Sync {
    /// Fetch the status of every transfer known to the backend.
    async fn tell_all(&self) -> anyhow::Result<Vec<RemoteTaskStatus>>;
}

/// Remote progress push service notified at the end of every tick.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Push the current torrent snapshots to subscribers. Idempotent.
    async fn update(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubHandle;

    #[async_trait]
    impl DownloadHandle for StubHandle {
        fn kind(&self) -> DownloadClientKind {
            DownloadClientKind::Internal
        }

        fn finished(&self) -> bool {
            false
        }

        fn error(&self) -> Option<String> {
            None
        }

        fn bytes_total(&self) -> u64 {
            0
        }

        fn bytes_done(&self) -> u64 {
            0
        }

        async fn start(&self) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn bulk_status_defaults_to_unsupported() {
        let handle = StubHandle;
        assert!(!handle.supports_bulk_status());
        handle.apply_bulk_status(&[RemoteTaskStatus {
            remote_id: "gid-1".to_string(),
            status: "active".to_string(),
            bytes_done: 1,
            bytes_total: 2,
            error: None,
        }]);
    }

    #[tokio::test]
    async fn stub_handle_starts_without_remote_id() {
        let handle = StubHandle;
        let remote_id = handle.start().await.expect("start");
        assert!(remote_id.is_none());
    }

    #[test]
    fn core_error_renders_stable_messages() {
        let error = CoreError::DownloadNotFound {
            download_id: Uuid::from_u128(9),
        };
        assert_eq!(error.to_string(), "download not found");
    }
}
