//! Domain model shared across the workspace.
//!
//! # Design
//! - Pure data carriers for torrent and download rows plus the enums the
//!   reconciler dispatches on.
//! - Predicates used by the runner live here so the store, the gateway, and
//!   the tests agree on stage semantics.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status reported by the debrid provider for a torrent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Torrent is queued on the provider side.
    Queued,
    /// Provider is fetching the torrent payload into its cloud.
    Downloading,
    /// Provider is waiting for the client to select files.
    WaitingForFileSelection,
    /// Provider finished fetching; restricted links are available.
    Finished,
    /// Provider reported a terminal error for the torrent.
    Error,
    /// Status string was not recognised; treated as still in flight.
    Unknown,
}

impl RemoteStatus {
    /// Map a raw provider status string onto the lifecycle enum.
    ///
    /// Unrecognised statuses map to [`Self::Unknown`] rather than an error so
    /// that new provider states never wedge the reconciler.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "queued" | "magnet_conversion" => Self::Queued,
            "downloading" | "compressing" | "uploading" => Self::Downloading,
            "waiting_files_selection" => Self::WaitingForFileSelection,
            "downloaded" => Self::Finished,
            "error" | "magnet_error" | "virus" | "dead" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Render the status as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::WaitingForFileSelection => "waiting_for_file_selection",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Action applied once every child download of a torrent has completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinishedAction {
    /// Leave the torrent everywhere.
    #[default]
    None,
    /// Remove the torrent from the provider and the client, keeping files.
    RemoveAllTorrents,
    /// Remove only the provider-side torrent, keeping the client row.
    RemoveProvider,
    /// Remove only the client row, keeping the provider-side torrent.
    RemoveClient,
}

impl FinishedAction {
    /// Render the action as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RemoveAllTorrents => "remove_all_torrents",
            Self::RemoveProvider => "remove_provider",
            Self::RemoveClient => "remove_client",
        }
    }

    /// The `(remove_remote, remove_client, remove_files)` delete flags this
    /// action translates to, or `None` when nothing is deleted.
    #[must_use]
    pub const fn delete_flags(self) -> Option<(bool, bool, bool)> {
        match self {
            Self::None => None,
            Self::RemoveAllTorrents => Some((true, true, false)),
            Self::RemoveProvider => Some((false, true, false)),
            Self::RemoveClient => Some((true, false, false)),
        }
    }
}

impl FromStr for FinishedAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "remove_all_torrents" => Ok(Self::RemoveAllTorrents),
            "remove_provider" => Ok(Self::RemoveProvider),
            "remove_client" => Ok(Self::RemoveClient),
            other => Err(anyhow!("invalid finished action '{other}'")),
        }
    }
}

/// Whether the cloud-finished content should be fetched to local storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostDownloadAction {
    /// Create a download child for every selected file.
    #[default]
    DownloadAll,
    /// Keep the content in the cloud only.
    DownloadNone,
}

impl HostDownloadAction {
    /// Render the action as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DownloadAll => "download_all",
            Self::DownloadNone => "download_none",
        }
    }
}

impl FromStr for HostDownloadAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download_all" => Ok(Self::DownloadAll),
            "download_none" => Ok(Self::DownloadNone),
            other => Err(anyhow!("invalid host download action '{other}'")),
        }
    }
}

/// Download backend configured for the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadClientKind {
    /// Built-in streaming HTTP downloader.
    #[default]
    Internal,
    /// External aria2c daemon driven over JSON-RPC.
    Aria2c,
    /// Symlink into an already-mounted remote filesystem; no byte transfer.
    Symlink,
}

impl DownloadClientKind {
    /// Whether this backend materialises files without transferring bytes.
    #[must_use]
    pub const fn is_symlink(self) -> bool {
        matches!(self, Self::Symlink)
    }

    /// Render the kind as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Aria2c => "aria2c",
            Self::Symlink => "symlink",
        }
    }
}

impl FromStr for DownloadClientKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Self::Internal),
            "aria2c" => Ok(Self::Aria2c),
            "symlink" => Ok(Self::Symlink),
            other => Err(anyhow!("invalid download client '{other}'")),
        }
    }
}

/// One user-submitted torrent with its remote and local lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Torrent {
    /// Stable identifier for the torrent row.
    pub id: Uuid,
    /// Info-hash of the submitted torrent, lowercase hex.
    pub hash: String,
    /// Display name taken from the magnet or metainfo.
    pub name: String,
    /// Routing category; lower-cased, appended to the download path.
    pub category: Option<String>,
    /// Mapped provider status.
    pub remote_status: RemoteStatus,
    /// Raw status string as reported by the provider.
    pub remote_status_raw: String,
    /// Identifier assigned by the provider, when known.
    pub remote_id: Option<String>,
    /// When the torrent was submitted.
    pub added: DateTime<Utc>,
    /// When file selection was confirmed against the provider.
    pub files_selected: Option<DateTime<Utc>>,
    /// Terminal timestamp; once set the torrent is never worked on again.
    pub completed: Option<DateTime<Utc>>,
    /// Non-null requests a retry on the next tick.
    pub retry: Option<DateTime<Utc>>,
    /// Number of retries consumed so far.
    pub retry_count: i32,
    /// Retry budget for the torrent as a whole.
    pub torrent_retry_attempts: i32,
    /// Retry budget applied to each child download.
    pub download_retry_attempts: i32,
    /// Minutes after `added` before an unstarted torrent expires; 0 disables.
    pub lifetime: i64,
    /// Minutes after an error-terminal `completed` before deletion; 0 disables.
    pub delete_on_error: i64,
    /// Terminal error recorded on the torrent, if any.
    pub error: Option<String>,
    /// Action applied when every child download completes.
    pub finished_action: FinishedAction,
    /// Whether cloud content is fetched locally at all.
    pub host_download_action: HostDownloadAction,
    /// Child downloads, ordered by their queue timestamp.
    pub downloads: Vec<Download>,
}

impl Torrent {
    /// Whether the torrent reached its terminal state.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    /// Aggregate progress across the child downloads.
    #[must_use]
    pub fn totals(&self) -> TorrentTotals {
        let mut totals = TorrentTotals::default();
        for download in &self.downloads {
            if download.completed.is_some() {
                totals.complete_count += 1;
            }
            totals.bytes_total += download.bytes_total;
            totals.bytes_done += download.bytes_done;
        }
        totals
    }
}

/// Aggregate progress metrics for a torrent's child downloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TorrentTotals {
    /// Number of downloads that reached their terminal state.
    pub complete_count: usize,
    /// Sum of expected bytes across all downloads.
    pub bytes_total: u64,
    /// Sum of transferred bytes across all downloads.
    pub bytes_done: u64,
}

impl TorrentTotals {
    /// Completion percentage in whole percent, `None` when nothing is known.
    #[must_use]
    pub const fn percent_complete(&self) -> Option<u64> {
        if self.bytes_total == 0 {
            None
        } else {
            Some(self.bytes_done * 100 / self.bytes_total)
        }
    }
}

/// One restricted-link fetch to local storage, plus its optional unpack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Download {
    /// Stable identifier for the download row.
    pub id: Uuid,
    /// Identifier of the owning torrent.
    pub torrent_id: Uuid,
    /// Relative path of the file inside the torrent payload.
    pub path: String,
    /// Restricted share URL issued by the provider at row creation.
    pub restricted_link: Option<String>,
    /// Unrestricted URL, resolved lazily before the first start.
    pub link: Option<String>,
    /// Identifier assigned by the worker backend on start.
    pub remote_id: Option<String>,
    /// When the download was queued; set once at row creation.
    pub queued: DateTime<Utc>,
    /// When a download worker was dispatched.
    pub started: Option<DateTime<Utc>>,
    /// When the transfer finished cleanly.
    pub finished: Option<DateTime<Utc>>,
    /// When the unpack stage was queued.
    pub unpacking_queued: Option<DateTime<Utc>>,
    /// When an unpack worker was dispatched.
    pub unpacking_started: Option<DateTime<Utc>>,
    /// When the unpack stage finished.
    pub unpacking_finished: Option<DateTime<Utc>>,
    /// Terminal timestamp; once set no further stage transitions occur.
    pub completed: Option<DateTime<Utc>>,
    /// Terminal error; once set the download is only subject to retry reset.
    pub error: Option<String>,
    /// Number of worker retries consumed so far.
    pub retry_count: i32,
    /// Expected size in bytes, maintained by the worker.
    pub bytes_total: u64,
    /// Transferred bytes, maintained by the worker.
    pub bytes_done: u64,
}

impl Download {
    /// Whether the download is waiting for a worker to be started.
    #[must_use]
    pub const fn awaits_download_start(&self) -> bool {
        self.completed.is_none() && self.started.is_none() && self.error.is_none()
    }

    /// Whether the download is waiting for an unpack worker to be started.
    #[must_use]
    pub const fn awaits_unpack_start(&self) -> bool {
        self.completed.is_none()
            && self.unpacking_queued.is_some()
            && self.unpacking_started.is_none()
            && self.error.is_none()
    }

    /// Whether a crash left the download stage mid-flight: a worker was
    /// dispatched but neither finished nor failed.
    #[must_use]
    pub const fn download_stage_interrupted(&self) -> bool {
        self.started.is_some() && self.finished.is_none() && self.error.is_none()
    }

    /// Whether a crash left the unpack stage mid-flight.
    #[must_use]
    pub const fn unpack_stage_interrupted(&self) -> bool {
        self.unpacking_queued.is_some()
            && self.unpacking_started.is_some()
            && self.unpacking_finished.is_none()
            && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_download(id: u128) -> Download {
        Download {
            id: Uuid::from_u128(id),
            torrent_id: Uuid::from_u128(1),
            path: format!("file-{id}.mkv"),
            restricted_link: None,
            link: None,
            remote_id: None,
            queued: Utc::now(),
            started: None,
            finished: None,
            unpacking_queued: None,
            unpacking_started: None,
            unpacking_finished: None,
            completed: None,
            error: None,
            retry_count: 0,
            bytes_total: 0,
            bytes_done: 0,
        }
    }

    fn sample_torrent() -> Torrent {
        Torrent {
            id: Uuid::from_u128(1),
            hash: "deadbeef".to_string(),
            name: "demo".to_string(),
            category: None,
            remote_status: RemoteStatus::Finished,
            remote_status_raw: "downloaded".to_string(),
            remote_id: Some("rd-1".to_string()),
            added: Utc::now(),
            files_selected: None,
            completed: None,
            retry: None,
            retry_count: 0,
            torrent_retry_attempts: 2,
            download_retry_attempts: 2,
            lifetime: 0,
            delete_on_error: 0,
            error: None,
            finished_action: FinishedAction::None,
            host_download_action: HostDownloadAction::DownloadAll,
            downloads: Vec::new(),
        }
    }

    #[test]
    fn remote_status_maps_provider_strings() {
        assert_eq!(RemoteStatus::from_raw("downloaded"), RemoteStatus::Finished);
        assert_eq!(
            RemoteStatus::from_raw("waiting_files_selection"),
            RemoteStatus::WaitingForFileSelection
        );
        assert_eq!(RemoteStatus::from_raw("magnet_error"), RemoteStatus::Error);
        assert_eq!(RemoteStatus::from_raw("virus"), RemoteStatus::Error);
        assert_eq!(
            RemoteStatus::from_raw("magnet_conversion"),
            RemoteStatus::Queued
        );
        assert_eq!(RemoteStatus::from_raw("compressing"), RemoteStatus::Downloading);
        assert_eq!(RemoteStatus::from_raw("who-knows"), RemoteStatus::Unknown);
    }

    #[test]
    fn finished_action_delete_flags_match_contract() {
        assert_eq!(FinishedAction::None.delete_flags(), None);
        assert_eq!(
            FinishedAction::RemoveAllTorrents.delete_flags(),
            Some((true, true, false))
        );
        assert_eq!(
            FinishedAction::RemoveProvider.delete_flags(),
            Some((false, true, false))
        );
        assert_eq!(
            FinishedAction::RemoveClient.delete_flags(),
            Some((true, false, false))
        );
    }

    #[test]
    fn enum_string_round_trips() {
        for action in [
            FinishedAction::None,
            FinishedAction::RemoveAllTorrents,
            FinishedAction::RemoveProvider,
            FinishedAction::RemoveClient,
        ] {
            assert_eq!(action.as_str().parse::<FinishedAction>().unwrap(), action);
        }
        for action in [HostDownloadAction::DownloadAll, HostDownloadAction::DownloadNone] {
            assert_eq!(
                action.as_str().parse::<HostDownloadAction>().unwrap(),
                action
            );
        }
        for kind in [
            DownloadClientKind::Internal,
            DownloadClientKind::Aria2c,
            DownloadClientKind::Symlink,
        ] {
            assert_eq!(kind.as_str().parse::<DownloadClientKind>().unwrap(), kind);
        }
        assert!("sideways".parse::<FinishedAction>().is_err());
    }

    #[test]
    fn totals_aggregate_children() {
        let mut torrent = sample_torrent();
        let mut first = sample_download(10);
        first.bytes_total = 100;
        first.bytes_done = 100;
        first.completed = Some(Utc::now());
        let mut second = sample_download(11);
        second.bytes_total = 100;
        second.bytes_done = 50;
        torrent.downloads = vec![first, second];

        let totals = torrent.totals();
        assert_eq!(totals.complete_count, 1);
        assert_eq!(totals.bytes_total, 200);
        assert_eq!(totals.bytes_done, 150);
        assert_eq!(totals.percent_complete(), Some(75));
    }

    #[test]
    fn percent_complete_handles_zero_total() {
        assert_eq!(TorrentTotals::default().percent_complete(), None);
    }

    #[test]
    fn stage_predicates_track_timestamps() {
        let mut download = sample_download(1);
        assert!(download.awaits_download_start());
        assert!(!download.awaits_unpack_start());

        download.started = Some(Utc::now());
        assert!(!download.awaits_download_start());
        assert!(download.download_stage_interrupted());

        download.finished = Some(Utc::now());
        download.unpacking_queued = Some(Utc::now());
        assert!(!download.download_stage_interrupted());
        assert!(download.awaits_unpack_start());

        download.unpacking_started = Some(Utc::now());
        assert!(download.unpack_stage_interrupted());

        download.error = Some("boom".to_string());
        assert!(!download.awaits_unpack_start());
        assert!(!download.unpack_stage_interrupted());
    }
}
