//! `TorrentGateway` implementation composing the provider client and the
//! Postgres store.
//!
//! # Design
//! - The gateway owns torrent row creation/destruction and the retry
//!   counter; the runner only requests transitions through the facade.
//! - `list` refreshes provider statuses with a single list call per
//!   invocation and mutates the already-loaded rows in place, so the runner
//!   never re-reads within a tick.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strand_config::ConfigHandle;
use strand_core::{
    CoreError, Download, DownloadStore, RemoteStatus, Torrent, TorrentGateway,
};
use strand_data::PgStore;
use strand_events::{Event, EventBus};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::client::{ProviderTorrent, RealDebridClient};

/// Options accompanying a torrent submission.
#[derive(Debug, Clone)]
pub struct AddTorrentRequest {
    /// Magnet URI to submit.
    pub magnet: String,
    /// Routing category; lower-cased before storage.
    pub category: Option<String>,
    /// Action applied when every child download completes.
    pub finished_action: strand_core::FinishedAction,
    /// Whether cloud content is fetched locally at all.
    pub host_download_action: strand_core::HostDownloadAction,
    /// Minutes before an unstarted torrent expires; 0 disables.
    pub lifetime: i64,
    /// Minutes before an error-terminal torrent is deleted; 0 disables.
    pub delete_on_error: i64,
    /// Retry budget for the torrent as a whole.
    pub torrent_retry_attempts: i32,
    /// Retry budget applied to each child download.
    pub download_retry_attempts: i32,
}

/// Facade over Real-Debrid plus the persistent torrent rows.
#[derive(Clone)]
pub struct DebridTorrentGateway {
    client: RealDebridClient,
    store: PgStore,
    events: EventBus,
    config: ConfigHandle,
}

impl DebridTorrentGateway {
    /// Construct a gateway over shared dependencies.
    #[must_use]
    pub const fn new(
        client: RealDebridClient,
        store: PgStore,
        events: EventBus,
        config: ConfigHandle,
    ) -> Self {
        Self {
            client,
            store,
            events,
            config,
        }
    }

    /// Submit a magnet to the provider and register the torrent row.
    ///
    /// # Errors
    ///
    /// Returns an error if the magnet does not parse, the provider rejects
    /// it, or the row cannot be stored.
    pub async fn add_magnet(&self, request: AddTorrentRequest) -> Result<Uuid> {
        let (hash, display_name) = parse_magnet(&request.magnet)?;
        let added = self
            .client
            .add_magnet(&request.magnet)
            .await
            .context("failed to submit magnet to the provider")?;

        let name = display_name.unwrap_or_else(|| hash.clone());
        let torrent = Torrent {
            id: Uuid::new_v4(),
            hash,
            name: name.clone(),
            category: request.category.map(|category| category.to_lowercase()),
            remote_status: RemoteStatus::Queued,
            remote_status_raw: "queued".to_string(),
            remote_id: Some(added.id),
            added: Utc::now(),
            files_selected: None,
            completed: None,
            retry: None,
            retry_count: 0,
            torrent_retry_attempts: request.torrent_retry_attempts,
            download_retry_attempts: request.download_retry_attempts,
            lifetime: request.lifetime,
            delete_on_error: request.delete_on_error,
            error: None,
            finished_action: request.finished_action,
            host_download_action: request.host_download_action,
            downloads: Vec::new(),
        };
        self.store.insert_torrent(&torrent).await?;

        info!(torrent_id = %torrent.id, torrent_name = %name, "torrent submitted");
        let _ = self.events.publish(Event::TorrentQueued {
            torrent_id: torrent.id,
            name,
        });
        Ok(torrent.id)
    }

    async fn require_torrent(&self, torrent_id: Uuid) -> Result<Torrent> {
        self.store
            .get_torrent(torrent_id)
            .await?
            .ok_or_else(|| anyhow!(CoreError::TorrentNotFound { torrent_id }))
    }

    async fn refresh_remote_state(&self, torrents: &mut [Torrent]) {
        if torrents.iter().all(Torrent::is_completed) {
            return;
        }
        let remote = match self.client.list_torrents().await {
            Ok(remote) => remote,
            Err(err) => {
                warn!(error = %err, "failed to refresh provider torrent list; using stored statuses");
                return;
            }
        };
        let by_id: HashMap<&str, &ProviderTorrent> = remote
            .iter()
            .map(|torrent| (torrent.id.as_str(), torrent))
            .collect();

        for torrent in torrents.iter_mut() {
            if torrent.is_completed() {
                continue;
            }
            let Some(remote_id) = torrent.remote_id.as_deref() else {
                continue;
            };
            let Some(item) = by_id.get(remote_id) else {
                debug!(torrent_id = %torrent.id, "torrent absent from provider list");
                continue;
            };
            if item.status == torrent.remote_status_raw {
                continue;
            }
            let mapped = RemoteStatus::from_raw(&item.status);
            if let Err(err) = self
                .store
                .update_remote_state(torrent.id, mapped, &item.status, None)
                .await
            {
                warn!(
                    error = %err,
                    torrent_id = %torrent.id,
                    "failed to persist refreshed provider status"
                );
                continue;
            }
            torrent.remote_status = mapped;
            torrent.remote_status_raw.clone_from(&item.status);
        }
    }

    async fn remove_local_files(&self, torrent: &Torrent) {
        let config = self.config.snapshot().await;
        if config.download_client.download_path.is_empty() {
            return;
        }
        let mut base = PathBuf::from(&config.download_client.download_path);
        if let Some(category) = &torrent.category {
            base = base.join(category);
        }

        for root in content_roots(torrent) {
            let target = base.join(root);
            match tokio::fs::remove_dir_all(&target).await {
                Ok(()) => info!(path = %target.display(), "removed torrent files"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(_) => match tokio::fs::remove_file(&target).await {
                    Ok(()) => info!(path = %target.display(), "removed torrent file"),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => warn!(
                        error = %err,
                        path = %target.display(),
                        "failed to remove torrent files"
                    ),
                },
            }
        }
    }
}

#[async_trait]
impl TorrentGateway for DebridTorrentGateway {
    async fn list(&self) -> Result<Vec<Torrent>> {
        let mut torrents = self.store.list_torrents().await?;
        self.refresh_remote_state(&mut torrents).await;
        Ok(torrents)
    }

    async fn unrestrict_link(&self, download_id: Uuid) -> Result<String> {
        let download = self
            .store
            .get(download_id)
            .await?
            .ok_or(CoreError::DownloadNotFound { download_id })?;
        let restricted = download
            .restricted_link
            .as_deref()
            .ok_or(CoreError::MissingRestrictedLink { download_id })?;
        let unrestricted = self
            .client
            .unrestrict_link(restricted)
            .await
            .context("provider refused to unrestrict the link")?;
        self.store
            .update_download_link(download_id, &unrestricted.download)
            .await?;
        Ok(unrestricted.download)
    }

    async fn retry_torrent(&self, torrent_id: Uuid, retry_count: i32) -> Result<()> {
        let torrent = self.require_torrent(torrent_id).await?;
        if let Some(remote_id) = torrent.remote_id.as_deref()
            && let Err(err) = self.client.delete_torrent(remote_id).await
        {
            warn!(
                error = %err,
                torrent_id = %torrent_id,
                "failed to delete provider torrent before retry"
            );
        }

        let magnet = magnet_from_hash(&torrent.hash, &torrent.name);
        let added = self
            .client
            .add_magnet(&magnet)
            .await
            .context("failed to re-submit torrent for retry")?;

        self.store.clear_downloads(torrent_id).await?;
        self.store
            .reset_torrent_for_retry(torrent_id, retry_count + 1, Some(&added.id), "queued")
            .await?;
        info!(
            torrent_id = %torrent_id,
            retry_count = retry_count + 1,
            "torrent re-submitted for retry"
        );
        Ok(())
    }

    async fn update_retry(
        &self,
        torrent_id: Uuid,
        retry: Option<DateTime<Utc>>,
        retry_count: i32,
    ) -> Result<()> {
        Ok(self
            .store
            .update_torrent_retry(torrent_id, retry, retry_count)
            .await?)
    }

    async fn select_files(&self, torrent_id: Uuid) -> Result<()> {
        let torrent = self.require_torrent(torrent_id).await?;
        let remote_id = torrent
            .remote_id
            .as_deref()
            .ok_or_else(|| anyhow!("torrent {torrent_id} has no provider id"))?;
        self.client
            .select_files(remote_id, "all")
            .await
            .context("provider refused the file selection")?;
        Ok(())
    }

    async fn update_files_selected(&self, torrent_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.store.update_files_selected(torrent_id, at).await?;
        let _ = self.events.publish(Event::FilesSelected { torrent_id });
        Ok(())
    }

    async fn create_downloads(&self, torrent_id: Uuid) -> Result<()> {
        let torrent = self.require_torrent(torrent_id).await?;
        let remote_id = torrent
            .remote_id
            .as_deref()
            .ok_or_else(|| anyhow!("torrent {torrent_id} has no provider id"))?;
        let info = self
            .client
            .torrent_info(remote_id)
            .await
            .context("failed to load provider torrent detail")?;

        let selected: Vec<_> = info.files.iter().filter(|file| file.selected != 0).collect();
        if selected.len() != info.links.len() {
            warn!(
                torrent_id = %torrent_id,
                selected = selected.len(),
                links = info.links.len(),
                "provider link count does not match the selected files"
            );
        }

        let now = Utc::now();
        let downloads: Vec<Download> = selected
            .iter()
            .zip(info.links.iter())
            .map(|(file, link)| Download {
                id: Uuid::new_v4(),
                torrent_id,
                path: file.path.trim_start_matches('/').to_string(),
                restricted_link: Some(link.clone()),
                link: None,
                remote_id: None,
                queued: now,
                started: None,
                finished: None,
                unpacking_queued: None,
                unpacking_started: None,
                unpacking_finished: None,
                completed: None,
                error: None,
                retry_count: 0,
                bytes_total: file.bytes,
                bytes_done: 0,
            })
            .collect();
        self.store.insert_downloads(&downloads).await?;

        info!(torrent_id = %torrent_id, count = downloads.len(), "download rows created");
        let _ = self.events.publish(Event::DownloadsCreated {
            torrent_id,
            count: downloads.len(),
        });
        Ok(())
    }

    async fn update_error(&self, torrent_id: Uuid, message: &str) -> Result<()> {
        Ok(self.store.update_torrent_error(torrent_id, message).await?)
    }

    async fn update_complete(
        &self,
        torrent_id: Uuid,
        error: Option<String>,
        at: DateTime<Utc>,
        terminal: bool,
    ) -> Result<()> {
        self.store
            .set_torrent_complete(torrent_id, error.as_deref(), at)
            .await?;

        if !terminal
            && error.is_some()
            && let Some(torrent) = self.store.get_torrent(torrent_id).await?
            && torrent.retry_count < torrent.torrent_retry_attempts
        {
            self.store
                .update_torrent_retry(torrent_id, Some(at), torrent.retry_count)
                .await?;
            info!(
                torrent_id = %torrent_id,
                retry_count = torrent.retry_count,
                "armed automatic retry after failure"
            );
        }

        let _ = self.events.publish(Event::TorrentCompleted { torrent_id, error });
        Ok(())
    }

    async fn delete(
        &self,
        torrent_id: Uuid,
        remove_remote: bool,
        remove_client: bool,
        remove_files: bool,
    ) -> Result<()> {
        let Some(torrent) = self.store.get_torrent(torrent_id).await? else {
            return Ok(());
        };

        if remove_remote
            && let Some(remote_id) = torrent.remote_id.as_deref()
            && let Err(err) = self.client.delete_torrent(remote_id).await
        {
            warn!(
                error = %err,
                torrent_id = %torrent_id,
                "failed to delete provider torrent"
            );
        }

        if remove_files {
            self.remove_local_files(&torrent).await;
        }

        if remove_client {
            self.store.delete_torrent(torrent_id).await?;
            let _ = self.events.publish(Event::TorrentDeleted { torrent_id });
        }

        info!(
            torrent_id = %torrent_id,
            remove_remote,
            remove_client,
            remove_files,
            "torrent delete processed"
        );
        Ok(())
    }

    async fn run_torrent_complete(&self, torrent_id: Uuid) -> Result<()> {
        let config = self.config.snapshot().await;
        let Some(command) = config.general.completed_command else {
            return Ok(());
        };
        // A finish action may already have removed the client row.
        let Some(torrent) = self.store.get_torrent(torrent_id).await? else {
            return Ok(());
        };

        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .env("STRAND_TORRENT_ID", torrent.id.to_string())
            .env("STRAND_TORRENT_NAME", &torrent.name)
            .env(
                "STRAND_TORRENT_CATEGORY",
                torrent.category.as_deref().unwrap_or_default(),
            )
            .status()
            .await
            .context("failed to launch the completed-command hook")?;
        if !status.success() {
            return Err(anyhow!("completed-command hook exited with {status}"));
        }
        Ok(())
    }
}

/// Extract the info-hash and display name from a magnet URI.
///
/// # Errors
///
/// Returns an error if the URI does not parse or carries no `btih` hash.
fn parse_magnet(magnet: &str) -> Result<(String, Option<String>)> {
    let url = Url::parse(magnet).context("magnet URI does not parse")?;
    if url.scheme() != "magnet" {
        return Err(anyhow!("expected a magnet URI, got scheme '{}'", url.scheme()));
    }

    let mut hash = None;
    let mut name = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "xt" => {
                if let Some(found) = value.strip_prefix("urn:btih:") {
                    hash = Some(found.to_lowercase());
                }
            }
            "dn" => name = Some(value.into_owned()),
            _ => {}
        }
    }

    hash.map(|hash| (hash, name))
        .ok_or_else(|| anyhow!("magnet URI carries no btih info-hash"))
}

/// Rebuild a magnet URI from a stored info-hash and display name.
fn magnet_from_hash(hash: &str, name: &str) -> String {
    format!(
        "magnet:?xt=urn:btih:{hash}&dn={}",
        urlencoding::encode(name)
    )
}

/// First path components of a torrent's downloads, deduplicated in order.
fn content_roots(torrent: &Torrent) -> BTreeSet<String> {
    let mut roots = BTreeSet::new();
    for download in &torrent.downloads {
        let trimmed = download.path.trim_start_matches('/');
        if let Some(root) = Path::new(trimmed)
            .components()
            .next()
            .and_then(|component| component.as_os_str().to_str())
        {
            roots.insert(root.to_string());
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{FinishedAction, HostDownloadAction};

    #[test]
    fn parse_magnet_extracts_hash_and_name() {
        let (hash, name) =
            parse_magnet("magnet:?xt=urn:btih:DEADBEEF&dn=Demo%20Torrent").expect("parses");
        assert_eq!(hash, "deadbeef");
        assert_eq!(name.as_deref(), Some("Demo Torrent"));
    }

    #[test]
    fn parse_magnet_rejects_other_schemes() {
        assert!(parse_magnet("https://example.com").is_err());
        assert!(parse_magnet("magnet:?dn=NoHash").is_err());
    }

    #[test]
    fn magnet_round_trips_through_parse() {
        let magnet = magnet_from_hash("deadbeef", "Demo Torrent");
        let (hash, name) = parse_magnet(&magnet).expect("round trip parses");
        assert_eq!(hash, "deadbeef");
        assert_eq!(name.as_deref(), Some("Demo Torrent"));
    }

    #[test]
    fn content_roots_deduplicate_folders() {
        let mut torrent = Torrent {
            id: Uuid::from_u128(1),
            hash: "deadbeef".to_string(),
            name: "demo".to_string(),
            category: None,
            remote_status: RemoteStatus::Finished,
            remote_status_raw: "downloaded".to_string(),
            remote_id: None,
            added: Utc::now(),
            files_selected: None,
            completed: None,
            retry: None,
            retry_count: 0,
            torrent_retry_attempts: 0,
            download_retry_attempts: 0,
            lifetime: 0,
            delete_on_error: 0,
            error: None,
            finished_action: FinishedAction::None,
            host_download_action: HostDownloadAction::DownloadAll,
            downloads: Vec::new(),
        };
        for path in ["/Demo/a.mkv", "/Demo/b.mkv", "loose.mkv"] {
            torrent.downloads.push(Download {
                id: Uuid::new_v4(),
                torrent_id: torrent.id,
                path: path.to_string(),
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
            });
        }

        let roots = content_roots(&torrent);
        assert_eq!(
            roots.into_iter().collect::<Vec<_>>(),
            vec!["Demo".to_string(), "loose.mkv".to_string()]
        );
    }
}
