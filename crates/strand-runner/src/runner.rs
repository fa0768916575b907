#![allow(clippy::cognitive_complexity)]

//! The reconciliation engine: one `tick` drives every torrent one step
//! further through its lifecycle.
//!
//! # Design
//! - A tick is a single pass: bulk status poll, completion sweeps, retry /
//!   retention / expiry passes, per-torrent reconciliation with work starts,
//!   and a closing progress push. The tick never propagates an error; every
//!   failure is contained at the torrent or download it belongs to.
//! - The torrent list is read once per tick and mutated in memory alongside
//!   each store write, so no step re-reads rows it already holds.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use strand_config::{AppConfig, ConfigHandle, validate};
use strand_core::{
    BulkStatusClient, Download, DownloadClientKind, DownloadHandle, DownloadStore,
    HostDownloadAction, ProgressReporter, RemoteStatus, Torrent, TorrentGateway, WorkerFactory,
};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::registry::ActiveRegistry;

/// Mandatory delay between successive download starts within one torrent.
const START_DELAY: Duration = Duration::from_millis(100);

/// Tick duration above which the closing log line is emitted.
const TICK_BUDGET: Duration = Duration::from_millis(1_000);

/// Error recorded when an unpack candidate has no resolved link.
const MISSING_LINK_ERROR: &str = "Download Link cannot be null";

/// Error recorded when the symlink backend is asked to extract an archive.
const SYMLINK_UNPACK_ERROR: &str = "Will not unzip with SymlinkDownloader!";

/// Per-tick settings derived from the validated configuration.
struct TickSettings {
    download_limit: usize,
    unpack_limit: usize,
    download_path: PathBuf,
    client_kind: DownloadClientKind,
}

/// Periodic reconciliation engine over the torrent and download rows.
///
/// The runner owns no rows and no workers: rows live behind the gateway and
/// store facades, workers behind the registry. The external driver invokes
/// [`TorrentRunner::tick`] on a fixed cadence and guarantees invocations
/// never overlap.
pub struct TorrentRunner {
    gateway: Arc<dyn TorrentGateway>,
    store: Arc<dyn DownloadStore>,
    factory: Arc<dyn WorkerFactory>,
    bulk: Option<Arc<dyn BulkStatusClient>>,
    reporter: Arc<dyn ProgressReporter>,
    config: ConfigHandle,
    registry: Arc<ActiveRegistry>,
}

impl TorrentRunner {
    /// Construct a runner over shared dependencies.
    #[must_use]
    pub const fn new(
        gateway: Arc<dyn TorrentGateway>,
        store: Arc<dyn DownloadStore>,
        factory: Arc<dyn WorkerFactory>,
        bulk: Option<Arc<dyn BulkStatusClient>>,
        reporter: Arc<dyn ProgressReporter>,
        config: ConfigHandle,
        registry: Arc<ActiveRegistry>,
    ) -> Self {
        Self {
            gateway,
            store,
            factory,
            bulk,
            reporter,
            config,
            registry,
        }
    }

    /// One-shot crash-recovery sweep, run once before the first tick.
    ///
    /// A worker lost to a process crash leaves its stage start timestamp
    /// behind; clearing it re-queues the stage on the next tick. Running the
    /// sweep twice is equivalent to running it once.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects either rewind.
    pub async fn initialize(&self) -> Result<()> {
        let downloads = self
            .store
            .rewind_interrupted_downloads()
            .await
            .context("failed to rewind interrupted downloads")?;
        let unpacks = self
            .store
            .rewind_interrupted_unpacks()
            .await
            .context("failed to rewind interrupted unpacks")?;
        if downloads > 0 || unpacks > 0 {
            info!(downloads, unpacks, "rewound stages interrupted by a previous shutdown");
        }
        Ok(())
    }

    /// One full reconciliation pass. Never returns an error; the driver is
    /// expected to schedule the next tick regardless of what happened here.
    pub async fn tick(&self) {
        let tick_started = Instant::now();
        let config = self.config.snapshot().await;
        let Some(settings) = tick_settings(&config) else {
            return;
        };

        self.poll_bulk_status().await;

        let mut torrents = match self.gateway.list().await {
            Ok(torrents) => torrents,
            Err(err) => {
                warn!(error = %err, "failed to load the torrent list; skipping tick");
                return;
            }
        };

        self.sweep_finished_downloads(&torrents).await;
        self.sweep_finished_unpacks(&torrents).await;

        let mut handled = HashSet::new();
        self.process_retries(&torrents, &mut handled).await;
        self.process_error_retention(&torrents, &mut handled).await;
        self.process_lifetime_expiry(&torrents, &mut handled).await;

        for torrent in &mut torrents {
            if torrent.is_completed() || handled.contains(&torrent.id) {
                continue;
            }
            self.merge_live_progress(torrent).await;
            if let Err(err) = self.reconcile_torrent(torrent, &settings).await {
                self.fail_torrent(torrent.id, format!("{err:#}")).await;
            }
        }

        if let Err(err) = self.reporter.update().await {
            warn!(error = %err, "remote progress push failed");
        }

        let elapsed = tick_started.elapsed();
        if elapsed > TICK_BUDGET {
            warn!(
                duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "tick exceeded its time budget"
            );
        }
    }

    /// Phase (a): one bulk query, fanned out to every worker that consumes
    /// aggregated status.
    async fn poll_bulk_status(&self) {
        let supporting: Vec<_> = self
            .registry
            .snapshot_downloads()
            .await
            .into_iter()
            .filter(|(_, worker)| worker.supports_bulk_status())
            .collect();
        if supporting.is_empty() {
            return;
        }
        let Some(bulk) = &self.bulk else {
            warn!("bulk-capable workers registered without a bulk status client");
            return;
        };
        match bulk.tell_all().await {
            Ok(statuses) => {
                for (_, worker) in supporting {
                    worker.apply_bulk_status(&statuses);
                }
            }
            Err(err) => warn!(error = %err, "bulk status poll failed"),
        }
    }

    /// Phase (b): promote download workers that reported completion.
    ///
    /// Promotions write the store only; the advanced rows surface on the
    /// next tick's list read, so a promoted download is never re-picked
    /// within the tick that promoted it.
    async fn sweep_finished_downloads(&self, torrents: &[Torrent]) {
        for (download_id, worker) in self.registry.snapshot_downloads().await {
            if !worker.finished() {
                continue;
            }
            let Some((attempts, download)) = find_download(torrents, download_id) else {
                self.registry.remove_download(download_id).await;
                continue;
            };
            match self
                .promote_finished_download(attempts, download, worker.as_ref())
                .await
            {
                Ok(()) => self.registry.remove_download(download_id).await,
                Err(err) => warn!(
                    error = %err,
                    download_id = %download_id,
                    "failed to promote finished download; will retry next tick"
                ),
            }
        }
    }

    async fn promote_finished_download(
        &self,
        attempts: i32,
        download: &Download,
        worker: &dyn DownloadHandle,
    ) -> Result<()> {
        let now = Utc::now();
        if let Some(message) = worker.error() {
            self.apply_download_retry_policy(attempts, download, &message, now)
                .await
        } else {
            self.store.finish_download_stage(download.id, now).await?;
            debug!(download_id = %download.id, "download finished; unpack queued");
            Ok(())
        }
    }

    /// Reset-or-terminate a failed download per the parent's retry budget.
    async fn apply_download_retry_policy(
        &self,
        attempts: i32,
        download: &Download,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if download.retry_count < attempts {
            let retry_count = download.retry_count + 1;
            self.store.reset(download.id).await?;
            self.store.update_retry_count(download.id, retry_count).await?;
            info!(
                download_id = %download.id,
                retry_count,
                error = %message,
                "download failed; re-queued for retry"
            );
        } else {
            self.store.update_error(download.id, message).await?;
            self.store.update_completed(download.id, now).await?;
            info!(
                download_id = %download.id,
                error = %message,
                "download failed terminally; retry budget exhausted"
            );
        }
        Ok(())
    }

    /// Phase (c): promote unpack workers that reported completion. No retry
    /// policy applies to the unpack stage.
    async fn sweep_finished_unpacks(&self, torrents: &[Torrent]) {
        for (download_id, worker) in self.registry.snapshot_unpacks().await {
            if !worker.finished() {
                continue;
            }
            if find_download(torrents, download_id).is_none() {
                self.registry.remove_unpack(download_id).await;
                continue;
            }

            let now = Utc::now();
            let result = if let Some(message) = worker.error() {
                async {
                    self.store.update_error(download_id, &message).await?;
                    self.store.update_completed(download_id, now).await
                }
                .await
            } else {
                async {
                    self.store.update_unpacking_finished(download_id, now).await?;
                    self.store.update_completed(download_id, now).await
                }
                .await
            };

            match result {
                Ok(()) => self.registry.remove_unpack(download_id).await,
                Err(err) => warn!(
                    error = %err,
                    download_id = %download_id,
                    "failed to promote finished unpack; will retry next tick"
                ),
            }
        }
    }

    /// Phase (d): explicit retry markers.
    async fn process_retries(&self, torrents: &[Torrent], handled: &mut HashSet<Uuid>) {
        for torrent in torrents {
            if torrent.retry.is_none() {
                continue;
            }
            if torrent.retry_count > torrent.torrent_retry_attempts {
                // Budget exhausted: drop the marker, leave the counter as the
                // cap-reached signal.
                if let Err(err) = self
                    .gateway
                    .update_retry(torrent.id, None, torrent.retry_count)
                    .await
                {
                    warn!(error = %err, torrent_id = %torrent.id, "failed to clear retry marker");
                }
                continue;
            }
            match self
                .gateway
                .retry_torrent(torrent.id, torrent.retry_count)
                .await
            {
                Ok(()) => {
                    info!(torrent_id = %torrent.id, "torrent retry delegated");
                    handled.insert(torrent.id);
                }
                Err(err) => {
                    self.fail_torrent(torrent.id, format!("{err:#}")).await;
                    handled.insert(torrent.id);
                }
            }
        }
    }

    /// Phase (e): delete error-terminal torrents whose error TTL elapsed.
    async fn process_error_retention(&self, torrents: &[Torrent], handled: &mut HashSet<Uuid>) {
        let now = Utc::now();
        for torrent in torrents {
            if torrent.error.is_none() || torrent.delete_on_error <= 0 {
                continue;
            }
            let Some(completed) = torrent.completed else {
                continue;
            };
            if now < completed + ChronoDuration::minutes(torrent.delete_on_error) {
                continue;
            }
            match self.gateway.delete(torrent.id, true, true, true).await {
                Ok(()) => {
                    info!(torrent_id = %torrent.id, "error-terminal torrent deleted after TTL");
                    handled.insert(torrent.id);
                }
                Err(err) => {
                    warn!(error = %err, torrent_id = %torrent.id, "error-TTL delete failed");
                }
            }
        }
    }

    /// Phase (f): expire torrents that never produced downloads in time.
    async fn process_lifetime_expiry(&self, torrents: &[Torrent], handled: &mut HashSet<Uuid>) {
        let now = Utc::now();
        for torrent in torrents {
            if !torrent.downloads.is_empty()
                || torrent.completed.is_some()
                || torrent.lifetime <= 0
            {
                continue;
            }
            if now < torrent.added + ChronoDuration::minutes(torrent.lifetime) {
                continue;
            }

            let message = format!("Torrent lifetime of {} minutes reached", torrent.lifetime);
            info!(torrent_id = %torrent.id, lifetime = torrent.lifetime, "torrent lifetime reached");
            let outcome = async {
                self.gateway
                    .update_retry(torrent.id, None, torrent.torrent_retry_attempts)
                    .await?;
                self.gateway
                    .update_complete(torrent.id, Some(message), now, true)
                    .await
            }
            .await;
            if let Err(err) = outcome {
                warn!(error = %err, torrent_id = %torrent.id, "failed to record lifetime expiry");
            }
            handled.insert(torrent.id);
        }
    }

    /// Phase (g) for one torrent: provider-error check, file selection,
    /// download creation, work starts, and the aggregate completion check.
    async fn reconcile_torrent(
        &self,
        torrent: &mut Torrent,
        settings: &TickSettings,
    ) -> Result<()> {
        let now = Utc::now();

        if torrent.remote_status == RemoteStatus::Error {
            let message = torrent.remote_status_raw.clone();
            info!(torrent_id = %torrent.id, status = %message, "provider reported torrent error");
            self.gateway
                .update_complete(torrent.id, Some(message), now, true)
                .await?;
            return Ok(());
        }

        if matches!(
            torrent.remote_status,
            RemoteStatus::WaitingForFileSelection | RemoteStatus::Finished
        ) && torrent.files_selected.is_none()
            && torrent.downloads.is_empty()
        {
            self.gateway.select_files(torrent.id).await?;
            self.gateway.update_files_selected(torrent.id, now).await?;
            info!(torrent_id = %torrent.id, "files selected");
        }

        if torrent.remote_status == RemoteStatus::Finished
            && torrent.downloads.is_empty()
            && torrent.files_selected.is_some()
            && torrent.host_download_action == HostDownloadAction::DownloadAll
        {
            // Rows created here become visible to the starter on the next
            // tick's list read.
            self.gateway.create_downloads(torrent.id).await?;
        }

        self.start_downloads(torrent, settings).await?;
        self.start_unpacks(torrent, settings).await?;

        let tracks_completion = !torrent.downloads.is_empty()
            || (torrent.remote_status == RemoteStatus::Finished
                && torrent.host_download_action == HostDownloadAction::DownloadNone);
        if tracks_completion {
            let totals = torrent.totals();
            if let Some(pct) = totals.percent_complete() {
                debug!(torrent_id = %torrent.id, pct, "aggregate torrent progress");
            }
            if totals.complete_count == torrent.downloads.len() {
                self.gateway
                    .update_complete(torrent.id, None, now, true)
                    .await?;
                torrent.completed = Some(now);
                info!(torrent_id = %torrent.id, "torrent completed");

                if let Some((remove_remote, remove_client, remove_files)) =
                    torrent.finished_action.delete_flags()
                {
                    self.gateway
                        .delete(torrent.id, remove_remote, remove_client, remove_files)
                        .await?;
                }

                if let Err(err) = self.gateway.run_torrent_complete(torrent.id).await {
                    error!(
                        error = %err,
                        torrent_id = %torrent.id,
                        "post-completion hook failed"
                    );
                }
            }
        }
        Ok(())
    }

    /// Start download workers for the torrent's queued downloads, honoring
    /// the global cap and the mandatory inter-start delay.
    #[allow(clippy::too_many_lines)]
    async fn start_downloads(&self, torrent: &mut Torrent, settings: &TickSettings) -> Result<()> {
        let attempts = torrent.download_retry_attempts;
        let target_dir = target_directory(settings, torrent);
        let mut launched: Vec<(Uuid, tokio::task::JoinHandle<Result<Option<String>>>)> =
            Vec::new();

        for index in 0..torrent.downloads.len() {
            if !torrent.downloads[index].awaits_download_start() {
                continue;
            }
            if self.registry.download_count().await >= settings.download_limit {
                break;
            }
            let download_id = torrent.downloads[index].id;
            if self.registry.contains_download(download_id).await {
                warn!(
                    download_id = %download_id,
                    "queued download already registered; state desync suspected"
                );
                break;
            }

            if torrent.downloads[index].link.is_none() {
                match self.gateway.unrestrict_link(download_id).await {
                    Ok(link) => torrent.downloads[index].link = Some(link),
                    Err(err) => {
                        let now = Utc::now();
                        let message = format!("{err:#}");
                        self.store.update_error(download_id, &message).await?;
                        self.store.update_completed(download_id, now).await?;
                        let download = &mut torrent.downloads[index];
                        download.error = Some(message);
                        download.completed = Some(now);
                        break;
                    }
                }
            }

            let now = Utc::now();
            self.store
                .update_download_started(download_id, Some(now))
                .await?;
            torrent.downloads[index].started = Some(now);

            let snapshot = torrent.downloads[index].clone();
            let worker = self
                .factory
                .download_handle(&snapshot, torrent, &target_dir)
                .await?;
            self.registry
                .insert_download(download_id, Arc::clone(&worker))
                .await;
            debug!(download_id = %download_id, "download worker dispatched");
            let task = tokio::spawn(async move { worker.start().await });
            launched.push((download_id, task));

            tokio::time::sleep(START_DELAY).await;
        }

        if launched.is_empty() {
            return Ok(());
        }

        let mut remote_ids = HashMap::new();
        let mut start_errors = HashMap::new();
        for (download_id, task) in launched {
            match task.await {
                Ok(Ok(Some(remote_id))) => {
                    remote_ids.insert(download_id, remote_id);
                }
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    start_errors.insert(download_id, format!("{err:#}"));
                }
                Err(join_error) => {
                    start_errors.insert(download_id, format!("worker task failed: {join_error}"));
                }
            }
        }

        if !remote_ids.is_empty() {
            self.store.update_remote_id_batch(&remote_ids).await?;
            for (download_id, remote_id) in &remote_ids {
                if let Some(download) = torrent
                    .downloads
                    .iter_mut()
                    .find(|download| download.id == *download_id)
                {
                    download.remote_id = Some(remote_id.clone());
                }
            }
        }
        if !start_errors.is_empty() {
            self.store.update_error_batch(&start_errors).await?;
            for (download_id, message) in &start_errors {
                self.registry.remove_download(*download_id).await;
                // A dispatch failure counts against the same retry budget as
                // a worker failure.
                if let Some(download) = torrent
                    .downloads
                    .iter()
                    .find(|download| download.id == *download_id)
                {
                    self.apply_download_retry_policy(attempts, download, message, Utc::now())
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Start unpack workers for the torrent's unpack-queued downloads.
    ///
    /// A full unpack pool skips to the next candidate instead of breaking;
    /// this intentionally differs from the download path above.
    async fn start_unpacks(&self, torrent: &mut Torrent, settings: &TickSettings) -> Result<()> {
        let target_dir = target_directory(settings, torrent);

        for index in 0..torrent.downloads.len() {
            if !torrent.downloads[index].awaits_unpack_start() {
                continue;
            }
            let download_id = torrent.downloads[index].id;
            let now = Utc::now();

            // The three record paths below write the store only; the rows
            // surface through the next tick's list read.
            let Some(link) = torrent.downloads[index].link.clone() else {
                self.store.update_error(download_id, MISSING_LINK_ERROR).await?;
                self.store.update_completed(download_id, now).await?;
                continue;
            };

            if !is_archive_link(&link) {
                self.store.skip_unpacking(download_id, now).await?;
                continue;
            }

            if settings.client_kind.is_symlink() {
                self.store
                    .update_error(download_id, SYMLINK_UNPACK_ERROR)
                    .await?;
                self.store.update_completed(download_id, now).await?;
                continue;
            }

            if self.registry.unpack_count().await >= settings.unpack_limit {
                continue;
            }
            if self.registry.contains_unpack(download_id).await {
                continue;
            }

            self.store
                .update_unpacking_started(download_id, Some(now))
                .await?;
            torrent.downloads[index].unpacking_started = Some(now);

            let snapshot = torrent.downloads[index].clone();
            let worker = self.factory.unpack_handle(&snapshot, &target_dir).await?;
            self.registry
                .insert_unpack(download_id, Arc::clone(&worker))
                .await;
            debug!(download_id = %download_id, "unpack worker dispatched");
            if let Err(err) = worker.start().await {
                let message = format!("{err:#}");
                self.registry.remove_unpack(download_id).await;
                self.store.update_error(download_id, &message).await?;
                self.store.update_completed(download_id, Utc::now()).await?;
            }
        }
        Ok(())
    }

    /// Overlay live worker progress onto the loaded rows.
    async fn merge_live_progress(&self, torrent: &mut Torrent) {
        for download in &mut torrent.downloads {
            if let Some(worker) = self.registry.download(download.id).await {
                let total = worker.bytes_total();
                if total > 0 {
                    download.bytes_total = total;
                }
                download.bytes_done = worker.bytes_done().max(download.bytes_done);
            }
        }
    }

    /// Contain a failed torrent step: record it as a terminal torrent error
    /// and move on.
    ///
    /// Always terminal: a completed torrent is never worked on again, so no
    /// automatic retry may be armed here. Re-submission happens only through
    /// an explicitly set retry marker.
    async fn fail_torrent(&self, torrent_id: Uuid, message: String) {
        warn!(error = %message, torrent_id = %torrent_id, "torrent step failed; completing with error");
        if let Err(err) = self
            .gateway
            .update_complete(torrent_id, Some(message), Utc::now(), true)
            .await
        {
            error!(error = %err, torrent_id = %torrent_id, "failed to record torrent failure");
        }
    }
}

/// Validate the configuration at tick entry; `None` makes the tick a no-op.
fn tick_settings(config: &AppConfig) -> Option<TickSettings> {
    if config.provider.api_key.is_empty() {
        debug!("provider API key not configured; skipping tick");
        return None;
    }

    let client_kind = config.download_client.kind;
    if client_kind.is_symlink() {
        let mounted = config
            .download_client
            .mount_path
            .as_deref()
            .is_some_and(|path| Path::new(path).exists());
        if !mounted {
            debug!("symlink mount path unavailable; skipping tick");
            return None;
        }
    }

    let download_limit = validate::clamp_worker_limit(config.general.download_limit);
    let unpack_limit = validate::clamp_worker_limit(config.general.unpack_limit);

    if config.download_client.download_path.is_empty() {
        error!("download path is not configured; skipping tick");
        return None;
    }

    Some(TickSettings {
        download_limit,
        unpack_limit,
        download_path: PathBuf::from(&config.download_client.download_path),
        client_kind,
    })
}

fn target_directory(settings: &TickSettings, torrent: &Torrent) -> PathBuf {
    let mut dir = settings.download_path.clone();
    if let Some(category) = torrent.category.as_deref().filter(|category| !category.is_empty()) {
        dir.push(category);
    }
    dir
}

fn find_download(torrents: &[Torrent], download_id: Uuid) -> Option<(i32, &Download)> {
    for torrent in torrents {
        if let Some(download) = torrent
            .downloads
            .iter()
            .find(|download| download.id == download_id)
        {
            return Some((torrent.download_retry_attempts, download));
        }
    }
    None
}

/// Whether the link's URL-decoded filename carries an archive extension.
fn is_archive_link(link: &str) -> bool {
    matches!(archive_extension(link).as_deref(), Some("rar" | "zip"))
}

fn archive_extension(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    Path::new(decoded.as_ref())
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_config::GeneralConfig;

    fn sample_config() -> AppConfig {
        AppConfig::default()
    }

    #[test]
    fn archive_extensions_are_decoded_and_lowercased() {
        assert!(is_archive_link("https://host/dl/Pack%2Evol1.RAR"));
        assert!(is_archive_link("https://host/dl/bundle.zip"));
        assert!(!is_archive_link("https://host/dl/movie.mkv"));
        assert!(!is_archive_link("https://host/dl/"));
        assert!(!is_archive_link("not a url"));
    }

    #[test]
    fn settings_require_api_key_and_download_path() {
        let mut config = sample_config();
        assert!(tick_settings(&config).is_none(), "empty api key is a no-op");

        config.provider.api_key = "key".to_string();
        assert!(
            tick_settings(&config).is_none(),
            "empty download path is a no-op"
        );

        config.download_client.download_path = "/downloads".to_string();
        let settings = tick_settings(&config).expect("valid settings");
        assert_eq!(settings.download_path, PathBuf::from("/downloads"));
    }

    #[test]
    fn settings_clamp_worker_limits() {
        let mut config = sample_config();
        config.provider.api_key = "key".to_string();
        config.download_client.download_path = "/downloads".to_string();
        config.general = GeneralConfig {
            download_limit: -5,
            unpack_limit: 0,
            ..GeneralConfig::default()
        };
        let settings = tick_settings(&config).expect("valid settings");
        assert_eq!(settings.download_limit, 1);
        assert_eq!(settings.unpack_limit, 1);
    }

    #[test]
    fn symlink_requires_existing_mount() {
        let mut config = sample_config();
        config.provider.api_key = "key".to_string();
        config.download_client.download_path = "/downloads".to_string();
        config.download_client.kind = DownloadClientKind::Symlink;

        config.download_client.mount_path = None;
        assert!(tick_settings(&config).is_none(), "missing mount is a no-op");

        config.download_client.mount_path = Some("/definitely/not/mounted".to_string());
        assert!(tick_settings(&config).is_none(), "absent mount is a no-op");

        let dir = tempfile::tempdir().expect("tempdir");
        config.download_client.mount_path =
            Some(dir.path().to_string_lossy().into_owned());
        assert!(tick_settings(&config).is_some(), "existing mount passes");
    }

    #[test]
    fn category_is_appended_only_when_non_empty() {
        let settings = TickSettings {
            download_limit: 1,
            unpack_limit: 1,
            download_path: PathBuf::from("/downloads"),
            client_kind: DownloadClientKind::Internal,
        };
        let mut torrent = Torrent {
            id: Uuid::from_u128(1),
            hash: "deadbeef".to_string(),
            name: "demo".to_string(),
            category: Some("movies".to_string()),
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
            finished_action: strand_core::FinishedAction::None,
            host_download_action: HostDownloadAction::DownloadAll,
            downloads: Vec::new(),
        };

        assert_eq!(
            target_directory(&settings, &torrent),
            PathBuf::from("/downloads/movies")
        );
        torrent.category = Some(String::new());
        assert_eq!(
            target_directory(&settings, &torrent),
            PathBuf::from("/downloads")
        );
        torrent.category = None;
        assert_eq!(
            target_directory(&settings, &torrent),
            PathBuf::from("/downloads")
        );
    }
}
