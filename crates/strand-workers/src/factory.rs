//! Worker construction for the configured download backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use strand_core::{
    Download, DownloadClientKind, DownloadHandle, RemoteTaskStatus, Torrent, UnpackHandle,
    WorkerFactory,
};

use crate::aria2::{Aria2Client, Aria2Worker};
use crate::error::{WorkerError, WorkerResult};
use crate::http::HttpWorker;
use crate::symlink::SymlinkWorker;
use crate::unpack::ZipUnpackWorker;

/// Download worker over one of the supported backends.
pub enum DownloadWorker {
    /// Built-in streaming HTTP transfer.
    Http(HttpWorker),
    /// Transfer delegated to an aria2c daemon.
    Aria2(Aria2Worker),
    /// Symlink into an rclone mount.
    Symlink(SymlinkWorker),
}

impl DownloadWorker {
    fn state(&self) -> &crate::state::WorkerState {
        match self {
            Self::Http(worker) => worker.state(),
            Self::Aria2(worker) => worker.state(),
            Self::Symlink(worker) => worker.state(),
        }
    }
}

#[async_trait]
impl DownloadHandle for DownloadWorker {
    fn kind(&self) -> DownloadClientKind {
        match self {
            Self::Http(_) => DownloadClientKind::Internal,
            Self::Aria2(_) => DownloadClientKind::Aria2c,
            Self::Symlink(_) => DownloadClientKind::Symlink,
        }
    }

    fn finished(&self) -> bool {
        self.state().finished()
    }

    fn error(&self) -> Option<String> {
        self.state().error()
    }

    fn bytes_total(&self) -> u64 {
        self.state().bytes_total()
    }

    fn bytes_done(&self) -> u64 {
        self.state().bytes_done()
    }

    async fn start(&self) -> anyhow::Result<Option<String>> {
        match self {
            Self::Http(worker) => {
                worker.start();
                Ok(None)
            }
            Self::Aria2(worker) => Ok(Some(worker.start().await?)),
            Self::Symlink(worker) => {
                worker.start().await;
                Ok(None)
            }
        }
    }

    fn supports_bulk_status(&self) -> bool {
        matches!(self, Self::Aria2(_))
    }

    fn apply_bulk_status(&self, statuses: &[RemoteTaskStatus]) {
        if let Self::Aria2(worker) = self {
            worker.apply_bulk_status(statuses);
        }
    }
}

#[async_trait]
impl UnpackHandle for ZipUnpackWorker {
    fn finished(&self) -> bool {
        self.state().finished()
    }

    fn error(&self) -> Option<String> {
        self.state().error()
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.dispatch();
        Ok(())
    }
}

/// Factory producing workers for the configured backend.
pub struct StrandWorkerFactory {
    kind: DownloadClientKind,
    http: Client,
    aria2: Option<Aria2Client>,
    mount_path: Option<PathBuf>,
}

impl StrandWorkerFactory {
    /// Build a factory for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared HTTP client cannot be constructed.
    pub fn new(
        kind: DownloadClientKind,
        aria2: Option<Aria2Client>,
        mount_path: Option<PathBuf>,
    ) -> WorkerResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| WorkerError::Http {
                operation: "client.build",
                detail: source.to_string(),
            })?;
        Ok(Self {
            kind,
            http,
            aria2,
            mount_path,
        })
    }

    fn target_path(target_dir: &Path, download: &Download) -> PathBuf {
        target_dir.join(download.path.trim_start_matches('/'))
    }
}

#[async_trait]
impl WorkerFactory for StrandWorkerFactory {
    fn client_kind(&self) -> DownloadClientKind {
        self.kind
    }

    async fn download_handle(
        &self,
        download: &Download,
        _torrent: &Torrent,
        target_dir: &Path,
    ) -> anyhow::Result<Arc<dyn DownloadHandle>> {
        let link = download.link.clone().ok_or(WorkerError::MissingLink)?;
        let target = Self::target_path(target_dir, download);

        let worker = match self.kind {
            DownloadClientKind::Internal => DownloadWorker::Http(HttpWorker::new(
                self.http.clone(),
                link,
                target,
                download.bytes_total,
            )),
            DownloadClientKind::Aria2c => {
                let client = self.aria2.clone().ok_or(WorkerError::BackendUnavailable {
                    reason: "aria2c endpoint is not configured",
                })?;
                let dir = target
                    .parent()
                    .map_or_else(|| target_dir.to_path_buf(), Path::to_path_buf);
                let out = target
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or(WorkerError::BackendUnavailable {
                        reason: "download path carries no file name",
                    })?;
                DownloadWorker::Aria2(Aria2Worker::new(
                    client,
                    link,
                    dir,
                    out,
                    download.bytes_total,
                ))
            }
            DownloadClientKind::Symlink => {
                let mount = self
                    .mount_path
                    .clone()
                    .ok_or(WorkerError::BackendUnavailable {
                        reason: "mount path is not configured",
                    })?;
                let source = mount.join(download.path.trim_start_matches('/'));
                DownloadWorker::Symlink(SymlinkWorker::new(source, target, download.bytes_total))
            }
        };
        Ok(Arc::new(worker))
    }

    async fn unpack_handle(
        &self,
        download: &Download,
        target_dir: &Path,
    ) -> anyhow::Result<Arc<dyn UnpackHandle>> {
        let archive = Self::target_path(target_dir, download);
        let target = archive
            .parent()
            .map_or_else(|| target_dir.to_path_buf(), Path::to_path_buf);
        Ok(Arc::new(ZipUnpackWorker::new(archive, target)))
    }
}
