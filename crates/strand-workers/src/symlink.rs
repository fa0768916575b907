//! Symlink download worker for rclone-mounted remote filesystems.
//!
//! No bytes are transferred: the worker materialises a symlink from the
//! download root into the mount, so completion is immediate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{WorkerError, WorkerResult};
use crate::state::WorkerState;

/// One symlink materialisation into an already-mounted remote filesystem.
pub struct SymlinkWorker {
    source: PathBuf,
    target: PathBuf,
    state: Arc<WorkerState>,
}

impl SymlinkWorker {
    /// Build a worker linking `target` to `source` inside the mount.
    #[must_use]
    pub fn new(source: PathBuf, target: PathBuf, expected_bytes: u64) -> Self {
        Self {
            source,
            target,
            state: Arc::new(WorkerState::with_expected_bytes(expected_bytes)),
        }
    }

    pub(crate) fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Create the symlink. Completion is recorded before returning.
    pub(crate) async fn start(&self) {
        match self.materialise().await {
            Ok(()) => {
                debug!(target = %self.target.display(), "symlink materialised");
                self.state.set_bytes_done(self.state.bytes_total());
                self.state.complete(None);
            }
            Err(err) => self.state.complete(Some(err.to_string())),
        }
    }

    async fn materialise(&self) -> WorkerResult<()> {
        if !tokio::fs::try_exists(&self.source)
            .await
            .map_err(|source| WorkerError::io(self.source.clone(), source))?
        {
            return Err(WorkerError::Io {
                path: self.source.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "mounted source file does not exist",
                ),
            });
        }

        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WorkerError::io(parent, source))?;
        }

        match tokio::fs::remove_file(&self.target).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(WorkerError::io(self.target.clone(), err)),
        }

        create_symlink(&self.source, &self.target).await
    }
}

#[cfg(unix)]
async fn create_symlink(source: &Path, target: &Path) -> WorkerResult<()> {
    tokio::fs::symlink(source, target)
        .await
        .map_err(|err| WorkerError::io(target, err))
}

#[cfg(not(unix))]
async fn create_symlink(_source: &Path, target: &Path) -> WorkerResult<()> {
    Err(WorkerError::Io {
        path: target.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "symlink backend requires a unix platform",
        ),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_links_target_into_mount() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mount = dir.path().join("mount");
        std::fs::create_dir_all(mount.join("Demo")).expect("mount dirs");
        std::fs::write(mount.join("Demo/movie.mkv"), b"payload").expect("source file");
        let target = dir.path().join("downloads/Demo/movie.mkv");

        let worker = SymlinkWorker::new(mount.join("Demo/movie.mkv"), target.clone(), 7);
        worker.start().await;

        assert!(worker.state().finished());
        assert!(worker.state().error().is_none());
        assert_eq!(worker.state().bytes_done(), 7);
        let linked = std::fs::read(&target).expect("target readable through link");
        assert_eq!(linked, b"payload");
        assert!(
            std::fs::symlink_metadata(&target)
                .expect("metadata")
                .file_type()
                .is_symlink()
        );
    }

    #[tokio::test]
    async fn missing_source_records_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let worker = SymlinkWorker::new(
            dir.path().join("mount/absent.mkv"),
            dir.path().join("downloads/absent.mkv"),
            0,
        );
        worker.start().await;

        assert!(worker.state().finished());
        let error = worker.state().error().expect("error recorded");
        assert!(error.contains("does not exist"), "{error}");
    }
}
