//! Zip unpack worker.
//!
//! # Design
//! - Extraction is synchronous `zip` work, so `start` moves it onto a
//!   blocking task and returns; the tick loop observes completion through
//!   the shared state.
//! - Archive entry paths are sanitised before joining so a crafted archive
//!   cannot escape the extraction target.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use zip::ZipArchive;

use crate::error::{WorkerError, WorkerResult};
use crate::state::WorkerState;

/// One archive extraction next to the downloaded file.
pub struct ZipUnpackWorker {
    archive: PathBuf,
    target: PathBuf,
    state: Arc<WorkerState>,
}

impl ZipUnpackWorker {
    /// Build a worker extracting `archive` into `target`.
    #[must_use]
    pub fn new(archive: PathBuf, target: PathBuf) -> Self {
        Self {
            archive,
            target,
            state: Arc::new(WorkerState::default()),
        }
    }

    pub(crate) fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Dispatch the extraction onto a blocking task.
    pub(crate) fn dispatch(&self) {
        let archive = self.archive.clone();
        let target = self.target.clone();
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            match extract_zip(&archive, &target) {
                Ok(()) => {
                    debug!(archive = %archive.display(), "archive extracted");
                    state.complete(None);
                }
                Err(err) => state.complete(Some(err.to_string())),
            }
        });
    }
}

fn extract_zip(archive_path: &Path, target: &Path) -> WorkerResult<()> {
    let file = File::open(archive_path)
        .map_err(|source| WorkerError::io(archive_path, source))?;
    let mut archive = ZipArchive::new(file).map_err(|source| WorkerError::Archive {
        path: archive_path.to_path_buf(),
        detail: source.to_string(),
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|source| WorkerError::Archive {
            path: archive_path.to_path_buf(),
            detail: source.to_string(),
        })?;
        let entry_path = sanitize_archive_path(archive_path, entry.name())?;
        let destination = target.join(entry_path);

        if entry.name().ends_with('/') {
            fs::create_dir_all(&destination)
                .map_err(|source| WorkerError::io(&destination, source))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| WorkerError::io(parent, source))?;
        }

        let mut output = File::create(&destination)
            .map_err(|source| WorkerError::io(&destination, source))?;
        io::copy(&mut entry, &mut output)
            .map_err(|source| WorkerError::io(&destination, source))?;
    }

    Ok(())
}

fn sanitize_archive_path(archive: &Path, entry: &str) -> WorkerResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(WorkerError::Archive {
            path: archive.to_path_buf(),
            detail: format!("entry '{entry}' uses an absolute path"),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(WorkerError::Archive {
                    path: archive.to_path_buf(),
                    detail: format!("entry '{entry}' escapes the extraction target"),
                });
            }
        }
    }
    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use zip::write::FileOptions;

    async fn wait_finished(state: &WorkerState) {
        timeout(Duration::from_secs(5), async {
            while !state.finished() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("worker should finish");
    }

    fn write_archive(path: &Path) {
        let file = File::create(path).expect("archive file");
        let mut writer = zip::ZipWriter::new(file);
        let options = FileOptions::default();
        writer.add_directory("Demo/", options).expect("dir entry");
        writer
            .start_file("Demo/readme.txt", options)
            .expect("file entry");
        writer.write_all(b"hello from the archive").expect("payload");
        writer.finish().expect("finish archive");
    }

    #[tokio::test]
    async fn extracts_entries_into_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("bundle.zip");
        write_archive(&archive);
        let target = dir.path().join("out");

        let worker = ZipUnpackWorker::new(archive, target.clone());
        worker.dispatch();
        wait_finished(worker.state()).await;

        assert!(worker.state().error().is_none());
        let extracted = std::fs::read(target.join("Demo/readme.txt")).expect("extracted file");
        assert_eq!(extracted, b"hello from the archive");
    }

    #[tokio::test]
    async fn corrupt_archive_records_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("bundle.zip");
        std::fs::write(&archive, b"this is not a zip").expect("bogus archive");

        let worker = ZipUnpackWorker::new(archive, dir.path().join("out"));
        worker.dispatch();
        wait_finished(worker.state()).await;

        assert!(worker.state().error().is_some());
    }

    #[test]
    fn sanitizer_rejects_traversal() {
        let archive = Path::new("bundle.zip");
        assert!(sanitize_archive_path(archive, "ok/file.txt").is_ok());
        assert!(sanitize_archive_path(archive, "../escape.txt").is_err());
        assert!(sanitize_archive_path(archive, "/absolute.txt").is_err());
    }
}
