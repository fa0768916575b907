//! Streaming HTTP download worker.
//!
//! # Design
//! - `start` dispatches the transfer onto its own task and returns
//!   immediately; the tick loop observes completion through the shared state.
//! - The response body is streamed chunk-wise through a buffered writer so
//!   large files never sit in memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};
use crate::state::WorkerState;

/// One streaming HTTP transfer to a local file.
pub struct HttpWorker {
    http: Client,
    link: String,
    target: PathBuf,
    state: Arc<WorkerState>,
}

impl HttpWorker {
    /// Build a worker over an already-unrestricted link.
    #[must_use]
    pub fn new(http: Client, link: String, target: PathBuf, expected_bytes: u64) -> Self {
        Self {
            http,
            link,
            target,
            state: Arc::new(WorkerState::with_expected_bytes(expected_bytes)),
        }
    }

    pub(crate) fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Dispatch the transfer onto its own task.
    pub(crate) fn start(&self) {
        let http = self.http.clone();
        let link = self.link.clone();
        let target = self.target.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = transfer(&http, &link, &target, &state).await;
            match result {
                Ok(()) => {
                    debug!(path = %target.display(), "http transfer finished");
                    state.complete(None);
                }
                Err(err) => state.complete(Some(err.to_string())),
            }
        });
    }
}

async fn transfer(
    http: &Client,
    link: &str,
    target: &Path,
    state: &WorkerState,
) -> WorkerResult<()> {
    let response = http
        .get(link)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|source| WorkerError::Http {
            operation: "get",
            detail: source.to_string(),
        })?;
    if let Some(length) = response.content_length() {
        state.set_bytes_total(length);
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| WorkerError::io(parent, source))?;
    }
    let file = File::create(target)
        .await
        .map_err(|source| WorkerError::io(target, source))?;
    let mut writer = BufWriter::new(file);

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| WorkerError::Http {
            operation: "stream",
            detail: source.to_string(),
        })?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|source| WorkerError::io(target, source))?;
        state.add_bytes_done(chunk.len() as u64);
    }
    writer
        .flush()
        .await
        .map_err(|source| WorkerError::io(target, source))?;
    Ok(())
}
