//! aria2c JSON-RPC client and the download worker delegating to it.
//!
//! # Design
//! - One HTTP endpoint, token-authenticated per call; `tell_all` aggregates
//!   the active, waiting, and stopped views so the tick loop issues a single
//!   bulk query per backend instead of one `tellStatus` per transfer.
//! - The worker itself holds no connection: `start` hands the URI to the
//!   daemon and every later observation arrives through bulk status updates.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use strand_core::{BulkStatusClient, RemoteTaskStatus};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};
use crate::state::WorkerState;

const RPC_ID: &str = "strand";

/// Transfer states the daemon reports as finished.
const STATUS_COMPLETE: &str = "complete";
const STATUS_ERROR: &str = "error";
const STATUS_REMOVED: &str = "removed";

/// JSON-RPC client for an aria2c daemon.
#[derive(Clone)]
pub struct Aria2Client {
    http: Client,
    endpoint: String,
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcFailure>,
}

#[derive(Debug, Deserialize)]
struct RpcFailure {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Aria2Task {
    gid: String,
    status: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    error_message: Option<String>,
}

impl Aria2Client {
    /// Build a client for the daemon's JSON-RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: String, secret: Option<String>, timeout: Duration) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| WorkerError::Rpc {
                method: "client.build",
                detail: source.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint,
            secret,
        })
    }

    /// Hand a URI to the daemon. Returns the assigned gid.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the daemon rejects the URI.
    pub async fn add_uri(&self, uri: &str, dir: &str, out: &str) -> WorkerResult<String> {
        let params = self.with_token(vec![
            json!([uri]),
            json!({"dir": dir, "out": out}),
        ]);
        self.call::<String>("aria2.addUri", params).await
    }

    async fn tell_view(&self, method: &'static str, params: Vec<Value>) -> WorkerResult<Vec<Aria2Task>> {
        self.call::<Vec<Aria2Task>>(method, self.with_token(params))
            .await
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<Value>,
    ) -> WorkerResult<T> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": RPC_ID,
            "method": method,
            "params": params,
        });
        let envelope: RpcEnvelope<T> = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| WorkerError::Rpc {
                method,
                detail: source.to_string(),
            })?
            .json()
            .await
            .map_err(|source| WorkerError::Rpc {
                method,
                detail: source.to_string(),
            })?;

        if let Some(failure) = envelope.error {
            return Err(WorkerError::Rpc {
                method,
                detail: failure.message,
            });
        }
        envelope.result.ok_or(WorkerError::Rpc {
            method,
            detail: "response carried neither result nor error".to_string(),
        })
    }

    fn with_token(&self, mut params: Vec<Value>) -> Vec<Value> {
        if let Some(secret) = &self.secret {
            params.insert(0, json!(format!("token:{secret}")));
        }
        params
    }
}

#[async_trait]
impl BulkStatusClient for Aria2Client {
    async fn tell_all(&self) -> anyhow::Result<Vec<RemoteTaskStatus>> {
        let mut tasks = self.tell_view("aria2.tellActive", vec![]).await?;
        tasks.extend(
            self.tell_view("aria2.tellWaiting", vec![json!(0), json!(1_000)])
                .await?,
        );
        tasks.extend(
            self.tell_view("aria2.tellStopped", vec![json!(0), json!(1_000)])
                .await?,
        );
        Ok(tasks.into_iter().map(task_to_status).collect())
    }
}

fn task_to_status(task: Aria2Task) -> RemoteTaskStatus {
    RemoteTaskStatus {
        remote_id: task.gid,
        status: task.status,
        bytes_done: task.completed_length.parse().unwrap_or_default(),
        bytes_total: task.total_length.parse().unwrap_or_default(),
        error: task.error_message.filter(|message| !message.is_empty()),
    }
}

/// One transfer delegated to the aria2c daemon.
pub struct Aria2Worker {
    client: Aria2Client,
    link: String,
    dir: PathBuf,
    out: String,
    gid: Mutex<Option<String>>,
    state: Arc<WorkerState>,
}

impl Aria2Worker {
    /// Build a worker over an already-unrestricted link.
    #[must_use]
    pub fn new(
        client: Aria2Client,
        link: String,
        dir: PathBuf,
        out: String,
        expected_bytes: u64,
    ) -> Self {
        Self {
            client,
            link,
            dir,
            out,
            gid: Mutex::new(None),
            state: Arc::new(WorkerState::with_expected_bytes(expected_bytes)),
        }
    }

    pub(crate) fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Hand the URI to the daemon and remember the assigned gid.
    pub(crate) async fn start(&self) -> WorkerResult<String> {
        let gid = self
            .client
            .add_uri(&self.link, &self.dir.to_string_lossy(), &self.out)
            .await?;
        {
            let mut guard = self.lock_gid();
            *guard = Some(gid.clone());
        }
        debug!(gid = %gid, "transfer handed to aria2c");
        Ok(gid)
    }

    /// Fold a bulk status result into the worker's observable state.
    pub(crate) fn apply_bulk_status(&self, statuses: &[RemoteTaskStatus]) {
        let Some(gid) = self.lock_gid().clone() else {
            return;
        };
        let Some(task) = statuses.iter().find(|status| status.remote_id == gid) else {
            return;
        };

        if task.bytes_total > 0 {
            self.state.set_bytes_total(task.bytes_total);
        }
        self.state.set_bytes_done(task.bytes_done);

        match task.status.as_str() {
            STATUS_COMPLETE => self.state.complete(None),
            STATUS_ERROR => self.state.complete(Some(
                task.error
                    .clone()
                    .unwrap_or_else(|| "aria2c reported an unspecified failure".to_string()),
            )),
            STATUS_REMOVED => self
                .state
                .complete(Some("transfer was removed from aria2c".to_string())),
            _ => {}
        }
    }

    fn lock_gid(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        match self.gid.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> Aria2Client {
        Aria2Client::new(
            format!("{}/jsonrpc", server.base_url()),
            Some("s3cret".to_string()),
            Duration::from_secs(2),
        )
        .expect("client builds")
    }

    #[tokio::test]
    async fn add_uri_returns_gid_and_sends_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/jsonrpc")
                    .body_includes("aria2.addUri")
                    .body_includes("token:s3cret");
                then.status(200)
                    .json_body(serde_json::json!({"jsonrpc": "2.0", "id": "strand", "result": "gid-1"}));
            })
            .await;

        let client = client_for(&server);
        let gid = client
            .add_uri("https://example.com/file.bin", "/downloads", "file.bin")
            .await
            .expect("add uri");
        mock.assert_async().await;
        assert_eq!(gid, "gid-1");
    }

    #[tokio::test]
    async fn tell_all_aggregates_views() {
        let server = MockServer::start_async().await;
        for (method, gid, status) in [
            ("aria2.tellActive", "gid-a", "active"),
            ("aria2.tellWaiting", "gid-w", "waiting"),
            ("aria2.tellStopped", "gid-s", "complete"),
        ] {
            server
                .mock_async(move |when, then| {
                    when.method(POST).path("/jsonrpc").body_includes(method);
                    then.status(200).json_body(serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": "strand",
                        "result": [{
                            "gid": gid,
                            "status": status,
                            "completedLength": "10",
                            "totalLength": "100"
                        }]
                    }));
                })
                .await;
        }

        let client = client_for(&server);
        let statuses = client.tell_all().await.expect("tell all");
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0].remote_id, "gid-a");
        assert_eq!(statuses[2].status, "complete");
        assert_eq!(statuses[2].bytes_done, 10);
        assert_eq!(statuses[2].bytes_total, 100);
    }

    #[tokio::test]
    async fn rpc_failures_surface_daemon_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/jsonrpc");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": "strand",
                    "error": {"code": 1, "message": "Unauthorized"}
                }));
            })
            .await;

        let client = client_for(&server);
        let error = client
            .add_uri("https://example.com/file.bin", "/downloads", "file.bin")
            .await
            .expect_err("rpc error");
        assert!(error.to_string().contains("Unauthorized"), "{error}");
    }

    #[tokio::test]
    async fn bulk_status_drives_worker_completion() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/jsonrpc").body_includes("aria2.addUri");
                then.status(200)
                    .json_body(serde_json::json!({"jsonrpc": "2.0", "id": "strand", "result": "gid-9"}));
            })
            .await;

        let client = client_for(&server);
        let worker = Aria2Worker::new(
            client,
            "https://example.com/file.bin".to_string(),
            PathBuf::from("/downloads"),
            "file.bin".to_string(),
            0,
        );
        let gid = worker.start().await.expect("start");
        assert_eq!(gid, "gid-9");
        assert!(!worker.state().finished());

        worker.apply_bulk_status(&[RemoteTaskStatus {
            remote_id: "gid-9".to_string(),
            status: "active".to_string(),
            bytes_done: 50,
            bytes_total: 100,
            error: None,
        }]);
        assert!(!worker.state().finished());
        assert_eq!(worker.state().bytes_done(), 50);

        worker.apply_bulk_status(&[RemoteTaskStatus {
            remote_id: "gid-9".to_string(),
            status: "complete".to_string(),
            bytes_done: 100,
            bytes_total: 100,
            error: None,
        }]);
        assert!(worker.state().finished());
        assert!(worker.state().error().is_none());
    }

    #[tokio::test]
    async fn error_status_records_daemon_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/jsonrpc");
                then.status(200)
                    .json_body(serde_json::json!({"jsonrpc": "2.0", "id": "strand", "result": "gid-2"}));
            })
            .await;

        let client = client_for(&server);
        let worker = Aria2Worker::new(
            client,
            "https://example.com/file.bin".to_string(),
            PathBuf::from("/downloads"),
            "file.bin".to_string(),
            0,
        );
        worker.start().await.expect("start");

        worker.apply_bulk_status(&[RemoteTaskStatus {
            remote_id: "gid-2".to_string(),
            status: "error".to_string(),
            bytes_done: 0,
            bytes_total: 0,
            error: Some("disk full".to_string()),
        }]);
        assert!(worker.state().finished());
        assert_eq!(worker.state().error().as_deref(), Some("disk full"));
    }
}
