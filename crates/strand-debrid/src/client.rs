//! Typed HTTP client for the Real-Debrid REST API.
//!
//! # Design
//! - One `reqwest::Client` with bearer auth and a total per-request timeout;
//!   every call site carries an operation label for error reporting.
//! - Non-success responses are decoded into the provider's error body when
//!   possible so failures carry the provider's own detail string.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{DebridError, DebridResult};

/// Torrent submission acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct AddedMagnet {
    /// Provider-assigned torrent identifier.
    pub id: String,
    /// Provider-side URI for the submitted torrent.
    #[serde(default)]
    pub uri: String,
}

/// One torrent as reported by the provider's list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTorrent {
    /// Provider-assigned torrent identifier.
    pub id: String,
    /// Display filename of the torrent.
    #[serde(default)]
    pub filename: String,
    /// Info-hash, lowercase hex.
    #[serde(default)]
    pub hash: String,
    /// Total payload size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// Raw provider status string.
    pub status: String,
    /// Cloud fetch progress, 0-100.
    #[serde(default)]
    pub progress: f64,
}

/// Detailed torrent view including files and restricted links.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTorrentInfo {
    /// Provider-assigned torrent identifier.
    pub id: String,
    /// Display filename of the torrent.
    #[serde(default)]
    pub filename: String,
    /// Info-hash, lowercase hex.
    #[serde(default)]
    pub hash: String,
    /// Total payload size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// Raw provider status string.
    pub status: String,
    /// Cloud fetch progress, 0-100.
    #[serde(default)]
    pub progress: f64,
    /// Files contained in the torrent payload.
    #[serde(default)]
    pub files: Vec<ProviderFile>,
    /// Restricted links, aligned with the selected files in order.
    #[serde(default)]
    pub links: Vec<String>,
}

/// One file inside a provider torrent.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderFile {
    /// Provider-assigned file identifier.
    pub id: i64,
    /// Path of the file inside the torrent payload.
    pub path: String,
    /// File size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// Non-zero when the file is selected for cloud fetch.
    #[serde(default)]
    pub selected: i64,
}

/// Result of unrestricting a restricted share link.
#[derive(Debug, Clone, Deserialize)]
pub struct UnrestrictedLink {
    /// Direct download URL.
    pub download: String,
    /// Filename the provider serves the content as.
    #[serde(default)]
    pub filename: String,
    /// Content size in bytes.
    #[serde(default)]
    pub filesize: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

/// HTTP client for the Real-Debrid REST API.
#[derive(Clone)]
pub struct RealDebridClient {
    http: Client,
    base: String,
}

impl RealDebridClient {
    /// Build a client with bearer auth and a total per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the API key is not
    /// a valid header value.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> DebridResult<Self> {
        let base = Url::parse(api_url)
            .map_err(|_| DebridError::Build {
                reason: "provider API URL does not parse",
            })?
            .to_string();
        let base = base.trim_end_matches('/').to_string();
        let bearer =
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| DebridError::Build {
                reason: "provider API key contains invalid header characters",
            })?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|_| DebridError::Build {
                reason: "failed to construct HTTP client",
            })?;
        Ok(Self { http, base })
    }

    /// Submit a magnet link for cloud fetching.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn add_magnet(&self, magnet: &str) -> DebridResult<AddedMagnet> {
        let operation = "debrid.add_magnet";
        let response = self
            .http
            .post(self.endpoint("torrents/addMagnet"))
            .form(&[("magnet", magnet)])
            .send()
            .await
            .map_err(|source| DebridError::Http { operation, source })?;
        decode(operation, response).await
    }

    /// Fetch the provider-side torrent list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn list_torrents(&self) -> DebridResult<Vec<ProviderTorrent>> {
        let operation = "debrid.list_torrents";
        let response = self
            .http
            .get(self.endpoint("torrents"))
            .send()
            .await
            .map_err(|source| DebridError::Http { operation, source })?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        decode(operation, response).await
    }

    /// Fetch the detailed view of one torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn torrent_info(&self, remote_id: &str) -> DebridResult<ProviderTorrentInfo> {
        let operation = "debrid.torrent_info";
        let response = self
            .http
            .get(self.endpoint(&format!("torrents/info/{remote_id}")))
            .send()
            .await
            .map_err(|source| DebridError::Http { operation, source })?;
        decode(operation, response).await
    }

    /// Confirm the file selection for a torrent. `files` is the provider's
    /// comma-separated id list or the literal `all`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn select_files(&self, remote_id: &str, files: &str) -> DebridResult<()> {
        let operation = "debrid.select_files";
        let response = self
            .http
            .post(self.endpoint(&format!("torrents/selectFiles/{remote_id}")))
            .form(&[("files", files)])
            .send()
            .await
            .map_err(|source| DebridError::Http { operation, source })?;
        expect_success(operation, response).await
    }

    /// Convert a restricted share link into a direct download URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    pub async fn unrestrict_link(&self, link: &str) -> DebridResult<UnrestrictedLink> {
        let operation = "debrid.unrestrict_link";
        let response = self
            .http
            .post(self.endpoint("unrestrict/link"))
            .form(&[("link", link)])
            .send()
            .await
            .map_err(|source| DebridError::Http { operation, source })?;
        decode(operation, response).await
    }

    /// Delete a torrent on the provider side. A missing torrent is not an
    /// error: retention sweeps may race user-initiated deletes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it with
    /// anything other than not-found.
    pub async fn delete_torrent(&self, remote_id: &str) -> DebridResult<()> {
        let operation = "debrid.delete_torrent";
        let response = self
            .http
            .delete(self.endpoint(&format!("torrents/delete/{remote_id}")))
            .send()
            .await
            .map_err(|source| DebridError::Http { operation, source })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(operation, response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }
}

async fn expect_success(operation: &'static str, response: Response) -> DebridResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(api_error(operation, status, response).await)
}

async fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> DebridResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(operation, status, response).await);
    }
    response
        .json()
        .await
        .map_err(|source| DebridError::Decode { operation, source })
}

async fn api_error(operation: &'static str, status: StatusCode, response: Response) -> DebridError {
    let detail = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error);
    DebridError::Api {
        operation,
        status: status.as_u16(),
        detail,
    }
}
