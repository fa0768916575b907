//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; IO and normalization live in `loader.rs` and
//!   `validate.rs`.
//! - Every field has a serde default so partially-written config files load;
//!   the tick-level guards decide what an incomplete configuration means.

use serde::{Deserialize, Serialize};
use strand_core::DownloadClientKind;

use crate::defaults;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Debrid provider settings.
    pub provider: ProviderConfig,
    /// Download backend settings.
    pub download_client: DownloadClientConfig,
    /// Engine-wide knobs.
    pub general: GeneralConfig,
    /// Logging output settings.
    pub telemetry: TelemetryConfig,
}

/// Debrid provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for the provider; the engine is idle while this is empty.
    pub api_key: String,
    /// Base URL of the provider REST API.
    pub api_url: String,
    /// Total per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: defaults::PROVIDER_API_URL.to_string(),
            timeout_secs: defaults::PROVIDER_TIMEOUT_SECS,
        }
    }
}

/// Download backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DownloadClientConfig {
    /// Which backend fetches restricted links to local storage.
    pub kind: DownloadClientKind,
    /// Root directory for completed downloads; the engine is idle while this
    /// is empty.
    pub download_path: String,
    /// Mount point of the remote filesystem; required by the symlink backend.
    pub mount_path: Option<String>,
    /// JSON-RPC endpoint of the aria2c daemon.
    pub aria2c_url: Option<String>,
    /// RPC secret for the aria2c daemon.
    pub aria2c_secret: Option<String>,
}

/// Engine-wide knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Maximum concurrently running download workers; clamped to at least 1.
    pub download_limit: i32,
    /// Maximum concurrently running unpack workers; clamped to at least 1.
    pub unpack_limit: i32,
    /// Reconciliation cadence in seconds.
    pub tick_interval_secs: u64,
    /// Retry budget applied to newly submitted torrents.
    pub torrent_retry_attempts: i32,
    /// Retry budget applied to each child download of new torrents.
    pub download_retry_attempts: i32,
    /// Shell command executed after a torrent completes successfully.
    pub completed_command: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            download_limit: defaults::DOWNLOAD_LIMIT,
            unpack_limit: defaults::UNPACK_LIMIT,
            tick_interval_secs: defaults::TICK_INTERVAL_SECS,
            torrent_retry_attempts: defaults::TORRENT_RETRY_ATTEMPTS,
            download_retry_attempts: defaults::DOWNLOAD_RETRY_ATTEMPTS,
            completed_command: None,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive applied when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: defaults::LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: AppConfig = serde_json::from_str("{}").expect("empty document loads");
        assert!(config.provider.api_key.is_empty());
        assert_eq!(config.provider.api_url, defaults::PROVIDER_API_URL);
        assert_eq!(config.general.download_limit, defaults::DOWNLOAD_LIMIT);
        assert_eq!(config.download_client.kind, DownloadClientKind::Internal);
    }

    #[test]
    fn partial_section_keeps_sibling_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"general": {"download_limit": 7}}"#).expect("loads");
        assert_eq!(config.general.download_limit, 7);
        assert_eq!(config.general.unpack_limit, defaults::UNPACK_LIMIT);
        assert_eq!(
            config.general.tick_interval_secs,
            defaults::TICK_INTERVAL_SECS
        );
    }
}
