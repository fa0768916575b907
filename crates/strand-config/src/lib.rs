#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Typed configuration for the Strand download manager: model, defaults,
//! validation, a JSON-file + environment loader, and the shared handle the
//! runner snapshots at the start of every tick.

use std::sync::Arc;

use tokio::sync::RwLock;

/// Default values applied to missing fields.
pub mod defaults;
mod error;
mod loader;
mod model;
/// Validation and normalization helpers.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ENV_API_KEY, ENV_DOWNLOAD_PATH, ENV_LOG_FILTER, apply_env_overrides, load_from_path,
};
pub use model::{
    AppConfig, DownloadClientConfig, GeneralConfig, ProviderConfig, TelemetryConfig,
};

/// Shared live configuration: the app replaces it on reload, the runner takes
/// a snapshot per tick so settings stay read-only inside a tick.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Wrap an already-validated configuration.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Clone the current configuration.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }

    /// Replace the current configuration.
    pub async fn replace(&self, config: AppConfig) {
        let mut guard = self.inner.write().await;
        *guard = config;
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
