//! Configuration loading from a JSON document plus environment overrides.

use std::path::Path;

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;
use crate::validate;

/// Environment variable overriding the provider API key.
pub const ENV_API_KEY: &str = "STRAND_PROVIDER_API_KEY";
/// Environment variable overriding the download root.
pub const ENV_DOWNLOAD_PATH: &str = "STRAND_DOWNLOAD_PATH";
/// Environment variable overriding the log filter directive.
pub const ENV_LOG_FILTER: &str = "STRAND_LOG_FILTER";

/// Load, override, and validate a configuration document.
///
/// A missing file yields the defaults so a fresh install starts idle instead
/// of failing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// validation rejects a field.
pub async fn load_from_path(path: &Path) -> ConfigResult<AppConfig> {
    let mut config = if path.exists() {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        info!(path = %path.display(), "configuration file missing; starting from defaults");
        AppConfig::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate::validate(&mut config)?;
    Ok(config)
}

/// Apply environment overrides through an injectable lookup.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(api_key) = lookup(ENV_API_KEY) {
        config.provider.api_key = api_key;
    }
    if let Some(download_path) = lookup(ENV_DOWNLOAD_PATH) {
        config.download_client.download_path = download_path;
    }
    if let Some(filter) = lookup(ENV_LOG_FILTER) {
        config.telemetry.log_filter = filter;
    }
}
