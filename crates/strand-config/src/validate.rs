//! Validation and normalization applied after loading.
//!
//! An incomplete configuration is not an error here: the tick-level guards
//! decide what a missing API key or download path means. Validation rejects
//! only values that can never become meaningful.

use tracing::warn;
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Clamp a configured worker limit to the minimum of one slot.
#[must_use]
pub fn clamp_worker_limit(limit: i32) -> usize {
    usize::try_from(limit.max(1)).unwrap_or(1)
}

/// Normalize a loaded configuration in place and reject malformed values.
///
/// # Errors
///
/// Returns an error if the tick interval is zero or any configured URL does
/// not parse.
pub fn validate(config: &mut AppConfig) -> ConfigResult<()> {
    config.provider.api_key = config.provider.api_key.trim().to_string();
    config.download_client.download_path =
        config.download_client.download_path.trim().to_string();

    if config.general.tick_interval_secs == 0 {
        return Err(ConfigError::InvalidField {
            section: "general",
            field: "tick_interval_secs",
            value: Some("0".to_string()),
            reason: "tick interval must be at least one second",
        });
    }

    parse_url("provider", "api_url", &config.provider.api_url)?;
    if let Some(aria2c_url) = config.download_client.aria2c_url.as_deref() {
        parse_url("download_client", "aria2c_url", aria2c_url)?;
    }

    if config.provider.api_key.is_empty() {
        warn!("provider API key is empty; the engine will idle until one is configured");
    }
    if config.download_client.download_path.is_empty() {
        warn!("download path is empty; the engine will idle until one is configured");
    }
    if config.download_client.kind.is_symlink() && config.download_client.mount_path.is_none() {
        warn!("symlink backend configured without a mount path; ticks will be skipped");
    }

    Ok(())
}

fn parse_url(section: &'static str, field: &'static str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|_| ConfigError::InvalidField {
        section,
        field,
        value: Some(value.to_string()),
        reason: "value is not a valid URL",
    })
}
