//! Default values applied to missing configuration fields.

/// Base URL of the Real-Debrid REST API.
pub const PROVIDER_API_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Total per-request timeout against provider and backend endpoints.
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Maximum concurrently running download workers.
pub const DOWNLOAD_LIMIT: i32 = 2;

/// Maximum concurrently running unpack workers.
pub const UNPACK_LIMIT: i32 = 1;

/// Reconciliation cadence in seconds.
pub const TICK_INTERVAL_SECS: u64 = 5;

/// Retry budget for newly submitted torrents.
pub const TORRENT_RETRY_ATTEMPTS: i32 = 2;

/// Retry budget for each child download of new torrents.
pub const DOWNLOAD_RETRY_ATTEMPTS: i32 = 3;

/// Filter directive applied when `RUST_LOG` is unset.
pub const LOG_FILTER: &str = "info";
