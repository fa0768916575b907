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

//! Binary entrypoint that wires the Strand services together and drives the
//! reconciliation loop.

/// Application bootstrap wiring.
pub mod bootstrap;
/// Command-line surface.
pub mod cli;
/// Application-level error type.
pub mod error;
/// Event-bus progress reporter.
pub mod reporter;

use anyhow::Result;

/// Bootstraps the Strand engine and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::run_app().await?;
    Ok(())
}
