//! Command-line surface of the `strand` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Real-Debrid-backed torrent download manager.
#[derive(Debug, Parser)]
#[command(name = "strand", version, about)]
pub struct Cli {
    /// Path to the JSON configuration document.
    #[arg(long, env = "STRAND_CONFIG", default_value = "strand.json")]
    pub config: PathBuf,

    /// One-shot command to run instead of the engine loop.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One-shot commands; without one the reconciliation engine runs.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a magnet link and exit.
    Add {
        /// Magnet URI to submit.
        magnet: String,
        /// Routing category appended to the download path.
        #[arg(long)]
        category: Option<String>,
    },
}
