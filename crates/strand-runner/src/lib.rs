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

//! The Strand reconciliation core.
//!
//! `TorrentRunner::tick` is the engine's single entry point: a periodic pass
//! that reconciles remote debrid status, the in-memory worker registries,
//! and the persistent rows, moving every torrent one step toward completion
//! or terminal failure. All collaborators are reached through the
//! `strand-core` facades, so the whole engine runs against recording stubs
//! in tests.

mod registry;
mod runner;

pub use registry::ActiveRegistry;
pub use runner::TorrentRunner;
