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

//! Real-Debrid provider client and the `TorrentGateway` facade composing it
//! with the Postgres store.

mod client;
mod error;
mod gateway;

pub use client::{
    AddedMagnet, ProviderFile, ProviderTorrent, ProviderTorrentInfo, RealDebridClient,
    UnrestrictedLink,
};
pub use error::{DebridError, DebridResult};
pub use gateway::{AddTorrentRequest, DebridTorrentGateway};
