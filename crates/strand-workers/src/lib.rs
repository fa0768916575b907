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

//! Download and unpack worker implementations for the Strand engine.
//!
//! Workers run on their own tasks and publish completion, error, and
//! progress through shared state; the tick loop observes them exclusively
//! through the `strand-core` handle traits.

mod aria2;
mod error;
mod factory;
mod http;
mod state;
mod symlink;
mod unpack;

pub use aria2::{Aria2Client, Aria2Worker};
pub use error::{WorkerError, WorkerResult};
pub use factory::{DownloadWorker, StrandWorkerFactory};
pub use http::HttpWorker;
pub use symlink::SymlinkWorker;
pub use unpack::ZipUnpackWorker;
