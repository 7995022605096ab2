//! Filesystem maintenance for the media tree after a cleanup run.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod prune;

pub use error::{FsOpsError, FsOpsResult};
pub use prune::prune_empty_dirs;
