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
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]

//! Command-line entrypoint for the cleanup service.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands.rs`: command handlers
//! - `bootstrap.rs`: configuration, telemetry, adapter wiring and post-run maintenance
//! - `output.rs`: renderers for reports, health and plans
//! - `shutdown.rs`: signal handling that cancels a run
//! - `main.rs`: thin entrypoint delegating to `run()`

mod bootstrap;
pub(crate) mod cli;
mod commands;
pub mod error;
mod output;
mod shutdown;

pub use cli::run;
pub use error::{AppError, AppResult};
