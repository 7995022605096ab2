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

//! Retention engine: merges source inventories, evaluates retention policy,
//! applies the run-wide safety ceiling and executes approved deletions.
//!
//! Layout: `inventory.rs` (per-show merge), `evaluate.rs` (pure decision function),
//! `governor.rs` (run-wide gate), `executor.rs` (bounded, isolated deletes),
//! `coordinator.rs` (two-phase run and health probe), `registry.rs` (adapter lookup),
//! `error.rs` (`RunError`).

pub mod coordinator;
pub mod error;
pub mod evaluate;
pub mod executor;
pub mod governor;
pub mod inventory;
pub mod registry;

pub use coordinator::RunCoordinator;
pub use error::{RunError, RunResult};
pub use evaluate::{ShowContext, evaluate_episode, evaluate_show};
pub use executor::DeletionExecutor;
pub use governor::{GovernorOutcome, govern};
pub use inventory::{ShowInventory, build_inventory, merge_entries};
pub use registry::SourceRegistry;
