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

//! Source-agnostic episode model and adapter contracts.
//!
//! Layout: `model.rs` (episode records and raw adapter entries), `policy.rs`
//! (retention policy and show overrides), `decision.rs` (evaluation output),
//! `report.rs` (run report and its accumulator), `plan.rs` (validated run input),
//! `source.rs` (the `EpisodeSource` trait), `error.rs` (`SourceError`).

pub mod decision;
pub mod error;
pub mod model;
pub mod plan;
pub mod policy;
pub mod report;
pub mod source;

pub use decision::{Decision, DecisionReason, DeletionDecision};
pub use error::{SourceError, SourceResult};
pub use model::{
    DiscoveredShow, EpisodeIdentity, EpisodeRecord, RawEpisode, ShowMetadata, ShowSelector,
    SourceFlags, SourceKind, WatchStatus,
};
pub use plan::{RunDefaults, RunPlan, ShowPlan};
pub use policy::{RetentionPolicy, ShowOverrides};
pub use report::{
    DecisionCounts, ExecutionOutcome, ExecutionRecord, FailureEntry, OutcomeCounts, RunReport,
    RunReportBuilder, RunStatus, ShowStatus, ShowSummary, SourceSkip,
};
pub use source::{DeleteOutcome, DeleteTarget, EpisodeSource, EpisodeStream};
