//! Validated run input consumed by the engine.
//!
//! # Design
//! - Pure data carrier produced by the configuration loader.
//! - The engine re-checks structural invariants before touching any adapter.

use serde::{Deserialize, Serialize};

use crate::model::{ShowSelector, SourceKind};
use crate::policy::RetentionPolicy;

/// Run-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDefaults {
    /// Global dry-run switch; wins over per-show settings when `true`.
    pub dry_run: bool,
    /// Ceiling on DELETE decisions for the whole run.
    pub max_deletions_per_run: u32,
    /// Number of shows (and deletions) processed concurrently.
    pub parallelism: usize,
    /// Verify adapter-reported file paths against the filesystem.
    pub verify_paths: bool,
    /// Ask sources to rescan after a run that removed files.
    pub refresh_libraries: bool,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_deletions_per_run: 100,
            parallelism: 4,
            verify_paths: false,
            refresh_libraries: true,
        }
    }
}

/// One show to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowPlan {
    /// Show selector passed to every adapter.
    pub selector: ShowSelector,
    /// Adapters consulted for this show.
    pub sources: Vec<SourceKind>,
    /// Configured policy before backend overrides.
    pub policy: RetentionPolicy,
}

/// Complete input for a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunPlan {
    /// Run-wide settings.
    pub defaults: RunDefaults,
    /// Shows in processing order.
    pub shows: Vec<ShowPlan>,
}
