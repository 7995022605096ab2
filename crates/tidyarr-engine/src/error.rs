//! # Design
//!
//! - Only plan-level problems abort a run; everything else lands in the report.
//! - Constant messages with the offending field and value carried as context.

use thiserror::Error;

/// Result alias for run entry points.
pub type RunResult<T> = Result<T, RunError>;

/// Fatal errors raised before any adapter is contacted.
#[derive(Debug, Error)]
pub enum RunError {
    /// The run plan is structurally unusable.
    #[error("run configuration invalid")]
    Configuration {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl RunError {
    pub(crate) const fn configuration(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::Configuration {
            field,
            reason,
            value,
        }
    }
}
