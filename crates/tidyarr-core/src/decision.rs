//! Evaluation output for a single episode.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::{EpisodeIdentity, EpisodeRecord};
use crate::policy::RetentionPolicy;

/// Verdict reached for one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Retain the episode.
    Keep,
    /// Remove the episode.
    Delete,
    /// Old enough to delete, but a guard rail retains it.
    SkipProtected,
    /// Age could not be determined.
    SkipUndetermined,
}

impl Decision {
    #[must_use]
    /// Render the decision as its report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "KEEP",
            Self::Delete => "DELETE",
            Self::SkipProtected => "SKIP_PROTECTED",
            Self::SkipUndetermined => "SKIP_UNDETERMINED",
        }
    }

    #[must_use]
    /// Whether the episode stays in the library after this decision.
    pub const fn retains(self) -> bool {
        matches!(self, Self::Keep | Self::SkipProtected)
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The show's policy is disabled.
    ShowDisabled,
    /// Neither an air date nor an added date is known.
    NoTimestamp,
    /// Younger than the retention window.
    WithinRetention,
    /// Among the `min_keep_count` most recent episodes.
    FloorProtected,
    /// Older than the retention window and not protected.
    Expired,
    /// Downgraded because the run would exceed its deletion ceiling.
    SafetyThreshold,
}

impl DecisionReason {
    #[must_use]
    /// Human-readable reason string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShowDisabled => "show disabled",
            Self::NoTimestamp => "no timestamp",
            Self::WithinRetention => "within retention window",
            Self::FloorProtected => "protected by min_keep_count floor",
            Self::Expired => "older than retention window",
            Self::SafetyThreshold => "run-level safety threshold exceeded",
        }
    }
}

impl Display for DecisionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision for one episode together with the policy snapshot that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionDecision {
    /// Episode the decision applies to.
    pub episode: EpisodeRecord,
    /// Verdict.
    pub decision: Decision,
    /// Reason for the verdict.
    pub reason: DecisionReason,
    /// Policy in effect when the decision was made.
    pub policy: RetentionPolicy,
    /// Episode age in whole days, when determinable.
    pub age_days: Option<i64>,
}

impl DeletionDecision {
    #[must_use]
    /// Identity of the episode under decision.
    pub const fn identity(&self) -> &EpisodeIdentity {
        &self.episode.identity
    }

    /// Replace the verdict while keeping the episode and policy snapshot.
    pub const fn downgrade(&mut self, decision: Decision, reason: DecisionReason) {
        self.decision = decision;
        self.reason = reason;
    }
}
