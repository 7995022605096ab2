//! Safety Governor: run-wide gate between evaluation and execution.
//!
//! # Design
//! - Runs exactly once, over the closed set of decisions from every show.
//! - The ceiling counts every DELETE, including those routed to dry run.

use tidyarr_core::{Decision, DecisionReason, DeletionDecision, RunDefaults};
use tracing::warn;

/// Routing of DELETE decisions after the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernorOutcome {
    /// The ceiling was exceeded and every DELETE was downgraded.
    pub throttled: bool,
    /// Indices of decisions forwarded to the executor.
    pub approved: Vec<usize>,
    /// Indices of decisions recorded as dry-run skips.
    pub dry_run: Vec<usize>,
}

/// Apply the deletion ceiling and dry-run routing to `decisions` in place.
pub fn govern(decisions: &mut [DeletionDecision], defaults: &RunDefaults) -> GovernorOutcome {
    let deletes = decisions
        .iter()
        .filter(|decision| decision.decision == Decision::Delete)
        .count();
    let ceiling = usize::try_from(defaults.max_deletions_per_run).unwrap_or(usize::MAX);

    if deletes > ceiling {
        warn!(
            deletes,
            ceiling, "deletion ceiling exceeded; downgrading every delete"
        );
        for decision in decisions
            .iter_mut()
            .filter(|decision| decision.decision == Decision::Delete)
        {
            decision.downgrade(Decision::SkipProtected, DecisionReason::SafetyThreshold);
        }
        return GovernorOutcome {
            throttled: true,
            ..GovernorOutcome::default()
        };
    }

    let mut outcome = GovernorOutcome::default();
    for (index, decision) in decisions.iter().enumerate() {
        if decision.decision != Decision::Delete {
            continue;
        }
        if defaults.dry_run || decision.policy.dry_run {
            outcome.dry_run.push(index);
        } else {
            outcome.approved.push(index);
        }
    }
    outcome
}
