//! Run report and its single-writer accumulator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{Decision, DeletionDecision};
use crate::model::{EpisodeIdentity, ShowSelector, SourceKind};
use crate::policy::RetentionPolicy;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every approved deletion succeeded.
    Completed,
    /// At least one deletion failed or was never dispatched.
    CompletedWithFailures,
    /// The deletion ceiling was exceeded; nothing was deleted.
    Throttled,
    /// Cancelled before the evaluation barrier; nothing was deleted.
    Aborted,
}

impl RunStatus {
    /// Every terminal state, in severity order.
    pub const ALL: [Self; 4] = [
        Self::Completed,
        Self::CompletedWithFailures,
        Self::Throttled,
        Self::Aborted,
    ];

    #[must_use]
    /// Render the status as its report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::CompletedWithFailures => "COMPLETED_WITH_FAILURES",
            Self::Throttled => "THROTTLED",
            Self::Aborted => "ABORTED",
        }
    }
}

/// How a show fared during inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShowStatus {
    /// Every configured source reported.
    Processed,
    /// Processed with data from a subset of its sources.
    PartialSources,
    /// No source reported; excluded from evaluation.
    Skipped,
}

impl ShowStatus {
    #[must_use]
    /// Render the status as its report label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "PROCESSED",
            Self::PartialSources => "PARTIAL_SOURCES",
            Self::Skipped => "SKIPPED",
        }
    }
}

/// Annotation for a source skipped for one show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSkip {
    /// Source that was skipped.
    pub source: SourceKind,
    /// Description of the failure.
    pub reason: String,
}

/// Per-show inventory summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSummary {
    /// Show selector.
    pub selector: ShowSelector,
    /// Inventory outcome.
    pub status: ShowStatus,
    /// Sources skipped for this show and why.
    pub skipped_sources: Vec<SourceSkip>,
    /// Merged episodes in the inventory.
    pub episodes: usize,
    /// Raw entries dropped because they carried neither numbering nor a path.
    pub unidentified: usize,
    /// Effective policy after overrides; absent for skipped shows.
    pub policy: Option<RetentionPolicy>,
}

/// Execution result for one DELETE decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    /// Delete call succeeded.
    Deleted,
    /// Delete call failed.
    Failed,
    /// Dry run; no delete call was made.
    DryRunSkipped,
    /// Cancellation stopped dispatch before this item.
    NotDispatched,
}

/// Outcome of one approved or dry-run deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Episode identity.
    pub identity: EpisodeIdentity,
    /// Adapter the delete was routed to.
    pub source: SourceKind,
    /// Execution result.
    pub outcome: ExecutionOutcome,
    /// The adapter reported the item as already gone.
    pub already_absent: bool,
    /// Bytes reclaimed by this deletion.
    pub bytes_freed: u64,
    /// Failure cause for `Failed` outcomes.
    pub cause: Option<String>,
}

/// Failure listed in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Episode identity.
    pub identity: EpisodeIdentity,
    /// Adapter involved.
    pub source: SourceKind,
    /// Failure cause.
    pub cause: String,
}

/// Counts per decision kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    /// KEEP decisions.
    pub keep: usize,
    /// DELETE decisions.
    pub delete: usize,
    /// SKIP_PROTECTED decisions.
    pub skip_protected: usize,
    /// SKIP_UNDETERMINED decisions.
    pub skip_undetermined: usize,
}

impl DecisionCounts {
    fn record(&mut self, decision: Decision) {
        match decision {
            Decision::Keep => self.keep += 1,
            Decision::Delete => self.delete += 1,
            Decision::SkipProtected => self.skip_protected += 1,
            Decision::SkipUndetermined => self.skip_undetermined += 1,
        }
    }
}

/// Counts per execution outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// Successful deletions, including already-absent items.
    pub deleted: usize,
    /// Failed deletions.
    pub failed: usize,
    /// Deletions suppressed by dry run.
    pub dry_run_skipped: usize,
    /// Deletions never dispatched because of cancellation.
    pub not_dispatched: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Deleted => self.deleted += 1,
            ExecutionOutcome::Failed => self.failed += 1,
            ExecutionOutcome::DryRunSkipped => self.dry_run_skipped += 1,
            ExecutionOutcome::NotDispatched => self.not_dispatched += 1,
        }
    }
}

/// Aggregate of every decision and execution outcome for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Terminal state.
    pub status: RunStatus,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Run end time.
    pub finished_at: DateTime<Utc>,
    /// Global dry-run switch in effect.
    pub dry_run: bool,
    /// The safety ceiling downgraded this run's deletions.
    pub throttled: bool,
    /// A cancellation signal was observed.
    pub cancelled: bool,
    /// Counts per decision kind.
    pub decision_counts: DecisionCounts,
    /// Counts per execution outcome.
    pub outcome_counts: OutcomeCounts,
    /// Every decision, after the safety governor.
    pub decisions: Vec<DeletionDecision>,
    /// Every execution outcome.
    pub executions: Vec<ExecutionRecord>,
    /// Failed deletions with cause.
    pub failures: Vec<FailureEntry>,
    /// Per-show inventory summaries.
    pub shows: Vec<ShowSummary>,
    /// Notes from post-run maintenance (library refreshes, directory cleanup).
    pub maintenance: Vec<String>,
    /// Bytes reclaimed by real deletions.
    pub bytes_freed: u64,
}

impl RunReport {
    #[must_use]
    /// Decisions for a single show.
    pub fn decisions_for<'a>(
        &'a self,
        show: &'a ShowSelector,
    ) -> impl Iterator<Item = &'a DeletionDecision> + 'a {
        self.decisions
            .iter()
            .filter(move |decision| decision.identity().show() == show)
    }

    #[must_use]
    /// Summary for a single show.
    pub fn show(&self, selector: &ShowSelector) -> Option<&ShowSummary> {
        self.shows.iter().find(|summary| &summary.selector == selector)
    }
}

/// Coordinator-owned accumulator; the only writer of a run's report.
#[derive(Debug)]
pub struct RunReportBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    dry_run: bool,
    throttled: bool,
    cancelled: bool,
    decisions: Vec<DeletionDecision>,
    executions: Vec<ExecutionRecord>,
    shows: Vec<ShowSummary>,
    maintenance: Vec<String>,
}

impl RunReportBuilder {
    /// Start accumulating a report.
    #[must_use]
    pub const fn new(run_id: Uuid, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            run_id,
            started_at,
            dry_run,
            throttled: false,
            cancelled: false,
            decisions: Vec::new(),
            executions: Vec::new(),
            shows: Vec::new(),
            maintenance: Vec::new(),
        }
    }

    /// Record one show's inventory summary and decisions.
    pub fn record_show(&mut self, summary: ShowSummary, decisions: Vec<DeletionDecision>) {
        self.shows.push(summary);
        self.decisions.extend(decisions);
    }

    /// Mutable access for the safety governor, after every show has been recorded.
    pub fn decisions_mut(&mut self) -> &mut [DeletionDecision] {
        &mut self.decisions
    }

    #[must_use]
    /// Decisions recorded so far.
    pub fn decisions(&self) -> &[DeletionDecision] {
        &self.decisions
    }

    /// Flag the run as throttled by the safety ceiling.
    pub const fn mark_throttled(&mut self) {
        self.throttled = true;
    }

    /// Flag that a cancellation signal was observed.
    pub const fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Record one execution outcome.
    pub fn record_execution(&mut self, record: ExecutionRecord) {
        self.executions.push(record);
    }

    /// Record a post-run maintenance note.
    pub fn note_maintenance(&mut self, note: impl Into<String>) {
        self.maintenance.push(note.into());
    }

    #[must_use]
    /// Number of successful real deletions so far.
    pub fn deleted_count(&self) -> usize {
        self.executions
            .iter()
            .filter(|record| record.outcome == ExecutionOutcome::Deleted && !record.already_absent)
            .count()
    }

    /// Finalise a run that passed the evaluation barrier.
    ///
    /// A run cancelled after the barrier is never reported as a clean completion.
    #[must_use]
    pub fn finish(self, finished_at: DateTime<Utc>) -> RunReport {
        let throttled = self.throttled;
        let cancelled = self.cancelled;
        let mut report = self.into_report(finished_at, RunStatus::Completed);
        report.status = if throttled {
            RunStatus::Throttled
        } else if cancelled
            || report.outcome_counts.failed > 0
            || report.outcome_counts.not_dispatched > 0
        {
            RunStatus::CompletedWithFailures
        } else {
            RunStatus::Completed
        };
        report
    }

    /// Finalise a run cancelled before the evaluation barrier.
    ///
    /// Partial evaluation results are discarded; no deletion ran.
    #[must_use]
    pub fn abort(mut self, finished_at: DateTime<Utc>) -> RunReport {
        self.cancelled = true;
        self.decisions.clear();
        self.executions.clear();
        self.into_report(finished_at, RunStatus::Aborted)
    }

    fn into_report(self, finished_at: DateTime<Utc>, status: RunStatus) -> RunReport {
        let mut decision_counts = DecisionCounts::default();
        for decision in &self.decisions {
            decision_counts.record(decision.decision);
        }

        let mut outcome_counts = OutcomeCounts::default();
        let mut failures = Vec::new();
        let mut bytes_freed = 0_u64;
        for record in &self.executions {
            outcome_counts.record(record.outcome);
            match record.outcome {
                ExecutionOutcome::Deleted => {
                    bytes_freed = bytes_freed.saturating_add(record.bytes_freed);
                }
                ExecutionOutcome::Failed => failures.push(FailureEntry {
                    identity: record.identity.clone(),
                    source: record.source,
                    cause: record
                        .cause
                        .clone()
                        .unwrap_or_else(|| "unknown failure".to_string()),
                }),
                ExecutionOutcome::DryRunSkipped | ExecutionOutcome::NotDispatched => {}
            }
        }

        RunReport {
            run_id: self.run_id,
            status,
            started_at: self.started_at,
            finished_at,
            dry_run: self.dry_run,
            throttled: self.throttled,
            cancelled: self.cancelled,
            decision_counts,
            outcome_counts,
            decisions: self.decisions,
            executions: self.executions,
            failures,
            shows: self.shows,
            maintenance: self.maintenance,
            bytes_freed,
        }
    }
}
