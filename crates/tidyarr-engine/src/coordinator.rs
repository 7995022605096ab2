//! Run Coordinator.
//!
//! # Design
//! - Phase one runs inventory and evaluation per show under a bounded semaphore.
//! - The governor sees the closed set of decisions only after every show has finished.
//! - Phase two executes approved deletions, again bounded.
//! - The coordinator owns the report builder; workers return values and never touch it.
//! - Cancellation before the barrier aborts with no deletions; after the barrier it stops
//!   new dispatches and lets in-flight deletes finish.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tidyarr_core::{
    DeletionDecision, EpisodeRecord, EpisodeSource, RunPlan, RunReport, RunReportBuilder,
    ShowPlan, ShowStatus, ShowSummary, SourceKind, SourceSkip,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RunError, RunResult};
use crate::evaluate::evaluate_show;
use crate::executor::{DeletionExecutor, dry_run_record};
use crate::governor::govern;
use crate::inventory::build_inventory;
use crate::registry::SourceRegistry;

/// Top-level entry point for one cleanup run.
#[derive(Debug, Clone)]
pub struct RunCoordinator {
    registry: SourceRegistry,
}

impl RunCoordinator {
    /// Coordinator over the given adapters.
    #[must_use]
    pub const fn new(registry: SourceRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    /// Adapters available to runs.
    pub const fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Execute one run against the current time.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Configuration` when the plan is unusable; no adapter is
    /// contacted in that case.
    pub async fn run_once(
        &self,
        plan: &RunPlan,
        cancel: &CancellationToken,
    ) -> RunResult<RunReport> {
        self.run_once_at(plan, cancel, Utc::now()).await
    }

    /// Execute one run, measuring episode ages against `now`.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Configuration` when the plan is unusable; no adapter is
    /// contacted in that case.
    pub async fn run_once_at(
        &self,
        plan: &RunPlan,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> RunResult<RunReport> {
        self.validate(plan)?;

        let defaults = plan.defaults;
        let run_id = Uuid::new_v4();
        let mut report = RunReportBuilder::new(run_id, Utc::now(), defaults.dry_run);
        info!(
            run_id = %run_id,
            shows = plan.shows.len(),
            dry_run = defaults.dry_run,
            max_deletions = defaults.max_deletions_per_run,
            "cleanup run started"
        );

        let permits = Semaphore::new(defaults.parallelism);
        let workers = plan
            .shows
            .iter()
            .map(|show| self.process_show(show, &permits, defaults.verify_paths, now));
        let evaluated = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            results = join_all(workers) => Some(results),
        };
        let Some(results) = evaluated.filter(|_| !cancel.is_cancelled()) else {
            warn!(run_id = %run_id, "cancelled before evaluation finished; aborting run");
            return Ok(report.abort(Utc::now()));
        };
        for (summary, decisions) in results {
            report.record_show(summary, decisions);
        }

        let gate = govern(report.decisions_mut(), &defaults);
        if gate.throttled {
            report.mark_throttled();
        }
        let decisions = report.decisions();
        let dry_runs: Vec<_> = gate
            .dry_run
            .iter()
            .filter_map(|index| decisions.get(*index))
            .map(|decision| dry_run_record(&decision.episode))
            .collect();
        let approved: Vec<EpisodeRecord> = gate
            .approved
            .iter()
            .filter_map(|index| decisions.get(*index))
            .map(|decision| decision.episode.clone())
            .collect();
        for record in dry_runs {
            report.record_execution(record);
        }

        let executions = DeletionExecutor::new(&self.registry, defaults.parallelism)
            .execute(&approved, cancel)
            .await;
        for record in executions {
            report.record_execution(record);
        }
        if cancel.is_cancelled() {
            warn!(run_id = %run_id, "cancelled during execution; remaining deletes not dispatched");
            report.mark_cancelled();
        }

        if defaults.refresh_libraries && report.deleted_count() > 0 {
            self.refresh_libraries(&mut report).await;
        }

        let report = report.finish(Utc::now());
        info!(
            run_id = %run_id,
            status = report.status.as_str(),
            deleted = report.outcome_counts.deleted,
            failed = report.outcome_counts.failed,
            dry_run_skipped = report.outcome_counts.dry_run_skipped,
            bytes_freed = report.bytes_freed,
            "cleanup run finished"
        );
        Ok(report)
    }

    /// Reachability of every registered adapter.
    pub async fn probe_sources(&self) -> BTreeMap<SourceKind, bool> {
        let probes = self.registry.iter().map(|(kind, source)| async move {
            let reachable = match source.probe().await {
                Ok(()) => true,
                Err(err) => {
                    warn!(source = %kind, error = %err.describe(), "source probe failed");
                    false
                }
            };
            (kind, reachable)
        });
        join_all(probes).await.into_iter().collect()
    }

    fn validate(&self, plan: &RunPlan) -> RunResult<()> {
        if plan.shows.is_empty() {
            return Err(RunError::configuration("shows", "no shows configured", None));
        }
        if plan.defaults.parallelism == 0 {
            return Err(RunError::configuration(
                "parallelism",
                "must be at least 1",
                Some("0".to_string()),
            ));
        }
        let mut seen = BTreeSet::new();
        for show in &plan.shows {
            if show.selector.as_str().is_empty() {
                return Err(RunError::configuration(
                    "shows.selector",
                    "selector must not be blank",
                    None,
                ));
            }
            if !seen.insert(show.selector.as_str().to_ascii_lowercase()) {
                return Err(RunError::configuration(
                    "shows.selector",
                    "duplicate show selector",
                    Some(show.selector.to_string()),
                ));
            }
            if show.sources.is_empty() {
                return Err(RunError::configuration(
                    "shows.sources",
                    "show has no sources",
                    Some(show.selector.to_string()),
                ));
            }
            if let Some(kind) = show
                .sources
                .iter()
                .find(|kind| self.registry.get(**kind).is_none())
            {
                return Err(RunError::configuration(
                    "shows.sources",
                    "source not registered",
                    Some(format!("{}: {kind}", show.selector)),
                ));
            }
        }
        Ok(())
    }

    async fn process_show(
        &self,
        show: &ShowPlan,
        permits: &Semaphore,
        verify_paths: bool,
        now: DateTime<Utc>,
    ) -> (ShowSummary, Vec<DeletionDecision>) {
        let sources: Vec<Arc<dyn EpisodeSource>> = show
            .sources
            .iter()
            .filter_map(|kind| self.registry.get(*kind))
            .collect();
        let Ok(_permit) = permits.acquire().await else {
            return (skipped_summary(show, Vec::new()), Vec::new());
        };

        let inventory = build_inventory(&show.selector, &sources, verify_paths).await;
        let status = inventory.status();
        if status == ShowStatus::Skipped {
            warn!(show = %show.selector, "no source reported; show skipped");
            return (skipped_summary(show, inventory.skipped), Vec::new());
        }

        let policy = show.policy.with_overrides(&inventory.overrides);
        let episodes = inventory.episodes.len();
        let decisions = evaluate_show(inventory.episodes, &policy, now);
        for decision in &decisions {
            debug!(
                episode = %decision.identity(),
                decision = decision.decision.as_str(),
                reason = decision.reason.as_str(),
                age_days = ?decision.age_days,
                "episode evaluated"
            );
        }
        let summary = ShowSummary {
            selector: show.selector.clone(),
            status,
            skipped_sources: inventory.skipped,
            episodes,
            unidentified: inventory.unidentified,
            policy: Some(policy),
        };
        (summary, decisions)
    }

    async fn refresh_libraries(&self, report: &mut RunReportBuilder) {
        let refreshes = self
            .registry
            .iter()
            .map(|(kind, source)| async move { (kind, source.refresh_library().await) });
        for (kind, result) in join_all(refreshes).await {
            match result {
                Ok(()) => debug!(source = %kind, "library refresh requested"),
                Err(err) => {
                    warn!(source = %kind, error = %err.describe(), "library refresh failed");
                    report.note_maintenance(format!(
                        "{kind} library refresh failed: {}",
                        err.describe()
                    ));
                }
            }
        }
    }
}

fn skipped_summary(show: &ShowPlan, skipped: Vec<SourceSkip>) -> ShowSummary {
    ShowSummary {
        selector: show.selector.clone(),
        status: ShowStatus::Skipped,
        skipped_sources: skipped,
        episodes: 0,
        unidentified: 0,
        policy: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidyarr_core::{
        Decision, DecisionReason, DeleteTarget, ExecutionOutcome, RetentionPolicy, RunDefaults,
        RunStatus, ShowSelector,
    };
    use tidyarr_test_support::fixtures::{aired_episodes, reference_now};
    use tidyarr_test_support::mocks::MemorySource;

    fn daily_news() -> ShowSelector {
        ShowSelector::new("DailyNews")
    }

    fn show_plan(selector: &ShowSelector, sources: &[SourceKind], policy: RetentionPolicy) -> ShowPlan {
        ShowPlan {
            selector: selector.clone(),
            sources: sources.to_vec(),
            policy,
        }
    }

    fn plan(shows: Vec<ShowPlan>, max: u32, dry_run: bool) -> RunPlan {
        RunPlan {
            defaults: RunDefaults {
                dry_run,
                max_deletions_per_run: max,
                parallelism: 2,
                verify_paths: false,
                refresh_libraries: true,
            },
            shows,
        }
    }

    fn policy(retention_days: u32, min_keep_count: u32) -> RetentionPolicy {
        RetentionPolicy {
            retention_days,
            min_keep_count,
            ..RetentionPolicy::default()
        }
    }

    fn sonarr_with(selector: &ShowSelector, ages: &[i64]) -> MemorySource {
        MemorySource::new(SourceKind::Sonarr).with_show(
            selector,
            aired_episodes(SourceKind::Sonarr, selector, ages, reference_now()),
        )
    }

    #[tokio::test]
    async fn daily_show_run_deletes_only_unprotected_expired_episodes() -> anyhow::Result<()> {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[0, 1, 3, 5, 10]));
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(2, 3))],
            10,
            false,
        );

        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.decision_counts.keep, 2);
        assert_eq!(report.decision_counts.skip_protected, 1);
        assert_eq!(report.decision_counts.delete, 2);
        assert_eq!(report.outcome_counts.deleted, 2);
        assert_eq!(report.bytes_freed, 2_000);
        assert_eq!(sonarr.remaining(&daily_news()).await.len(), 3);
        assert_eq!(sonarr.refresh_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn ceiling_breach_throttles_without_deleting() -> anyhow::Result<()> {
        let first = ShowSelector::new("Morning");
        let second = ShowSelector::new("Evening");
        let sonarr = Arc::new(
            MemorySource::new(SourceKind::Sonarr)
                .with_show(
                    &first,
                    aired_episodes(SourceKind::Sonarr, &first, &[20, 21, 22, 23, 24], reference_now()),
                )
                .with_show(
                    &second,
                    aired_episodes(SourceKind::Sonarr, &second, &[30, 31, 32], reference_now()),
                ),
        );
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![
                show_plan(&first, &[SourceKind::Sonarr], policy(7, 0)),
                show_plan(&second, &[SourceKind::Sonarr], policy(7, 0)),
            ],
            5,
            false,
        );

        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Throttled);
        assert!(report.throttled);
        assert_eq!(report.decision_counts.skip_protected, 8);
        assert_eq!(report.decision_counts.delete, 0);
        assert!(
            report
                .decisions
                .iter()
                .all(|decision| decision.reason == DecisionReason::SafetyThreshold)
        );
        assert!(report.executions.is_empty());
        assert_eq!(sonarr.delete_calls().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn dry_run_leaves_library_untouched() -> anyhow::Result<()> {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[10, 20, 30]));
        let before = sonarr.remaining(&daily_news()).await;
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            true,
        );

        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.decision_counts.delete, 3);
        assert_eq!(report.outcome_counts.dry_run_skipped, 3);
        assert_eq!(report.bytes_freed, 0);
        assert_eq!(sonarr.delete_calls().await, 0);
        assert_eq!(sonarr.refresh_count().await, 0);
        assert_eq!(sonarr.remaining(&daily_news()).await, before);
        Ok(())
    }

    #[tokio::test]
    async fn per_show_dry_run_only_spares_that_show() -> anyhow::Result<()> {
        let quiet = ShowSelector::new("Quiet");
        let sonarr = Arc::new(
            sonarr_with(&daily_news(), &[10, 20]).with_show(
                &quiet,
                aired_episodes(SourceKind::Sonarr, &quiet, &[10, 20], reference_now()),
            ),
        );
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let quiet_policy = RetentionPolicy {
            dry_run: true,
            ..policy(7, 0)
        };
        let plan = plan(
            vec![
                show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0)),
                show_plan(&quiet, &[SourceKind::Sonarr], quiet_policy),
            ],
            10,
            false,
        );

        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.outcome_counts.deleted, 2);
        assert_eq!(report.outcome_counts.dry_run_skipped, 2);
        assert_eq!(sonarr.remaining(&quiet).await.len(), 2);
        assert!(sonarr.remaining(&daily_news()).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn plex_outage_processes_show_with_sonarr_alone() -> anyhow::Result<()> {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[1, 9]));
        let plex = Arc::new(
            MemorySource::new(SourceKind::Plex)
                .with_show(&daily_news(), Vec::new())
                .unavailable(),
        );
        let coordinator = RunCoordinator::new(
            SourceRegistry::new()
                .with_source(sonarr.clone())
                .with_source(plex),
        );
        let plan = plan(
            vec![show_plan(
                &daily_news(),
                &[SourceKind::Plex, SourceKind::Sonarr],
                policy(7, 0),
            )],
            10,
            false,
        );

        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Completed);
        let summary = report
            .show(&daily_news())
            .ok_or_else(|| anyhow::anyhow!("missing show summary"))?;
        assert_eq!(summary.status, ShowStatus::PartialSources);
        assert_eq!(summary.skipped_sources[0].source, SourceKind::Plex);
        assert_eq!(report.outcome_counts.deleted, 1);
        assert!(
            report
                .maintenance
                .iter()
                .any(|note| note.starts_with("plex library refresh failed"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn show_without_reachable_sources_is_skipped() -> anyhow::Result<()> {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[30]).unavailable());
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            false,
        );
        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.decisions.is_empty());
        assert_eq!(
            report.show(&daily_news()).map(|summary| summary.status),
            Some(ShowStatus::Skipped)
        );
        Ok(())
    }

    #[tokio::test]
    async fn source_overrides_replace_configured_policy() -> anyhow::Result<()> {
        let sonarr = Arc::new(
            sonarr_with(&daily_news(), &[10, 20, 30]).with_overrides(
                &daily_news(),
                tidyarr_core::ShowOverrides::from_labels(["no-cleanup"]),
            ),
        );
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(1, 0))],
            10,
            false,
        );
        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.decision_counts.keep, 3);
        assert_eq!(sonarr.delete_calls().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_failure_is_noted_without_failing_the_run() -> anyhow::Result<()> {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[10, 20]).failing_refresh());
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            false,
        );
        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.outcome_counts.deleted, 2);
        assert_eq!(sonarr.refresh_count().await, 1);
        assert_eq!(report.maintenance.len(), 1);
        assert!(report.maintenance[0].starts_with("sonarr library refresh failed"));
        Ok(())
    }

    #[tokio::test]
    async fn failures_mark_run_completed_with_failures() -> anyhow::Result<()> {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[10, 20]).failing_ref("sonarr-1"));
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            false,
        );
        let report = coordinator
            .run_once_at(&plan, &CancellationToken::new(), reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.outcome_counts.deleted, 1);
        assert_eq!(report.bytes_freed, 1_000);
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_before_barrier_aborts_with_no_deletes() -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let sonarr = Arc::new(
            sonarr_with(&daily_news(), &[10, 20])
                .on_list(Arc::new(move |_: &ShowSelector| trigger.cancel())),
        );
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            false,
        );

        let report = coordinator
            .run_once_at(&plan, &cancel, reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::Aborted);
        assert!(report.cancelled);
        assert!(report.executions.is_empty());
        assert_eq!(sonarr.delete_calls().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_after_barrier_finishes_in_flight_delete() -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let sonarr = Arc::new(
            sonarr_with(&daily_news(), &[10, 20, 30])
                .on_delete(Arc::new(move |_: &DeleteTarget| trigger.cancel())),
        );
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let mut plan = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            false,
        );
        plan.defaults.parallelism = 1;

        let report = coordinator
            .run_once_at(&plan, &cancel, reference_now())
            .await?;
        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        assert!(report.cancelled);
        assert_eq!(report.outcome_counts.deleted, 1);
        assert_eq!(report.outcome_counts.not_dispatched, 2);
        assert_eq!(sonarr.deleted_refs().await.len(), 1);
        assert!(
            report
                .decisions
                .iter()
                .all(|decision| decision.decision == Decision::Delete)
        );
        assert!(
            report
                .executions
                .iter()
                .any(|record| record.outcome == ExecutionOutcome::NotDispatched)
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_plans_fail_before_contacting_sources() {
        let sonarr = Arc::new(sonarr_with(&daily_news(), &[10]));
        let coordinator = RunCoordinator::new(SourceRegistry::new().with_source(sonarr.clone()));
        let cancel = CancellationToken::new();

        let empty = plan(Vec::new(), 10, false);
        let err = coordinator.run_once(&empty, &cancel).await.err();
        assert!(matches!(
            err,
            Some(RunError::Configuration { field: "shows", .. })
        ));

        let unregistered = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Plex], policy(7, 0))],
            10,
            false,
        );
        let err = coordinator.run_once(&unregistered, &cancel).await.err();
        assert!(matches!(
            err,
            Some(RunError::Configuration {
                reason: "source not registered",
                ..
            })
        ));

        let mut serial = plan(
            vec![show_plan(&daily_news(), &[SourceKind::Sonarr], policy(7, 0))],
            10,
            false,
        );
        serial.defaults.parallelism = 0;
        assert!(coordinator.run_once(&serial, &cancel).await.is_err());
        assert_eq!(sonarr.delete_calls().await, 0);
    }

    #[tokio::test]
    async fn probe_reports_each_source() {
        let sonarr = Arc::new(MemorySource::new(SourceKind::Sonarr));
        let plex = Arc::new(MemorySource::new(SourceKind::Plex).unavailable());
        let coordinator =
            RunCoordinator::new(SourceRegistry::new().with_source(sonarr).with_source(plex));
        let health = coordinator.probe_sources().await;
        assert_eq!(health.get(&SourceKind::Sonarr), Some(&true));
        assert_eq!(health.get(&SourceKind::Plex), Some(&false));
    }
}
