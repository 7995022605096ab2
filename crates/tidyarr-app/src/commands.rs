//! Command handlers.

use std::path::Path;

use chrono::{DateTime, Utc};
use tidyarr_config::CleanupConfig;
use tidyarr_core::RunReport;
use tidyarr_engine::{RunCoordinator, SourceRegistry};
use tidyarr_telemetry::RunMetrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bootstrap::{build_registry, prune_media_root, resolve_plan};
use crate::cli::RunArgs;
use crate::error::{AppError, AppResult, EXIT_OPERATIONAL};
use crate::output::{OutputFormat, render_health, render_plan, render_report, status_exit_code};
use crate::shutdown::cancel_on_signal;

pub(crate) async fn handle_run(
    config: &CleanupConfig,
    args: &RunArgs,
    format: OutputFormat,
) -> AppResult<i32> {
    let registry = build_registry(config)?;
    let cancel = CancellationToken::new();
    let listener = cancel_on_signal(cancel.clone());
    let result = execute_run(config, registry, args.dry_run, &cancel, Utc::now()).await;
    listener.abort();
    let report = result?;

    if let Some(path) = &args.metrics_file
        && let Err(err) = write_metrics(&report, path)
    {
        warn!(path = %path.display(), error = %err.display_message(), "failed to write run metrics");
    }
    println!("{}", render_report(&report, format)?.trim_end());
    Ok(status_exit_code(report.status))
}

pub(crate) async fn execute_run(
    config: &CleanupConfig,
    registry: SourceRegistry,
    force_dry_run: bool,
    cancel: &CancellationToken,
    now: DateTime<Utc>,
) -> AppResult<RunReport> {
    let mut plan = resolve_plan(config, &registry).await?;
    if force_dry_run {
        plan.defaults.dry_run = true;
    }
    let coordinator = RunCoordinator::new(registry);
    let mut report = coordinator.run_once_at(&plan, cancel, now).await?;
    prune_media_root(config, &plan, &mut report).await;
    Ok(report)
}

fn write_metrics(report: &RunReport, path: &Path) -> AppResult<()> {
    let metrics =
        RunMetrics::new().map_err(|source| AppError::telemetry("build_metrics", source))?;
    metrics.record(report);
    metrics
        .write_textfile(path)
        .map_err(|source| AppError::telemetry("write_metrics", source))?;
    info!(path = %path.display(), "run metrics written");
    Ok(())
}

pub(crate) async fn handle_health(config: &CleanupConfig, format: OutputFormat) -> AppResult<i32> {
    let coordinator = RunCoordinator::new(build_registry(config)?);
    let health = coordinator.probe_sources().await;
    println!("{}", render_health(&health, format)?.trim_end());
    Ok(if health.values().all(|reachable| *reachable) {
        0
    } else {
        EXIT_OPERATIONAL
    })
}

pub(crate) fn handle_check_config(config: &CleanupConfig, format: OutputFormat) -> AppResult<i32> {
    let plan = config
        .run_plan()
        .map_err(|source| AppError::config("check_config", source))?;
    println!("{}", render_plan(&plan, format)?.trim_end());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tidyarr_config::from_yaml_str;
    use tidyarr_core::{ExecutionOutcome, RunStatus, ShowSelector, SourceKind};
    use tidyarr_test_support::fixtures::{aired_episodes, reference_now};
    use tidyarr_test_support::mocks::MemorySource;

    const CONFIG: &str = "sonarr:\n  host: http://sonarr:8989\n  api_key: key\nshows:\n  - selector: Daily News\n";

    fn memory_registry(ages: &[i64]) -> (SourceRegistry, Arc<MemorySource>) {
        let show = ShowSelector::new("Daily News");
        let episodes = aired_episodes(SourceKind::Sonarr, &show, ages, reference_now());
        let source = Arc::new(MemorySource::new(SourceKind::Sonarr).with_show(&show, episodes));
        (SourceRegistry::new().with_source(source.clone()), source)
    }

    #[tokio::test]
    async fn run_deletes_expired_episodes() -> anyhow::Result<()> {
        let config = from_yaml_str(CONFIG)?;
        let (registry, source) = memory_registry(&[1, 400, 500]);
        let report = execute_run(
            &config,
            registry,
            false,
            &CancellationToken::new(),
            reference_now(),
        )
        .await?;
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.outcome_counts.deleted, 2);
        assert_eq!(source.deleted_refs().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn dry_run_flag_overrides_configuration() -> anyhow::Result<()> {
        let config = from_yaml_str(CONFIG)?;
        let (registry, source) = memory_registry(&[400, 500]);
        let report = execute_run(
            &config,
            registry,
            true,
            &CancellationToken::new(),
            reference_now(),
        )
        .await?;
        assert!(report.dry_run);
        assert!(
            report
                .executions
                .iter()
                .all(|record| record.outcome == ExecutionOutcome::DryRunSkipped)
        );
        assert_eq!(source.delete_calls().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn metrics_file_reflects_the_run() -> anyhow::Result<()> {
        let config = from_yaml_str(CONFIG)?;
        let (registry, _) = memory_registry(&[400]);
        let report = execute_run(
            &config,
            registry,
            false,
            &CancellationToken::new(),
            reference_now(),
        )
        .await?;
        let dir = TempDir::new()?;
        let path = dir.path().join("tidyarr.prom");
        write_metrics(&report, &path)?;
        let text = fs::read_to_string(&path)?;
        assert!(text.contains("tidyarr_run_outcomes{outcome=\"deleted\"} 1"));
        Ok(())
    }

    #[tokio::test]
    async fn health_fails_when_any_backend_is_down() -> anyhow::Result<()> {
        let sonarr = MockServer::start_async().await;
        let plex = MockServer::start_async().await;
        let status = sonarr.mock(|when, then| {
            when.method(GET).path("/api/v3/system/status");
            then.status(200).json_body(serde_json::json!({"version": "4.0.0"}));
        });
        let identity = plex.mock(|when, then| {
            when.method(GET).path("/identity");
            then.status(500);
        });
        let config = from_yaml_str(&format!(
            "sonarr:\n  host: {}\n  api_key: key\nplex:\n  url: {}\n  token: token\n",
            sonarr.base_url(),
            plex.base_url()
        ))?;

        let code = handle_health(&config, OutputFormat::Json).await?;
        status.assert();
        identity.assert();
        assert_eq!(code, EXIT_OPERATIONAL);
        Ok(())
    }

    #[test]
    fn check_config_succeeds_for_valid_documents() -> anyhow::Result<()> {
        let config = from_yaml_str(CONFIG)?;
        assert_eq!(handle_check_config(&config, OutputFormat::Table)?, 0);
        Ok(())
    }
}
