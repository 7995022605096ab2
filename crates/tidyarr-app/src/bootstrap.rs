//! Wiring from configuration to live adapters and post-run maintenance.
//!
//! # Design
//! - Adapters are built once per invocation from the validated configuration.
//! - Discovery and maintenance failures are logged and never fail the run.

use std::path::Path;
use std::sync::Arc;

use tidyarr_config::{CleanupConfig, LogFormatSetting};
use tidyarr_core::{RunPlan, RunReport, RunStatus, SourceKind};
use tidyarr_engine::SourceRegistry;
use tidyarr_sources::{PlexSettings, PlexSource, SonarrSettings, SonarrSource};
use tidyarr_telemetry::{LogFormat, LoggingConfig};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const BUILD_SHA: &str = match option_env!("TIDYARR_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Load and validate the configuration file.
pub(crate) fn load_config(path: &Path) -> AppResult<CleanupConfig> {
    tidyarr_config::load(path).map_err(|source| AppError::config("load", source))
}

/// Install the global subscriber from the `logging` section.
pub(crate) fn init_telemetry(config: &CleanupConfig) -> AppResult<()> {
    let format = match config.logging.format {
        Some(LogFormatSetting::Json) => LogFormat::Json,
        Some(LogFormatSetting::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    tidyarr_telemetry::init_logging(&LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: BUILD_SHA,
    })
    .map_err(|source| AppError::telemetry("init_logging", source))
}

/// Build one adapter per configured backend.
pub(crate) fn build_registry(config: &CleanupConfig) -> AppResult<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    if let Some(sonarr) = &config.sonarr {
        let settings = SonarrSettings {
            host: sonarr
                .endpoint()
                .map_err(|source| AppError::config("sonarr_endpoint", source))?,
            api_key: sonarr.api_key.clone(),
            timeout: sonarr
                .timeout()
                .map_err(|source| AppError::config("sonarr_timeout", source))?,
        };
        let source =
            SonarrSource::new(&settings).map_err(|err| AppError::source("build_sonarr", err))?;
        registry.register(Arc::new(source));
    }
    if let Some(plex) = &config.plex {
        let settings = PlexSettings {
            url: plex
                .endpoint()
                .map_err(|source| AppError::config("plex_endpoint", source))?,
            token: plex.token.clone(),
            timeout: plex
                .timeout()
                .map_err(|source| AppError::config("plex_timeout", source))?,
        };
        let source = PlexSource::new(&settings).map_err(|err| AppError::source("build_plex", err))?;
        registry.register(Arc::new(source));
    }
    Ok(registry)
}

/// Convert the configuration into a plan, adding discovered daily series when enabled.
pub(crate) async fn resolve_plan(
    config: &CleanupConfig,
    registry: &SourceRegistry,
) -> AppResult<RunPlan> {
    let mut plan = config
        .run_plan()
        .map_err(|source| AppError::config("run_plan", source))?;
    if !config.cleanup.discover_daily_series {
        return Ok(plan);
    }
    let Some(sonarr) = registry.get(SourceKind::Sonarr) else {
        warn!("daily series discovery requires a sonarr backend; skipping");
        return Ok(plan);
    };

    let discovered = match sonarr.discover_daily_shows().await {
        Ok(discovered) => discovered,
        Err(err) => {
            warn!(error = %err.describe(), "daily series discovery failed; using configured shows");
            return Ok(plan);
        }
    };
    let mut added = 0_usize;
    for show in discovered {
        let known = plan
            .shows
            .iter()
            .any(|planned| show.is_named_by(&planned.selector));
        if known || show.title.trim().is_empty() {
            continue;
        }
        plan.shows.push(
            config
                .discovered_show(show.selector())
                .map_err(|source| AppError::config("discovered_show", source))?,
        );
        added += 1;
    }
    info!(added, total = plan.shows.len(), "daily series discovered");
    Ok(plan)
}

/// Remove empty directories beneath the media root after a real run.
///
/// The sweep covers the whole media root, so it is skipped while any planned show is
/// in dry-run mode.
pub(crate) async fn prune_media_root(
    config: &CleanupConfig,
    plan: &RunPlan,
    report: &mut RunReport,
) {
    if report.dry_run || report.status == RunStatus::Aborted || !config.cleanup.delete_empty_dirs {
        return;
    }
    if plan.shows.iter().any(|show| show.policy.dry_run) {
        info!("dry-run shows planned; empty directory cleanup skipped");
        report
            .maintenance
            .push("empty directory cleanup skipped: dry-run shows planned".to_string());
        return;
    }
    let Some(root) = config.cleanup.media_root.clone() else {
        return;
    };
    let pruned =
        tokio::task::spawn_blocking(move || tidyarr_fsops::prune_empty_dirs(&root)).await;
    match pruned {
        Ok(Ok(removed)) => {
            if !removed.is_empty() {
                report
                    .maintenance
                    .push(format!("removed {} empty directories", removed.len()));
            }
        }
        Ok(Err(err)) => {
            let err = AppError::FsOps {
                operation: "prune_empty_dirs",
                source: err,
            };
            warn!(error = %err.display_message(), "empty directory cleanup failed");
            report
                .maintenance
                .push(format!("empty directory cleanup failed: {}", err.display_message()));
        }
        Err(err) => {
            warn!(error = %err, "empty directory cleanup task failed");
            report
                .maintenance
                .push(format!("empty directory cleanup task failed: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use tidyarr_config::from_yaml_str;
    use tidyarr_core::{DiscoveredShow, RunReportBuilder};
    use tidyarr_test_support::fixtures::reference_now;
    use tidyarr_test_support::mocks::MemorySource;
    use uuid::Uuid;

    fn sonarr_config(server: &MockServer, extra: &str) -> anyhow::Result<CleanupConfig> {
        let text = format!(
            "sonarr:\n  host: {}\n  api_key: key\n{extra}",
            server.base_url()
        );
        Ok(from_yaml_str(&text)?)
    }

    #[test]
    fn registry_contains_configured_backends() -> anyhow::Result<()> {
        let config = from_yaml_str(
            "sonarr:\n  host: http://sonarr:8989\n  api_key: key\nplex:\n  url: http://plex:32400\n  token: token\n",
        )?;
        let registry = build_registry(&config)?;
        assert_eq!(registry.kinds(), vec![SourceKind::Plex, SourceKind::Sonarr]);
        Ok(())
    }

    #[tokio::test]
    async fn discovery_adds_unconfigured_daily_series() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let series = server.mock(|when, then| {
            when.method(GET).path("/api/v3/series");
            then.status(200).json_body(json!([
                {"id": 1, "title": "Daily News", "tvdbId": 10, "seriesType": "daily", "tags": []},
                {"id": 2, "title": "Late Show", "tvdbId": 11, "seriesType": "daily", "tags": []},
                {"id": 3, "title": "Drama", "tvdbId": 12, "seriesType": "standard", "tags": []}
            ]));
        });
        let config = sonarr_config(
            &server,
            "cleanup:\n  discover_daily_series: true\nshows:\n  - selector: daily news\n    retention_days: 2\n",
        )?;
        let registry = build_registry(&config)?;

        let plan = resolve_plan(&config, &registry).await?;
        series.assert();
        let selectors: Vec<_> = plan.shows.iter().map(|show| show.selector.as_str()).collect();
        assert_eq!(selectors, vec!["daily news", "Late Show"]);
        assert_eq!(plan.shows[0].policy.retention_days, 2);
        assert_eq!(plan.shows[1].policy.retention_days, 7);
        Ok(())
    }

    #[tokio::test]
    async fn discovery_skips_series_configured_by_tvdb_id() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/series");
            then.status(200).json_body(json!([
                {"id": 1, "title": "Daily News", "tvdbId": 10, "seriesType": "daily", "tags": []}
            ]));
        });
        let config = sonarr_config(
            &server,
            "cleanup:\n  discover_daily_series: true\nshows:\n  - selector: \"tvdb:10\"\n    retention_days: 30\n",
        )?;
        let registry = build_registry(&config)?;

        let plan = resolve_plan(&config, &registry).await?;
        assert_eq!(plan.shows.len(), 1);
        assert_eq!(plan.shows[0].selector.as_str(), "tvdb:10");
        assert_eq!(plan.shows[0].policy.retention_days, 30);
        Ok(())
    }

    #[tokio::test]
    async fn discovery_deduplicates_reported_shows() -> anyhow::Result<()> {
        let config = from_yaml_str(
            "cleanup:\n  discover_daily_series: true\nsonarr:\n  host: http://sonarr\n  api_key: key\nshows:\n  - selector: tvdb:10\n",
        )?;
        let sonarr = MemorySource::new(SourceKind::Sonarr).with_daily(vec![
            DiscoveredShow {
                title: "Daily News".to_string(),
                tvdb_id: Some(10),
            },
            DiscoveredShow {
                title: "Late Show".to_string(),
                tvdb_id: None,
            },
            DiscoveredShow {
                title: "late show".to_string(),
                tvdb_id: Some(11),
            },
        ]);
        let registry = SourceRegistry::new().with_source(Arc::new(sonarr));

        let plan = resolve_plan(&config, &registry).await?;
        let selectors: Vec<_> = plan.shows.iter().map(|show| show.selector.as_str()).collect();
        assert_eq!(selectors, vec!["tvdb:10", "Late Show"]);
        Ok(())
    }

    #[tokio::test]
    async fn discovery_failure_keeps_configured_shows() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/series");
            then.status(503);
        });
        let config = sonarr_config(
            &server,
            "cleanup:\n  discover_daily_series: true\nshows:\n  - selector: Daily News\n",
        )?;
        let registry = build_registry(&config)?;
        let plan = resolve_plan(&config, &registry).await?;
        assert_eq!(plan.shows.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn pruning_runs_only_after_real_runs() -> anyhow::Result<()> {
        let media = TempDir::new()?;
        fs::create_dir_all(media.path().join("show/season 01"))?;
        let config = from_yaml_str(&format!(
            "cleanup:\n  delete_empty_dirs: true\n  media_root: {}\nsonarr:\n  host: http://sonarr\n  api_key: key\nshows:\n  - selector: Daily News\n",
            media.path().display()
        ))?;
        let plan = config.run_plan()?;

        let mut dry = RunReportBuilder::new(Uuid::new_v4(), reference_now(), true)
            .finish(reference_now());
        prune_media_root(&config, &plan, &mut dry).await;
        assert!(media.path().join("show/season 01").is_dir());
        assert!(dry.maintenance.is_empty());

        let mut real = RunReportBuilder::new(Uuid::new_v4(), reference_now(), false)
            .finish(reference_now());
        prune_media_root(&config, &plan, &mut real).await;
        assert!(!media.path().join("show").exists());
        assert!(media.path().is_dir());
        assert_eq!(real.maintenance, vec!["removed 2 empty directories".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn pruning_waits_while_any_show_is_dry_run() -> anyhow::Result<()> {
        let media = TempDir::new()?;
        fs::create_dir_all(media.path().join("preview/season 01"))?;
        let config = from_yaml_str(&format!(
            "cleanup:\n  delete_empty_dirs: true\n  media_root: {}\nsonarr:\n  host: http://sonarr\n  api_key: key\nshows:\n  - selector: Daily News\n  - selector: Preview\n    dry_run: true\n",
            media.path().display()
        ))?;
        let plan = config.run_plan()?;

        let mut report = RunReportBuilder::new(Uuid::new_v4(), reference_now(), false)
            .finish(reference_now());
        prune_media_root(&config, &plan, &mut report).await;
        assert!(media.path().join("preview/season 01").is_dir());
        assert_eq!(
            report.maintenance,
            vec!["empty directory cleanup skipped: dry-run shows planned".to_string()]
        );
        Ok(())
    }
}
