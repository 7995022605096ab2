//! Output renderers for command results.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use clap::ValueEnum;
use tidyarr_core::{Decision, RunPlan, RunReport, SourceKind};

use crate::error::{AppError, AppResult};

/// Output encoding for command results.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub(crate) fn render_report(report: &RunReport, format: OutputFormat) -> AppResult<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).map_err(|err| AppError::render("report", err))
        }
        OutputFormat::Table => Ok(report_table(report)),
    }
}

pub(crate) fn render_health(
    health: &BTreeMap<SourceKind, bool>,
    format: OutputFormat,
) -> AppResult<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(health).map_err(|err| AppError::render("health", err))
        }
        OutputFormat::Table => {
            let mut out = format!("{:<10} REACHABLE\n", "SOURCE");
            for (kind, reachable) in health {
                let _ = writeln!(out, "{:<10} {}", kind.as_str(), if *reachable { "yes" } else { "no" });
            }
            Ok(out)
        }
    }
}

pub(crate) fn render_plan(plan: &RunPlan, format: OutputFormat) -> AppResult<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(plan).map_err(|err| AppError::render("plan", err))
        }
        OutputFormat::Table => {
            let defaults = &plan.defaults;
            let mut out = String::new();
            let _ = writeln!(out, "dry run: {}", yes_no(defaults.dry_run));
            let _ = writeln!(out, "max deletions per run: {}", defaults.max_deletions_per_run);
            let _ = writeln!(out, "parallelism: {}", defaults.parallelism);
            let _ = writeln!(out, "verify paths: {}", yes_no(defaults.verify_paths));
            let _ = writeln!(out, "refresh libraries: {}", yes_no(defaults.refresh_libraries));
            let _ = writeln!(
                out,
                "{:<32} {:<14} {:>9} {:>5} {:>7} {:>7}",
                "SHOW", "SOURCES", "RETENTION", "KEEP", "ENABLED", "DRY RUN"
            );
            for show in &plan.shows {
                let sources = show
                    .sources
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = writeln!(
                    out,
                    "{:<32} {:<14} {:>8}d {:>5} {:>7} {:>7}",
                    show.selector,
                    sources,
                    show.policy.retention_days,
                    show.policy.min_keep_count,
                    yes_no(show.policy.enabled),
                    yes_no(show.policy.dry_run)
                );
            }
            Ok(out)
        }
    }
}

fn report_table(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "run {} {} (dry run: {})",
        report.run_id,
        report.status.as_str(),
        yes_no(report.dry_run)
    );
    let _ = writeln!(
        out,
        "{:<32} {:<16} {:>8} {:>5} {:>6} {:>9} {:>12}",
        "SHOW", "STATUS", "EPISODES", "KEEP", "DELETE", "PROTECTED", "UNDETERMINED"
    );
    for show in &report.shows {
        let mut counts = [0_usize; 4];
        for decision in report.decisions_for(&show.selector) {
            let slot = match decision.decision {
                Decision::Keep => 0,
                Decision::Delete => 1,
                Decision::SkipProtected => 2,
                Decision::SkipUndetermined => 3,
            };
            counts[slot] += 1;
        }
        let _ = writeln!(
            out,
            "{:<32} {:<16} {:>8} {:>5} {:>6} {:>9} {:>12}",
            show.selector,
            show.status.as_str(),
            show.episodes,
            counts[0],
            counts[1],
            counts[2],
            counts[3]
        );
        for skip in &show.skipped_sources {
            let _ = writeln!(out, "  skipped {}: {}", skip.source, skip.reason);
        }
    }

    let pending: Vec<_> = report
        .decisions
        .iter()
        .filter(|decision| decision.decision != Decision::Keep)
        .collect();
    if !pending.is_empty() {
        let _ = writeln!(out, "\n{:<48} {:<18} {:<36} {:>5}", "EPISODE", "DECISION", "REASON", "AGE");
        for decision in pending {
            let age = decision
                .age_days
                .map_or_else(|| "-".to_string(), |days| format!("{days}d"));
            let _ = writeln!(
                out,
                "{:<48} {:<18} {:<36} {:>5}",
                decision.identity().to_string(),
                decision.decision.as_str(),
                decision.reason.as_str(),
                age
            );
        }
    }

    let outcomes = &report.outcome_counts;
    let _ = writeln!(
        out,
        "\ndeleted: {}  failed: {}  dry run: {}  not dispatched: {}  freed: {}",
        outcomes.deleted,
        outcomes.failed,
        outcomes.dry_run_skipped,
        outcomes.not_dispatched,
        format_bytes(report.bytes_freed)
    );
    if !report.failures.is_empty() {
        let _ = writeln!(out, "failures:");
        for failure in &report.failures {
            let _ = writeln!(out, "  {} [{}]: {}", failure.identity, failure.source, failure.cause);
        }
    }
    if !report.maintenance.is_empty() {
        let _ = writeln!(out, "maintenance:");
        for note in &report.maintenance {
            let _ = writeln!(out, "  {note}");
        }
    }
    out
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut scaled = bytes;
    let mut remainder = 0;
    let mut unit = 0;
    while scaled >= 1024 && unit < UNITS.len() - 1 {
        remainder = scaled % 1024;
        scaled /= 1024;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{scaled}.{} {}", remainder * 10 / 1024, UNITS[unit])
    }
}

/// Exit code for a finished run.
pub(crate) const fn status_exit_code(status: tidyarr_core::RunStatus) -> i32 {
    use tidyarr_core::RunStatus;
    match status {
        RunStatus::Completed => 0,
        RunStatus::CompletedWithFailures => 1,
        RunStatus::Throttled => 4,
        RunStatus::Aborted => 5,
    }
}
