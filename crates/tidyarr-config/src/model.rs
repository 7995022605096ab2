//! Typed model of the YAML configuration document.
//!
//! # Design
//! - Numeric fields that must be non-negative are parsed signed so validation can report
//!   the offending value instead of a bare YAML type error.
//! - Credentials are redacted from `Debug` output.

use std::fmt::{self, Debug, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tidyarr_core::SourceKind;

use crate::defaults;

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Run-wide cleanup behaviour.
    #[serde(default)]
    pub cleanup: CleanupSettings,
    /// Concurrency limits.
    #[serde(default)]
    pub performance: PerformanceSettings,
    /// Sonarr backend, when configured.
    #[serde(default)]
    pub sonarr: Option<SonarrConfig>,
    /// Plex backend, when configured.
    #[serde(default)]
    pub plex: Option<PlexConfig>,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Explicitly configured shows, in processing order.
    #[serde(default)]
    pub shows: Vec<ShowEntry>,
}

impl CleanupConfig {
    /// Backends with a configuration section, in stable order.
    #[must_use]
    pub fn configured_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SourceKind::Plex => self.plex.is_some(),
                SourceKind::Sonarr => self.sonarr.is_some(),
            })
            .collect()
    }
}

/// `cleanup` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupSettings {
    /// Global dry-run switch.
    #[serde(default)]
    pub dry_run: bool,
    /// Ceiling on DELETE decisions per run.
    #[serde(default = "defaults::max_deletions_per_run")]
    pub max_deletions_per_run: i64,
    /// Retention applied to shows without an explicit value.
    #[serde(default = "defaults::retention_days")]
    pub default_retention_days: i64,
    /// Floor applied to shows without an explicit value.
    #[serde(default)]
    pub default_min_keep_count: i64,
    /// Root of the media tree used for empty-directory pruning.
    #[serde(default)]
    pub media_root: Option<PathBuf>,
    /// Remove empty directories beneath `media_root` after a real run.
    #[serde(default)]
    pub delete_empty_dirs: bool,
    /// Ask backends to rescan after files were removed.
    #[serde(default = "defaults::enabled")]
    pub refresh_libraries: bool,
    /// Stat reported file paths during inventory.
    #[serde(default)]
    pub verify_paths: bool,
    /// Add every daily Sonarr series that is not configured explicitly.
    #[serde(default)]
    pub discover_daily_series: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_deletions_per_run: defaults::MAX_DELETIONS_PER_RUN,
            default_retention_days: defaults::RETENTION_DAYS,
            default_min_keep_count: 0,
            media_root: None,
            delete_empty_dirs: false,
            refresh_libraries: true,
            verify_paths: false,
            discover_daily_series: false,
        }
    }
}

/// `performance` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerformanceSettings {
    /// Shows and deletions processed concurrently.
    #[serde(default = "defaults::parallelism")]
    pub parallelism: i64,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            parallelism: defaults::PARALLELISM,
        }
    }
}

/// `sonarr` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SonarrConfig {
    /// Base URL, including any reverse-proxy sub path.
    pub host: String,
    /// API key sent as `X-Api-Key`.
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

impl Debug for SonarrConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SonarrConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `plex` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlexConfig {
    /// Base URL of the media server.
    pub url: String,
    /// Token sent as `X-Plex-Token`.
    #[serde(default)]
    pub token: String,
    /// Per-request timeout.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

impl Debug for PlexConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// `logging` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "defaults::log_level")]
    pub level: String,
    /// Output encoding; inferred from the build profile when absent.
    #[serde(default)]
    pub format: Option<LogFormatSetting>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            format: None,
        }
    }
}

/// One entry of the `shows` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShowEntry {
    /// Title or `tvdb:<id>`.
    pub selector: String,
    /// Backends to consult; every configured backend when absent.
    #[serde(default)]
    pub sources: Option<Vec<SourceKind>>,
    /// Retention override for this show.
    #[serde(default)]
    pub retention_days: Option<i64>,
    /// Floor override for this show.
    #[serde(default)]
    pub min_keep_count: Option<i64>,
    /// Set `false` to exclude the show from cleanup.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Per-show dry run.
    #[serde(default)]
    pub dry_run: Option<bool>,
}
