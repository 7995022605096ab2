//! Field validation and conversion into the engine's run plan.
//!
//! # Design
//! - Every failure is a [`ConfigError::InvalidField`] naming the section and field.
//! - Validation stops at the first failure in document order.

use std::collections::HashSet;
use std::time::Duration;

use tidyarr_core::{RetentionPolicy, RunDefaults, RunPlan, ShowPlan, ShowSelector, SourceKind};
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{CleanupConfig, PlexConfig, ShowEntry, SonarrConfig};

/// Check every rule the document must satisfy.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate(config: &CleanupConfig) -> ConfigResult<()> {
    run_defaults(config)?;
    default_policy(config)?;
    if config.cleanup.delete_empty_dirs && config.cleanup.media_root.is_none() {
        return Err(ConfigError::invalid(
            "cleanup",
            "media_root",
            None,
            "required when delete_empty_dirs is enabled",
        ));
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::invalid(
            "logging",
            "level",
            Some(config.logging.level.clone()),
            "must not be blank",
        ));
    }
    if config.sonarr.is_none() && config.plex.is_none() {
        return Err(ConfigError::invalid(
            "sources",
            "sonarr",
            None,
            "at least one of sonarr or plex must be configured",
        ));
    }
    if let Some(sonarr) = &config.sonarr {
        sonarr.endpoint()?;
        sonarr.timeout()?;
        non_blank("sonarr", "api_key", &sonarr.api_key)?;
    }
    if let Some(plex) = &config.plex {
        plex.endpoint()?;
        plex.timeout()?;
        non_blank("plex", "token", &plex.token)?;
    }

    let configured = config.configured_sources();
    let mut seen = HashSet::new();
    for (index, entry) in config.shows.iter().enumerate() {
        show_plan(config, &configured, index, entry)?;
        if !seen.insert(entry.selector.trim().to_lowercase()) {
            return Err(ConfigError::invalid(
                "shows",
                format!("shows[{index}].selector"),
                Some(entry.selector.clone()),
                "duplicate selector",
            ));
        }
    }
    Ok(())
}

impl CleanupConfig {
    /// Validate and convert into the engine input.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the document is invalid.
    pub fn run_plan(&self) -> ConfigResult<RunPlan> {
        validate(self)?;
        let configured = self.configured_sources();
        let shows = self
            .shows
            .iter()
            .enumerate()
            .map(|(index, entry)| show_plan(self, &configured, index, entry))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(RunPlan {
            defaults: run_defaults(self)?,
            shows,
        })
    }

    /// Plan entry for a show found by daily-series discovery.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the default policy is invalid.
    pub fn discovered_show(&self, selector: ShowSelector) -> ConfigResult<ShowPlan> {
        Ok(ShowPlan {
            selector,
            sources: self.configured_sources(),
            policy: default_policy(self)?,
        })
    }
}

impl SonarrConfig {
    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for unparseable or non-HTTP URLs.
    pub fn endpoint(&self) -> ConfigResult<Url> {
        http_url("sonarr", "host", &self.host)
    }

    /// Request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the timeout is zero.
    pub fn timeout(&self) -> ConfigResult<Duration> {
        timeout("sonarr", self.timeout_secs)
    }
}

impl PlexConfig {
    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for unparseable or non-HTTP URLs.
    pub fn endpoint(&self) -> ConfigResult<Url> {
        http_url("plex", "url", &self.url)
    }

    /// Request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the timeout is zero.
    pub fn timeout(&self) -> ConfigResult<Duration> {
        timeout("plex", self.timeout_secs)
    }
}

fn run_defaults(config: &CleanupConfig) -> ConfigResult<RunDefaults> {
    let parallelism = config.performance.parallelism;
    if parallelism < 1 {
        return Err(ConfigError::invalid(
            "performance",
            "parallelism",
            Some(parallelism.to_string()),
            "must be at least 1",
        ));
    }
    let parallelism = usize::try_from(parallelism).map_err(|_| {
        ConfigError::invalid(
            "performance",
            "parallelism",
            Some(parallelism.to_string()),
            "value out of range",
        )
    })?;
    Ok(RunDefaults {
        dry_run: config.cleanup.dry_run,
        max_deletions_per_run: non_negative(
            "cleanup",
            "max_deletions_per_run",
            config.cleanup.max_deletions_per_run,
        )?,
        parallelism,
        verify_paths: config.cleanup.verify_paths,
        refresh_libraries: config.cleanup.refresh_libraries,
    })
}

fn default_policy(config: &CleanupConfig) -> ConfigResult<RetentionPolicy> {
    Ok(RetentionPolicy {
        retention_days: non_negative(
            "cleanup",
            "default_retention_days",
            config.cleanup.default_retention_days,
        )?,
        dry_run: false,
        min_keep_count: non_negative(
            "cleanup",
            "default_min_keep_count",
            config.cleanup.default_min_keep_count,
        )?,
        enabled: true,
    })
}

fn show_plan(
    config: &CleanupConfig,
    configured: &[SourceKind],
    index: usize,
    entry: &ShowEntry,
) -> ConfigResult<ShowPlan> {
    let field = |name: &str| format!("shows[{index}].{name}");
    non_blank("shows", &field("selector"), &entry.selector)?;

    let sources = match &entry.sources {
        None => configured.to_vec(),
        Some(listed) => {
            if listed.is_empty() {
                return Err(ConfigError::invalid(
                    "shows",
                    field("sources"),
                    None,
                    "must list at least one backend",
                ));
            }
            let mut sources = Vec::with_capacity(listed.len());
            for kind in listed {
                if !configured.contains(kind) {
                    return Err(ConfigError::invalid(
                        "shows",
                        field("sources"),
                        Some(kind.to_string()),
                        "backend not configured",
                    ));
                }
                if !sources.contains(kind) {
                    sources.push(*kind);
                }
            }
            sources
        }
    };

    let mut policy = default_policy(config)?;
    if let Some(days) = entry.retention_days {
        policy.retention_days = non_negative("shows", &field("retention_days"), days)?;
    }
    if let Some(keep) = entry.min_keep_count {
        policy.min_keep_count = non_negative("shows", &field("min_keep_count"), keep)?;
    }
    if let Some(enabled) = entry.enabled {
        policy.enabled = enabled;
    }
    if let Some(dry_run) = entry.dry_run {
        policy.dry_run = dry_run;
    }

    Ok(ShowPlan {
        selector: ShowSelector::new(entry.selector.as_str()),
        sources,
        policy,
    })
}

fn non_negative(section: &str, field: &str, value: i64) -> ConfigResult<u32> {
    if value < 0 {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be non-negative",
        ));
    }
    u32::try_from(value).map_err(|_| {
        ConfigError::invalid(section, field, Some(value.to_string()), "value out of range")
    })
}

fn non_blank(section: &str, field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must not be blank",
        ));
    }
    Ok(())
}

fn http_url(section: &str, field: &str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value.trim()).map_err(|_| {
        ConfigError::invalid(section, field, Some(value.to_string()), "invalid url")
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "url scheme must be http or https",
        ));
    }
    Ok(url)
}

fn timeout(section: &str, secs: u64) -> ConfigResult<Duration> {
    if secs == 0 {
        return Err(ConfigError::invalid(
            section,
            "timeout_secs",
            Some(secs.to_string()),
            "must be at least 1",
        ));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_yaml_str;

    const BASE: &str = r"
sonarr:
  host: http://sonarr:8989
  api_key: key
plex:
  url: http://plex:32400
  token: token
";

    fn parse(extra: &str) -> anyhow::Result<CleanupConfig> {
        Ok(from_yaml_str(&format!("{BASE}{extra}"))?)
    }

    fn rejection(config: &CleanupConfig) -> (String, String, &'static str) {
        match validate(config) {
            Err(ConfigError::InvalidField {
                section,
                field,
                reason,
                ..
            }) => (section, field, reason),
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn defaults_produce_a_conservative_plan() -> anyhow::Result<()> {
        let plan = parse("shows:\n  - selector: Daily News\n")?.run_plan()?;
        assert_eq!(plan.defaults, RunDefaults::default());
        assert_eq!(plan.shows.len(), 1);
        let show = &plan.shows[0];
        assert_eq!(show.selector.as_str(), "Daily News");
        assert_eq!(show.sources, vec![SourceKind::Plex, SourceKind::Sonarr]);
        assert_eq!(show.policy, RetentionPolicy::default());
        Ok(())
    }

    #[test]
    fn show_entries_override_defaults() -> anyhow::Result<()> {
        let config = parse(
            r"
cleanup:
  default_retention_days: 10
  default_min_keep_count: 2
shows:
  - selector: tvdb:71256
    sources: [sonarr, sonarr]
    retention_days: 3
    dry_run: true
  - selector: Late Show
    enabled: false
",
        )?;
        let plan = config.run_plan()?;
        assert_eq!(plan.shows[0].sources, vec![SourceKind::Sonarr]);
        assert_eq!(plan.shows[0].policy.retention_days, 3);
        assert_eq!(plan.shows[0].policy.min_keep_count, 2);
        assert!(plan.shows[0].policy.dry_run);
        assert_eq!(plan.shows[1].policy.retention_days, 10);
        assert!(!plan.shows[1].policy.enabled);
        Ok(())
    }

    #[test]
    fn negative_numbers_are_rejected() -> anyhow::Result<()> {
        let config = parse("cleanup:\n  default_retention_days: -1\n")?;
        assert_eq!(
            rejection(&config),
            ("cleanup".into(), "default_retention_days".into(), "must be non-negative")
        );

        let config = parse("cleanup:\n  max_deletions_per_run: -5\n")?;
        assert_eq!(rejection(&config).1, "max_deletions_per_run");

        let config = parse("shows:\n  - selector: News\n    min_keep_count: -2\n")?;
        assert_eq!(rejection(&config).1, "shows[0].min_keep_count");
        Ok(())
    }

    #[test]
    fn parallelism_must_be_positive() -> anyhow::Result<()> {
        let config = parse("performance:\n  parallelism: 0\n")?;
        assert_eq!(
            rejection(&config),
            ("performance".into(), "parallelism".into(), "must be at least 1")
        );
        Ok(())
    }

    #[test]
    fn selectors_must_be_present_and_unique() -> anyhow::Result<()> {
        let config = parse("shows:\n  - selector: '  '\n")?;
        assert_eq!(rejection(&config).2, "must not be blank");

        let config = parse("shows:\n  - selector: News\n  - selector: ' news '\n")?;
        assert_eq!(
            rejection(&config),
            ("shows".into(), "shows[1].selector".into(), "duplicate selector")
        );
        Ok(())
    }

    #[test]
    fn shows_may_only_reference_configured_backends() -> anyhow::Result<()> {
        let config = from_yaml_str(
            "sonarr:\n  host: http://sonarr:8989\n  api_key: key\nshows:\n  - selector: News\n    sources: [plex]\n",
        )?;
        assert_eq!(
            rejection(&config),
            ("shows".into(), "shows[0].sources".into(), "backend not configured")
        );
        Ok(())
    }

    #[test]
    fn a_backend_is_required() -> anyhow::Result<()> {
        let config = from_yaml_str("shows:\n  - selector: News\n")?;
        assert_eq!(rejection(&config).0, "sources");
        Ok(())
    }

    #[test]
    fn backend_sections_are_checked() -> anyhow::Result<()> {
        let config = from_yaml_str("sonarr:\n  host: not a url\n  api_key: key\n")?;
        assert_eq!(
            rejection(&config),
            ("sonarr".into(), "host".into(), "invalid url")
        );

        let config = from_yaml_str("plex:\n  url: ftp://plex\n  token: token\n")?;
        assert_eq!(rejection(&config).2, "url scheme must be http or https");

        let config = from_yaml_str("plex:\n  url: http://plex:32400\n  token: ''\n")?;
        assert_eq!(
            rejection(&config),
            ("plex".into(), "token".into(), "must not be blank")
        );

        let config = from_yaml_str("sonarr:\n  host: http://sonarr\n  api_key: key\n  timeout_secs: 0\n")?;
        assert_eq!(rejection(&config).1, "timeout_secs");
        Ok(())
    }

    #[test]
    fn pruning_requires_a_media_root() -> anyhow::Result<()> {
        let config = parse("cleanup:\n  delete_empty_dirs: true\n")?;
        assert_eq!(rejection(&config).1, "media_root");
        let config = parse("cleanup:\n  delete_empty_dirs: true\n  media_root: /tv\n")?;
        validate(&config)?;
        Ok(())
    }

    #[test]
    fn discovered_shows_use_defaults_and_all_backends() -> anyhow::Result<()> {
        let config = parse("shows:\n  - selector: Daily News\n")?;

        let plan = config.discovered_show(ShowSelector::new("Late Show"))?;
        assert_eq!(plan.sources, config.configured_sources());
        assert_eq!(plan.policy, RetentionPolicy::default());
        Ok(())
    }
}
