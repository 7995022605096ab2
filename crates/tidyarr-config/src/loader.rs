//! Configuration file loading and environment overrides.
//!
//! # Design
//! - Overrides are captured into [`EnvOverrides`] first so they can be applied without
//!   touching the process environment in tests.
//! - Loading always validates; a returned config is ready for [`CleanupConfig::run_plan`].

use std::env;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::CleanupConfig;
use crate::validate::validate;

const DRY_RUN_ENV: &str = "TIDYARR_DRY_RUN";
const SONARR_API_KEY_ENV: &str = "TIDYARR_SONARR_API_KEY";
const PLEX_TOKEN_ENV: &str = "TIDYARR_PLEX_TOKEN";
const LOG_LEVEL_ENV: &str = "TIDYARR_LOG_LEVEL";

/// Values taken from the environment that win over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `TIDYARR_DRY_RUN`, interpreted as a flag.
    pub dry_run: Option<bool>,
    /// `TIDYARR_SONARR_API_KEY`.
    pub sonarr_api_key: Option<String>,
    /// `TIDYARR_PLEX_TOKEN`.
    pub plex_token: Option<String>,
    /// `TIDYARR_LOG_LEVEL`.
    pub log_level: Option<String>,
}

impl EnvOverrides {
    /// Capture overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Capture overrides through `lookup`; blank values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            dry_run: read(DRY_RUN_ENV).map(|value| env_flag_value(Some(&value))),
            sonarr_api_key: read(SONARR_API_KEY_ENV),
            plex_token: read(PLEX_TOKEN_ENV),
            log_level: read(LOG_LEVEL_ENV),
        }
    }
}

fn env_flag_value(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Apply `overrides` on top of a parsed document.
///
/// Credentials only apply to backends that have a section in the file.
pub fn apply_overrides(config: &mut CleanupConfig, overrides: &EnvOverrides) {
    if let Some(dry_run) = overrides.dry_run {
        debug!(variable = DRY_RUN_ENV, dry_run, "environment override applied");
        config.cleanup.dry_run = dry_run;
    }
    if let (Some(key), Some(sonarr)) = (&overrides.sonarr_api_key, config.sonarr.as_mut()) {
        debug!(variable = SONARR_API_KEY_ENV, "environment override applied");
        sonarr.api_key.clone_from(key);
    }
    if let (Some(token), Some(plex)) = (&overrides.plex_token, config.plex.as_mut()) {
        debug!(variable = PLEX_TOKEN_ENV, "environment override applied");
        plex.token.clone_from(token);
    }
    if let Some(level) = &overrides.log_level {
        debug!(variable = LOG_LEVEL_ENV, "environment override applied");
        config.logging.level.clone_from(level);
    }
}

/// Parse a YAML document without validating it.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the text does not match the model.
pub fn from_yaml_str(text: &str) -> ConfigResult<CleanupConfig> {
    if text.trim().is_empty() {
        return Ok(CleanupConfig::default());
    }
    serde_yaml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })
}

/// Read, override and validate the configuration at `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or when validation fails.
pub fn load(path: impl AsRef<Path>) -> ConfigResult<CleanupConfig> {
    load_with(path.as_ref(), &EnvOverrides::from_env())
}

pub(crate) fn load_with(path: &Path, overrides: &EnvOverrides) -> ConfigResult<CleanupConfig> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = from_yaml_str(&text).map_err(|err| match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })?;
    apply_overrides(&mut config, overrides);
    validate(&config)?;
    info!(
        path = %path.display(),
        shows = config.shows.len(),
        sources = ?config.configured_sources(),
        "configuration loaded"
    );
    Ok(config)
}
