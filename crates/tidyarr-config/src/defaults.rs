//! Default values applied when a configuration field is omitted.
//!
//! # Design
//! - Keep every default in one place so the model and its docs agree.

pub(crate) const MAX_DELETIONS_PER_RUN: i64 = 100;
pub(crate) const RETENTION_DAYS: i64 = 7;
pub(crate) const PARALLELISM: i64 = 4;
/// Request timeout for backend HTTP calls, in seconds.
pub(crate) const TIMEOUT_SECS: u64 = 30;
pub(crate) const LOG_LEVEL: &str = "info";
/// Location of the configuration file inside the container image.
pub const CONFIG_PATH: &str = "/config/config.yaml";

pub(crate) const fn max_deletions_per_run() -> i64 {
    MAX_DELETIONS_PER_RUN
}

pub(crate) const fn retention_days() -> i64 {
    RETENTION_DAYS
}

pub(crate) const fn parallelism() -> i64 {
    PARALLELISM
}

pub(crate) const fn timeout_secs() -> u64 {
    TIMEOUT_SECS
}

pub(crate) const fn enabled() -> bool {
    true
}

pub(crate) fn log_level() -> String {
    LOG_LEVEL.to_string()
}
