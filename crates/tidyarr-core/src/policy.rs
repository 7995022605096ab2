//! Retention policy and show-level overrides.

use serde::{Deserialize, Serialize};

/// Per-show rule set governing how long episodes are kept.
///
/// Unsigned fields make `retention_days >= 0` and `min_keep_count >= 0` structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Minimum age in days before an episode becomes eligible.
    pub retention_days: u32,
    /// Evaluate and report only; never delete.
    pub dry_run: bool,
    /// Number of most recent episodes that are always retained (0 disables).
    pub min_keep_count: u32,
    /// Whether the show participates in cleanup at all.
    pub enabled: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: 7,
            dry_run: false,
            min_keep_count: 0,
            enabled: true,
        }
    }
}

impl RetentionPolicy {
    /// Apply backend-provided overrides on top of the configured policy.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ShowOverrides) -> Self {
        if let Some(days) = overrides.retention_days {
            self.retention_days = days;
        }
        if let Some(keep) = overrides.min_keep_count {
            self.min_keep_count = keep;
        }
        if overrides.disabled {
            self.enabled = false;
        }
        self
    }
}

/// Policy adjustments derived from tags or labels attached to a show.
///
/// Recognised labels: `retain-<N>d`, `keep-<N>` and `no-cleanup`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowOverrides {
    /// Replacement retention window in days.
    pub retention_days: Option<u32>,
    /// Replacement floor.
    pub min_keep_count: Option<u32>,
    /// Exclude the show from cleanup.
    pub disabled: bool,
}

impl ShowOverrides {
    /// Parse recognised labels, ignoring anything else.
    #[must_use]
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels.into_iter().fold(Self::default(), |mut acc, label| {
            let label = label.as_ref().trim().to_ascii_lowercase();
            if label == "no-cleanup" {
                acc.disabled = true;
            } else if let Some(days) = label
                .strip_prefix("retain-")
                .and_then(|rest| rest.strip_suffix('d'))
                .and_then(|days| days.parse::<u32>().ok())
            {
                acc.retention_days = Some(acc.retention_days.map_or(days, |cur| cur.max(days)));
            } else if let Some(keep) = label
                .strip_prefix("keep-")
                .and_then(|keep| keep.parse::<u32>().ok())
            {
                acc.min_keep_count = Some(acc.min_keep_count.map_or(keep, |cur| cur.max(keep)));
            }
            acc
        })
    }

    #[must_use]
    /// Whether any override is present.
    pub const fn is_empty(&self) -> bool {
        self.retention_days.is_none() && self.min_keep_count.is_none() && !self.disabled
    }

    /// Combine overrides from two sources, keeping the most conservative values.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            retention_days: max_option(self.retention_days, other.retention_days),
            min_keep_count: max_option(self.min_keep_count, other.min_keep_count),
            disabled: self.disabled || other.disabled,
        }
    }
}

fn max_option(left: Option<u32>, right: Option<u32>) -> Option<u32> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.max(r)),
        (value, None) | (None, value) => value,
    }
}
