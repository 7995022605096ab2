//! Retention Evaluator.
//!
//! # Design
//! - Pure and synchronous: no I/O, `now` is an argument.
//! - Fixed order: disabled check, timestamp check, age check, floor check.
//! - The floor protects the `min_keep_count` most recent timestamped episodes,
//!   so it can only ever turn an age-eligible DELETE into SKIP_PROTECTED.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tidyarr_core::{
    Decision, DecisionReason, DeletionDecision, EpisodeIdentity, EpisodeRecord, RetentionPolicy,
};

/// A show's episodes ordered oldest first, with undated episodes last.
#[derive(Debug, Clone)]
pub struct ShowContext {
    episodes: Vec<EpisodeRecord>,
    ranks: BTreeMap<EpisodeIdentity, usize>,
    dated: usize,
}

impl ShowContext {
    /// Sort `episodes` by age reference (ties broken by identity) and index their ranks.
    #[must_use]
    pub fn new(mut episodes: Vec<EpisodeRecord>) -> Self {
        episodes.sort_by(|left, right| {
            match (left.age_reference(), right.age_reference()) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| left.identity.cmp(&right.identity))
        });
        let dated = episodes
            .iter()
            .take_while(|episode| episode.age_reference().is_some())
            .count();
        let ranks = episodes
            .iter()
            .take(dated)
            .enumerate()
            .map(|(rank, episode)| (episode.identity.clone(), rank))
            .collect();
        Self {
            episodes,
            ranks,
            dated,
        }
    }

    #[must_use]
    /// Episodes in evaluation order.
    pub fn episodes(&self) -> &[EpisodeRecord] {
        &self.episodes
    }

    /// Oldest-first rank among timestamped episodes.
    #[must_use]
    pub fn rank(&self, identity: &EpisodeIdentity) -> Option<usize> {
        self.ranks.get(identity).copied()
    }

    /// Whether the episode is among the `keep` most recent timestamped episodes.
    #[must_use]
    pub fn is_floor_protected(&self, identity: &EpisodeIdentity, keep: u32) -> bool {
        let keep = usize::try_from(keep).unwrap_or(usize::MAX);
        self.rank(identity)
            .is_some_and(|rank| rank >= self.dated.saturating_sub(keep))
    }
}

/// Decide the fate of one episode.
#[must_use]
pub fn evaluate_episode(
    episode: &EpisodeRecord,
    policy: &RetentionPolicy,
    context: &ShowContext,
    now: DateTime<Utc>,
) -> DeletionDecision {
    let age_days = episode.age_days(now);
    let (decision, reason) = match age_days {
        _ if !policy.enabled => (Decision::Keep, DecisionReason::ShowDisabled),
        None => (Decision::SkipUndetermined, DecisionReason::NoTimestamp),
        Some(age) if age < i64::from(policy.retention_days) => {
            (Decision::Keep, DecisionReason::WithinRetention)
        }
        Some(_) if context.is_floor_protected(&episode.identity, policy.min_keep_count) => {
            (Decision::SkipProtected, DecisionReason::FloorProtected)
        }
        Some(_) => (Decision::Delete, DecisionReason::Expired),
    };
    DeletionDecision {
        episode: episode.clone(),
        decision,
        reason,
        policy: *policy,
        age_days,
    }
}

/// Evaluate every episode of a show, in oldest-first order.
#[must_use]
pub fn evaluate_show(
    episodes: Vec<EpisodeRecord>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<DeletionDecision> {
    let context = ShowContext::new(episodes);
    context
        .episodes()
        .iter()
        .map(|episode| evaluate_episode(episode, policy, &context, now))
        .collect()
}
