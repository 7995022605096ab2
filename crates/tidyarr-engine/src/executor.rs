//! Deletion Executor.
//!
//! # Design
//! - One attempt per episode, routed to the authoritative adapter with its native reference.
//! - Failures and panics are captured per item; siblings keep running.
//! - Dispatch is bounded by a semaphore and stops once cancellation is observed; deletes
//!   already holding a permit run to completion.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::join_all;
use tidyarr_core::{
    DeleteOutcome, DeleteTarget, EpisodeRecord, ExecutionOutcome, ExecutionRecord, SourceKind,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::SourceRegistry;

/// Executes approved deletions against registered adapters.
#[derive(Debug)]
pub struct DeletionExecutor<'a> {
    registry: &'a SourceRegistry,
    parallelism: usize,
}

impl<'a> DeletionExecutor<'a> {
    /// Executor dispatching at most `parallelism` deletes at once.
    #[must_use]
    pub fn new(registry: &'a SourceRegistry, parallelism: usize) -> Self {
        Self {
            registry,
            parallelism: parallelism.max(1),
        }
    }

    /// Delete every episode, returning one record per input in input order.
    pub async fn execute(
        &self,
        episodes: &[EpisodeRecord],
        cancel: &CancellationToken,
    ) -> Vec<ExecutionRecord> {
        let permits = Semaphore::new(self.parallelism);
        let dispatches = episodes
            .iter()
            .map(|episode| self.dispatch(episode, &permits, cancel));
        join_all(dispatches).await
    }

    async fn dispatch(
        &self,
        episode: &EpisodeRecord,
        permits: &Semaphore,
        cancel: &CancellationToken,
    ) -> ExecutionRecord {
        let Ok(_permit) = permits.acquire().await else {
            return not_dispatched(episode);
        };
        if cancel.is_cancelled() {
            debug!(episode = %episode.identity, "cancellation observed; not dispatching");
            return not_dispatched(episode);
        }
        self.delete_one(episode).await
    }

    /// Make the single delete attempt for `episode`.
    pub async fn delete_one(&self, episode: &EpisodeRecord) -> ExecutionRecord {
        let kind = episode.authority;
        let Some(source) = self.registry.get(kind) else {
            return failed(episode, kind, format!("no {kind} adapter registered"));
        };
        let Some(source_ref) = episode.source_ref(kind) else {
            return failed(episode, kind, format!("no {kind} reference recorded"));
        };
        let target = DeleteTarget {
            identity: episode.identity.clone(),
            source_ref: source_ref.to_string(),
            file_path: episode.file_path.clone(),
        };

        let attempt = AssertUnwindSafe(source.delete_episode(&target))
            .catch_unwind()
            .await;
        match attempt {
            Ok(Ok(outcome)) => {
                let already_absent = outcome == DeleteOutcome::AlreadyAbsent;
                let bytes_freed = if already_absent {
                    0
                } else {
                    episode.file_size_bytes
                };
                info!(
                    episode = %episode.identity,
                    source = %kind,
                    bytes = bytes_freed,
                    already_absent,
                    "episode deleted"
                );
                ExecutionRecord {
                    identity: episode.identity.clone(),
                    source: kind,
                    outcome: ExecutionOutcome::Deleted,
                    already_absent,
                    bytes_freed,
                    cause: None,
                }
            }
            Ok(Err(err)) => failed(episode, kind, err.describe()),
            Err(panic) => failed(
                episode,
                kind,
                format!("adapter panicked: {}", panic_message(panic.as_ref())),
            ),
        }
    }
}

/// Record for a DELETE suppressed by dry run.
pub(crate) fn dry_run_record(episode: &EpisodeRecord) -> ExecutionRecord {
    info!(episode = %episode.identity, source = %episode.authority, "dry run; would delete");
    ExecutionRecord {
        identity: episode.identity.clone(),
        source: episode.authority,
        outcome: ExecutionOutcome::DryRunSkipped,
        already_absent: false,
        bytes_freed: 0,
        cause: None,
    }
}

fn not_dispatched(episode: &EpisodeRecord) -> ExecutionRecord {
    ExecutionRecord {
        identity: episode.identity.clone(),
        source: episode.authority,
        outcome: ExecutionOutcome::NotDispatched,
        already_absent: false,
        bytes_freed: 0,
        cause: Some("run cancelled before dispatch".to_string()),
    }
}

fn failed(episode: &EpisodeRecord, kind: SourceKind, cause: String) -> ExecutionRecord {
    warn!(episode = %episode.identity, source = %kind, cause = %cause, "episode delete failed");
    ExecutionRecord {
        identity: episode.identity.clone(),
        source: kind,
        outcome: ExecutionOutcome::Failed,
        already_absent: false,
        bytes_freed: 0,
        cause: Some(cause),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
