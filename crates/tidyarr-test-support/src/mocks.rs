//! In-memory `EpisodeSource` with failure injection for engine tests.

use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tidyarr_core::{
    DeleteOutcome, DeleteTarget, DiscoveredShow, EpisodeSource, EpisodeStream, RawEpisode,
    ShowMetadata, ShowOverrides, ShowSelector, SourceError, SourceKind, SourceResult,
};
use tokio::sync::Mutex;

/// Callback invoked when the engine lists a show.
pub type ListHook = Arc<dyn Fn(&ShowSelector) + Send + Sync>;
/// Callback invoked before a delete is applied.
pub type DeleteHook = Arc<dyn Fn(&DeleteTarget) + Send + Sync>;

struct MemoryShow {
    selector: ShowSelector,
    series_type: Option<String>,
    overrides: ShowOverrides,
    episodes: Vec<RawEpisode>,
}

#[derive(Default)]
struct MemoryState {
    shows: Vec<MemoryShow>,
    daily: Vec<DiscoveredShow>,
    unavailable: bool,
    failing_refs: BTreeSet<String>,
    panicking_refs: BTreeSet<String>,
    stream_fail_after: Option<usize>,
    refresh_fails: bool,
    deleted: Vec<String>,
    delete_calls: usize,
    refreshes: usize,
}

impl MemoryState {
    fn show(&self, selector: &ShowSelector) -> Option<&MemoryShow> {
        self.shows
            .iter()
            .find(|show| show.selector.matches_title(selector.as_str()))
    }

    fn show_mut(&mut self, selector: &ShowSelector) -> Option<&mut MemoryShow> {
        self.shows
            .iter_mut()
            .find(|show| show.selector.matches_title(selector.as_str()))
    }
}

/// Source adapter backed by an in-memory library.
///
/// Deletes remove the entry, so repeating a delete reports `AlreadyAbsent`.
pub struct MemorySource {
    kind: SourceKind,
    state: Mutex<MemoryState>,
    on_list: Option<ListHook>,
    on_delete: Option<DeleteHook>,
}

impl MemorySource {
    /// Empty library for `kind`.
    #[must_use]
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            state: Mutex::new(MemoryState::default()),
            on_list: None,
            on_delete: None,
        }
    }

    /// Add a show with its raw entries.
    #[must_use]
    pub fn with_show(mut self, selector: &ShowSelector, episodes: Vec<RawEpisode>) -> Self {
        self.state.get_mut().shows.push(MemoryShow {
            selector: selector.clone(),
            series_type: Some("daily".to_string()),
            overrides: ShowOverrides::default(),
            episodes,
        });
        self
    }

    /// Attach overrides to a previously added show.
    #[must_use]
    pub fn with_overrides(mut self, selector: &ShowSelector, overrides: ShowOverrides) -> Self {
        if let Some(show) = self.state.get_mut().show_mut(selector) {
            show.overrides = overrides;
        }
        self
    }

    /// Shows reported by `discover_daily_shows`.
    #[must_use]
    pub fn with_daily(mut self, shows: Vec<DiscoveredShow>) -> Self {
        self.state.get_mut().daily = shows;
        self
    }

    /// Start in the unreachable state.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.state.get_mut().unavailable = true;
        self
    }

    /// Reject deletes for the given native reference.
    #[must_use]
    pub fn failing_ref(mut self, reference: impl Into<String>) -> Self {
        self.state.get_mut().failing_refs.insert(reference.into());
        self
    }

    /// Panic while deleting the given native reference.
    #[must_use]
    pub fn panicking_ref(mut self, reference: impl Into<String>) -> Self {
        self.state.get_mut().panicking_refs.insert(reference.into());
        self
    }

    /// Fail enumeration after yielding `count` entries.
    #[must_use]
    pub fn failing_stream_after(mut self, count: usize) -> Self {
        self.state.get_mut().stream_fail_after = Some(count);
        self
    }

    /// Reject library refresh requests.
    #[must_use]
    pub fn failing_refresh(mut self) -> Self {
        self.state.get_mut().refresh_fails = true;
        self
    }

    /// Invoke `hook` whenever a show is listed.
    #[must_use]
    pub fn on_list(mut self, hook: ListHook) -> Self {
        self.on_list = Some(hook);
        self
    }

    /// Invoke `hook` before each delete is applied.
    #[must_use]
    pub fn on_delete(mut self, hook: DeleteHook) -> Self {
        self.on_delete = Some(hook);
        self
    }

    /// Toggle reachability at runtime.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Native references removed so far, in deletion order.
    pub async fn deleted_refs(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    /// Number of delete calls received, including failed and repeated ones.
    pub async fn delete_calls(&self) -> usize {
        self.state.lock().await.delete_calls
    }

    /// Number of library refresh calls received.
    pub async fn refresh_count(&self) -> usize {
        self.state.lock().await.refreshes
    }

    /// Entries still present for a show.
    pub async fn remaining(&self, selector: &ShowSelector) -> Vec<RawEpisode> {
        self.state
            .lock()
            .await
            .show(selector)
            .map(|show| show.episodes.clone())
            .unwrap_or_default()
    }

    fn unreachable_error(&self, operation: &'static str) -> SourceError {
        SourceError::unavailable(
            self.kind,
            operation,
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        )
    }

    fn missing_show(&self, operation: &'static str, selector: &ShowSelector) -> SourceError {
        SourceError::NotFound {
            adapter: self.kind,
            operation,
            reference: selector.to_string(),
        }
    }
}

#[async_trait]
impl EpisodeSource for MemorySource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn list_episodes<'a>(&'a self, selector: &'a ShowSelector) -> EpisodeStream<'a> {
        Box::pin(async_stream::stream! {
            if let Some(hook) = &self.on_list {
                hook(selector);
            }
            let snapshot = {
                let state = self.state.lock().await;
                if state.unavailable {
                    Err(self.unreachable_error("list_episodes"))
                } else {
                    state
                        .show(selector)
                        .map(|show| (show.episodes.clone(), state.stream_fail_after))
                        .ok_or_else(|| self.missing_show("list_episodes", selector))
                }
            };
            match snapshot {
                Err(err) => yield Err(err),
                Ok((episodes, fail_after)) => {
                    for (index, episode) in episodes.into_iter().enumerate() {
                        if fail_after == Some(index) {
                            yield Err(self.unreachable_error("list_episodes"));
                            break;
                        }
                        yield Ok(episode);
                    }
                }
            }
        })
    }

    async fn delete_episode(&self, target: &DeleteTarget) -> SourceResult<DeleteOutcome> {
        if let Some(hook) = &self.on_delete {
            hook(target);
        }
        let mut state = self.state.lock().await;
        state.delete_calls += 1;
        if state.unavailable {
            return Err(self.unreachable_error("delete_episode"));
        }
        if state.panicking_refs.contains(&target.source_ref) {
            drop(state);
            panic!("memory source panicked deleting {}", target.source_ref);
        }
        if state.failing_refs.contains(&target.source_ref) {
            return Err(SourceError::Rejected {
                adapter: self.kind,
                operation: "delete_episode",
                status: 500,
            });
        }

        let removed = state.show_mut(target.identity.show()).is_some_and(|show| {
            let before = show.episodes.len();
            show.episodes
                .retain(|episode| episode.source_ref != target.source_ref);
            show.episodes.len() < before
        });
        if removed {
            state.deleted.push(target.source_ref.clone());
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::AlreadyAbsent)
        }
    }

    async fn describe_show(&self, selector: &ShowSelector) -> SourceResult<ShowMetadata> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(self.unreachable_error("describe_show"));
        }
        let show = state
            .show(selector)
            .ok_or_else(|| self.missing_show("describe_show", selector))?;
        Ok(ShowMetadata {
            selector: selector.clone(),
            native_id: show.selector.to_string(),
            title: show.selector.to_string(),
            series_type: show.series_type.clone(),
            overrides: show.overrides,
        })
    }

    async fn probe(&self) -> SourceResult<()> {
        if self.state.lock().await.unavailable {
            return Err(self.unreachable_error("probe"));
        }
        Ok(())
    }

    async fn refresh_library(&self) -> SourceResult<()> {
        let mut state = self.state.lock().await;
        state.refreshes += 1;
        if state.unavailable {
            return Err(self.unreachable_error("refresh_library"));
        }
        if state.refresh_fails {
            return Err(SourceError::Rejected {
                adapter: self.kind,
                operation: "refresh_library",
                status: 503,
            });
        }
        Ok(())
    }

    async fn discover_daily_shows(&self) -> SourceResult<Vec<DiscoveredShow>> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(self.unreachable_error("discover_daily_shows"));
        }
        Ok(state.daily.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{aired_episodes, reference_now};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn deletes_are_idempotent() -> anyhow::Result<()> {
        let show = ShowSelector::new("News");
        let episodes = aired_episodes(SourceKind::Sonarr, &show, &[1, 2], reference_now());
        let source = MemorySource::new(SourceKind::Sonarr).with_show(&show, episodes);
        let target = DeleteTarget {
            identity: tidyarr_core::EpisodeIdentity::Numbered {
                show: show.clone(),
                season: 1,
                episode: 1,
            },
            source_ref: "sonarr-1".into(),
            file_path: None,
        };
        assert_eq!(source.delete_episode(&target).await?, DeleteOutcome::Deleted);
        assert_eq!(
            source.delete_episode(&target).await?,
            DeleteOutcome::AlreadyAbsent
        );
        assert_eq!(source.deleted_refs().await, vec!["sonarr-1".to_string()]);
        assert_eq!(source.delete_calls().await, 2);
        assert_eq!(source.remaining(&show).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn stream_failure_surfaces_after_partial_data() {
        let show = ShowSelector::new("News");
        let episodes = aired_episodes(SourceKind::Plex, &show, &[1, 2, 3], reference_now());
        let source = MemorySource::new(SourceKind::Plex)
            .with_show(&show, episodes)
            .failing_stream_after(2);
        let items: Vec<_> = source.list_episodes(&show).collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(&items[2], Err(err) if err.is_unavailable()));
    }

    #[tokio::test]
    async fn unavailable_source_fails_every_operation() {
        let show = ShowSelector::new("News");
        let source = MemorySource::new(SourceKind::Plex)
            .with_show(&show, Vec::new())
            .unavailable();
        assert!(source.probe().await.is_err());
        assert!(source.describe_show(&show).await.is_err());
        source.set_unavailable(false).await;
        assert!(source.probe().await.is_ok());
    }
}
