//! Capability set implemented by every source adapter.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::error::{SourceError, SourceResult};
use crate::model::{
    DiscoveredShow, EpisodeIdentity, RawEpisode, ShowMetadata, ShowSelector, SourceKind,
};

/// Lazy sequence of raw entries for one show.
///
/// Each call to [`EpisodeSource::list_episodes`] starts a fresh enumeration.
pub type EpisodeStream<'a> = Pin<Box<dyn Stream<Item = SourceResult<RawEpisode>> + Send + 'a>>;

/// Item handed to an adapter for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTarget {
    /// Merged identity of the episode.
    pub identity: EpisodeIdentity,
    /// Adapter-native reference recorded at inventory time.
    pub source_ref: String,
    /// File location recorded at inventory time.
    pub file_path: Option<PathBuf>,
}

/// Successful delete result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The adapter removed the item.
    Deleted,
    /// The item was already gone; treated as success.
    AlreadyAbsent,
}

/// Uniform read/delete capability over a metadata backend.
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    /// Backend this adapter talks to.
    fn kind(&self) -> SourceKind;

    /// Enumerate the raw entries for a show.
    ///
    /// Yields `SourceError::Unavailable` when the backend cannot be reached.
    fn list_episodes<'a>(&'a self, selector: &'a ShowSelector) -> EpisodeStream<'a>;

    /// Delete one item. Deleting an absent item returns `DeleteOutcome::AlreadyAbsent`.
    async fn delete_episode(&self, target: &DeleteTarget) -> SourceResult<DeleteOutcome>;

    /// Resolve show metadata, including show-level overrides.
    async fn describe_show(&self, selector: &ShowSelector) -> SourceResult<ShowMetadata>;

    /// Cheap reachability check used by the health probe.
    async fn probe(&self) -> SourceResult<()>;

    /// Ask the backend to rescan its library after files were removed.
    async fn refresh_library(&self) -> SourceResult<()> {
        Ok(())
    }

    /// List shows the backend classifies as daily; default reports lack of support.
    async fn discover_daily_shows(&self) -> SourceResult<Vec<DiscoveredShow>> {
        Err(SourceError::Unsupported {
            adapter: self.kind(),
            operation: "discover_daily_shows",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ShowOverrides;
    use tokio_stream::StreamExt;

    struct StubSource;

    #[async_trait]
    impl EpisodeSource for StubSource {
        fn kind(&self) -> SourceKind {
            SourceKind::Plex
        }

        fn list_episodes<'a>(&'a self, _selector: &'a ShowSelector) -> EpisodeStream<'a> {
            Box::pin(tokio_stream::iter(vec![Ok(RawEpisode::new(
                SourceKind::Plex,
                "1",
            ))]))
        }

        async fn delete_episode(&self, _target: &DeleteTarget) -> SourceResult<DeleteOutcome> {
            Ok(DeleteOutcome::AlreadyAbsent)
        }

        async fn describe_show(&self, selector: &ShowSelector) -> SourceResult<ShowMetadata> {
            Ok(ShowMetadata {
                selector: selector.clone(),
                native_id: "1".into(),
                title: selector.to_string(),
                series_type: None,
                overrides: ShowOverrides::default(),
            })
        }

        async fn probe(&self) -> SourceResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_capabilities() -> anyhow::Result<()> {
        let source = StubSource;
        source.refresh_library().await?;
        let err = source
            .discover_daily_shows()
            .await
            .expect_err("discovery should be unsupported");
        assert!(matches!(err, SourceError::Unsupported { .. }));

        let selector = ShowSelector::new("News");
        let first: Vec<_> = source.list_episodes(&selector).collect().await;
        let second: Vec<_> = source.list_episodes(&selector).collect().await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1, "enumeration restarts on every call");
        Ok(())
    }
}
