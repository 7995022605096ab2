//! Plex Media Server adapter.
//!
//! Native references are episode `ratingKey`s. Show resolution scans every `show`
//! library section; labels on the show entry become overrides.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tidyarr_core::{
    DeleteOutcome, DeleteTarget, EpisodeSource, EpisodeStream, RawEpisode, ShowMetadata,
    ShowOverrides, ShowSelector, SourceError, SourceKind, SourceResult, WatchStatus,
};
use tracing::{debug, info};
use url::Url;

use crate::http::HttpClient;

const KIND: SourceKind = SourceKind::Plex;

/// Connection settings for a Plex server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlexSettings {
    /// Base URL, e.g. `http://plex:32400`.
    pub url: Url,
    /// Token sent as `X-Plex-Token`.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Debug, Deserialize)]
struct SectionList {
    #[serde(rename = "Directory", default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct MetadataList<T> {
    #[serde(rename = "Metadata", default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct Guid {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowEntry {
    rating_key: String,
    title: String,
    #[serde(rename = "Guid", default)]
    guids: Vec<Guid>,
    #[serde(rename = "Label", default)]
    labels: Vec<Tag>,
}

impl ShowEntry {
    fn matches(&self, selector: &ShowSelector) -> bool {
        selector.tvdb_id().map_or_else(
            || selector.matches_title(&self.title),
            |id| {
                let wanted = format!("tvdb://{id}");
                self.guids.iter().any(|guid| guid.id == wanted)
            },
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeEntry {
    rating_key: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    parent_index: Option<u32>,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    originally_available_at: Option<String>,
    #[serde(default)]
    added_at: Option<i64>,
    #[serde(default)]
    view_count: Option<u32>,
    #[serde(default)]
    last_viewed_at: Option<i64>,
    #[serde(rename = "Media", default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(rename = "Part", default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl EpisodeEntry {
    fn into_raw(self) -> RawEpisode {
        let part = self.media.iter().flat_map(|media| &media.parts).next();
        let mut raw = RawEpisode::new(KIND, self.rating_key.clone());
        raw.season = self.parent_index;
        raw.episode = self.index;
        raw.air_date = self.originally_available_at.as_deref().and_then(parse_air_date);
        raw.added_date = self.added_at.and_then(|secs| DateTime::from_timestamp(secs, 0));
        raw.file_path = part.and_then(|part| part.file.as_ref().map(PathBuf::from));
        raw.file_size_bytes = part.and_then(|part| part.size);
        raw.watch_status = Some(match self.view_count {
            Some(count) if count > 0 => WatchStatus::Watched {
                view_count: count,
                last_viewed_at: self
                    .last_viewed_at
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            },
            _ => WatchStatus::Unwatched,
        });
        raw.title = self.title;
        raw
    }
}

fn parse_air_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `EpisodeSource` over the Plex Media Server HTTP API.
#[derive(Debug, Clone)]
pub struct PlexSource {
    http: HttpClient,
}

impl PlexSource {
    /// Build an adapter for the given server.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Unavailable` when the HTTP client cannot be constructed.
    pub fn new(settings: &PlexSettings) -> SourceResult<Self> {
        let http = HttpClient::new(
            KIND,
            settings.url.clone(),
            "x-plex-token",
            &settings.token,
            settings.timeout,
        )?;
        Ok(Self { http })
    }

    async fn show_sections(&self, operation: &'static str) -> SourceResult<Vec<Section>> {
        let sections: Envelope<SectionList> =
            self.http.get_json(operation, "/library/sections", &[]).await?;
        Ok(sections
            .container
            .sections
            .into_iter()
            .filter(|section| section.kind == "show")
            .collect())
    }

    async fn resolve(
        &self,
        operation: &'static str,
        selector: &ShowSelector,
    ) -> SourceResult<ShowEntry> {
        let query = [("type", "2".to_string()), ("includeGuids", "1".to_string())];
        for section in self.show_sections(operation).await? {
            let path = format!("/library/sections/{}/all", section.key);
            let shows: Envelope<MetadataList<ShowEntry>> =
                self.http.get_json(operation, &path, &query).await?;
            if let Some(show) = shows
                .container
                .items
                .into_iter()
                .find(|show| show.matches(selector))
            {
                debug!(show = %selector, section = %section.title, "plex show resolved");
                return Ok(show);
            }
        }
        Err(SourceError::NotFound {
            adapter: KIND,
            operation,
            reference: selector.to_string(),
        })
    }
}

#[async_trait]
impl EpisodeSource for PlexSource {
    fn kind(&self) -> SourceKind {
        self.http.kind()
    }

    fn list_episodes<'a>(&'a self, selector: &'a ShowSelector) -> EpisodeStream<'a> {
        Box::pin(async_stream::try_stream! {
            let show = self.resolve("list_episodes", selector).await?;
            let path = format!("/library/metadata/{}/allLeaves", show.rating_key);
            let leaves: Envelope<MetadataList<EpisodeEntry>> =
                self.http.get_json("list_episodes", &path, &[]).await?;
            for entry in leaves.container.items {
                yield entry.into_raw();
            }
        })
    }

    async fn delete_episode(&self, target: &DeleteTarget) -> SourceResult<DeleteOutcome> {
        let path = format!("/library/metadata/{}", target.source_ref);
        self.http.delete("delete_episode", &path).await
    }

    async fn describe_show(&self, selector: &ShowSelector) -> SourceResult<ShowMetadata> {
        let show = self.resolve("describe_show", selector).await?;
        Ok(ShowMetadata {
            selector: selector.clone(),
            native_id: show.rating_key,
            title: show.title,
            series_type: None,
            overrides: ShowOverrides::from_labels(show.labels.iter().map(|label| &label.tag)),
        })
    }

    async fn probe(&self) -> SourceResult<()> {
        self.http.get("probe", "/identity").await
    }

    async fn refresh_library(&self) -> SourceResult<()> {
        for section in self.show_sections("refresh_library").await? {
            let path = format!("/library/sections/{}/refresh", section.key);
            self.http.get("refresh_library", &path).await?;
            info!(section = %section.title, "plex library refresh requested");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::DELETE;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;
    use tidyarr_core::EpisodeIdentity;
    use tokio_stream::StreamExt;

    fn source(server: &MockServer) -> anyhow::Result<PlexSource> {
        Ok(PlexSource::new(&PlexSettings {
            url: Url::parse(&server.base_url())?,
            token: "plex-token".into(),
            timeout: Duration::from_secs(5),
        })?)
    }

    #[test]
    fn metadata_list_tolerates_missing_items() -> anyhow::Result<()> {
        let empty: MetadataList<Tag> = serde_json::from_value(json!({}))?;
        assert!(empty.items.is_empty());
        let tagged: MetadataList<Tag> =
            serde_json::from_value(json!({"Metadata": [{"tag": "keep-2"}]}))?;
        assert_eq!(tagged.items.len(), 1);
        assert_eq!(tagged.items[0].tag, "keep-2");
        Ok(())
    }

    fn mock_library(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/library/sections")
                .header("x-plex-token", "plex-token");
            then.status(200).json_body(json!({"MediaContainer": {"Directory": [
                {"key": "1", "type": "movie", "title": "Movies"},
                {"key": "2", "type": "show", "title": "TV"}
            ]}}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/library/sections/2/all")
                .query_param("type", "2");
            then.status(200).json_body(json!({"MediaContainer": {"Metadata": [
                {"ratingKey": "900", "title": "Daily News",
                 "Guid": [{"id": "tvdb://4242"}],
                 "Label": [{"tag": "keep-5"}]}
            ]}}));
        });
    }

    #[tokio::test]
    async fn lists_leaves_with_watch_state_and_media_part() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_library(&server);
        server.mock(|when, then| {
            when.method(GET).path("/library/metadata/900/allLeaves");
            then.status(200).json_body(json!({"MediaContainer": {"Metadata": [
                {"ratingKey": "901", "title": "Monday", "parentIndex": 2025, "index": 3,
                 "originallyAvailableAt": "2025-03-03", "addedAt": 1741050000,
                 "viewCount": 2, "lastViewedAt": 1741100000,
                 "Media": [{"Part": [{"file": "/tv/news/monday.mkv", "size": 4096}]}]},
                {"ratingKey": "902", "addedAt": 1741150000}
            ]}}));
        });

        let entries: Vec<RawEpisode> = source(&server)?
            .list_episodes(&ShowSelector::new("tvdb:4242"))
            .collect::<Result<_, _>>()
            .await?;
        assert_eq!(entries.len(), 2);
        let first = &entries[0];
        assert_eq!(first.source_ref, "901");
        assert_eq!(first.numbers(), Some((2025, 3)));
        assert_eq!(first.air_date.map(|date| date.to_rfc3339()), Some("2025-03-03T00:00:00+00:00".to_string()));
        assert_eq!(first.file_size_bytes, Some(4096));
        assert!(matches!(first.watch_status, Some(WatchStatus::Watched { view_count: 2, .. })));
        let second = &entries[1];
        assert_eq!(second.numbers(), None);
        assert!(second.added_date.is_some());
        assert_eq!(second.watch_status, Some(WatchStatus::Unwatched));
        Ok(())
    }

    #[tokio::test]
    async fn describe_show_reads_labels() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_library(&server);
        let metadata = source(&server)?
            .describe_show(&ShowSelector::new("daily news"))
            .await?;
        assert_eq!(metadata.native_id, "900");
        assert_eq!(metadata.overrides.min_keep_count, Some(5));
        Ok(())
    }

    #[tokio::test]
    async fn delete_treats_missing_item_as_absent() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let gone = server.mock(|when, then| {
            when.method(DELETE).path("/library/metadata/901");
            then.status(404);
        });
        let present = server.mock(|when, then| {
            when.method(DELETE).path("/library/metadata/903");
            then.status(200);
        });
        let source = source(&server)?;
        let target = |reference: &str| DeleteTarget {
            identity: EpisodeIdentity::Path {
                show: ShowSelector::new("Daily News"),
                path: PathBuf::from("/tv/news/x.mkv"),
            },
            source_ref: reference.to_string(),
            file_path: None,
        };
        assert_eq!(
            source.delete_episode(&target("901")).await?,
            DeleteOutcome::AlreadyAbsent
        );
        assert_eq!(
            source.delete_episode(&target("903")).await?,
            DeleteOutcome::Deleted
        );
        gone.assert();
        present.assert();
        Ok(())
    }

    #[tokio::test]
    async fn refresh_touches_show_sections_only() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_library(&server);
        let refresh = server.mock(|when, then| {
            when.method(GET).path("/library/sections/2/refresh");
            then.status(200);
        });
        let movies = server.mock(|when, then| {
            when.method(GET).path("/library/sections/1/refresh");
            then.status(200);
        });
        source(&server)?.refresh_library().await?;
        refresh.assert();
        movies.assert_hits(0);
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/identity");
            then.status(503);
        });
        let err = source(&server)?.probe().await.err();
        assert!(err.is_some_and(|err| err.is_unavailable()));
        Ok(())
    }

    #[test]
    fn air_dates_parse_as_utc_midnight() {
        assert!(parse_air_date("2025-02-30").is_none());
        assert_eq!(
            parse_air_date("2025-02-03").map(|date| date.timestamp()),
            Some(1_738_540_800)
        );
    }
}
