//! Sonarr v3 adapter.
//!
//! Native references have the form `<episodeFileId>:<episodeId>`; deleting unmonitors the
//! episode before removing its file so Sonarr does not fetch it again.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidyarr_core::{
    DeleteOutcome, DeleteTarget, DiscoveredShow, EpisodeSource, EpisodeStream, RawEpisode,
    ShowMetadata, ShowOverrides, ShowSelector, SourceError, SourceKind, SourceResult,
};
use tracing::debug;
use url::Url;

use crate::http::HttpClient;

const KIND: SourceKind = SourceKind::Sonarr;

/// Connection settings for a Sonarr instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SonarrSettings {
    /// Base URL, e.g. `http://sonarr:8989`.
    pub host: Url,
    /// API key sent as `X-Api-Key`.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesResource {
    id: i64,
    title: String,
    #[serde(default)]
    tvdb_id: Option<u64>,
    #[serde(default)]
    series_type: Option<String>,
    #[serde(default)]
    tags: Vec<i64>,
}

impl SeriesResource {
    fn matches(&self, selector: &ShowSelector) -> bool {
        selector.tvdb_id().map_or_else(
            || selector.matches_title(&self.title),
            |id| self.tvdb_id == Some(id),
        )
    }

    fn is_daily(&self) -> bool {
        self.series_type
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("daily"))
    }
}

#[derive(Debug, Deserialize)]
struct TagResource {
    id: i64,
    label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeResource {
    id: i64,
    season_number: u32,
    episode_number: u32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    air_date_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    has_file: bool,
    #[serde(default)]
    episode_file_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeFileResource {
    id: i64,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    date_added: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorRequest {
    episode_ids: Vec<i64>,
    monitored: bool,
}

/// `EpisodeSource` over the Sonarr v3 REST API.
#[derive(Debug, Clone)]
pub struct SonarrSource {
    http: HttpClient,
}

impl SonarrSource {
    /// Build an adapter for the given instance.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Unavailable` when the HTTP client cannot be constructed.
    pub fn new(settings: &SonarrSettings) -> SourceResult<Self> {
        let http = HttpClient::new(
            KIND,
            settings.host.clone(),
            "x-api-key",
            &settings.api_key,
            settings.timeout,
        )?;
        Ok(Self { http })
    }

    async fn series(&self, operation: &'static str) -> SourceResult<Vec<SeriesResource>> {
        self.http.get_json(operation, "/api/v3/series", &[]).await
    }

    async fn resolve(
        &self,
        operation: &'static str,
        selector: &ShowSelector,
    ) -> SourceResult<SeriesResource> {
        self.series(operation)
            .await?
            .into_iter()
            .find(|series| series.matches(selector))
            .ok_or_else(|| SourceError::NotFound {
                adapter: KIND,
                operation,
                reference: selector.to_string(),
            })
    }

    async fn episodes(&self, series: &SeriesResource) -> SourceResult<Vec<RawEpisode>> {
        let query = [("seriesId", series.id.to_string())];
        let episodes: Vec<EpisodeResource> = self
            .http
            .get_json("list_episodes", "/api/v3/episode", &query)
            .await?;
        let files: Vec<EpisodeFileResource> = self
            .http
            .get_json("list_episodes", "/api/v3/episodefile", &query)
            .await?;
        let files: BTreeMap<i64, EpisodeFileResource> =
            files.into_iter().map(|file| (file.id, file)).collect();

        let raw = episodes
            .into_iter()
            .filter(|episode| episode.has_file)
            .filter_map(|episode| {
                let file_id = episode.episode_file_id.filter(|id| *id > 0)?;
                let file = files.get(&file_id);
                let mut raw = RawEpisode::new(KIND, format!("{file_id}:{}", episode.id));
                raw.season = Some(episode.season_number);
                raw.episode = Some(episode.episode_number);
                raw.title = episode.title;
                raw.air_date = episode.air_date_utc;
                raw.added_date = file.and_then(|file| file.date_added);
                raw.file_path = file.and_then(|file| file.path.as_ref().map(PathBuf::from));
                raw.file_size_bytes = file.and_then(|file| file.size);
                Some(raw)
            })
            .collect();
        Ok(raw)
    }

    async fn labels(&self, operation: &'static str, ids: &[i64]) -> SourceResult<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tags: Vec<TagResource> = self.http.get_json(operation, "/api/v3/tag", &[]).await?;
        Ok(tags
            .into_iter()
            .filter(|tag| ids.contains(&tag.id))
            .map(|tag| tag.label)
            .collect())
    }
}

fn parse_reference(reference: &str) -> SourceResult<(i64, i64)> {
    reference
        .split_once(':')
        .and_then(|(file, episode)| Some((file.parse().ok()?, episode.parse().ok()?)))
        .ok_or_else(|| {
            SourceError::decode(
                KIND,
                "delete_episode",
                format!("malformed episode reference {reference}"),
            )
        })
}

#[async_trait]
impl EpisodeSource for SonarrSource {
    fn kind(&self) -> SourceKind {
        self.http.kind()
    }

    fn list_episodes<'a>(&'a self, selector: &'a ShowSelector) -> EpisodeStream<'a> {
        Box::pin(async_stream::try_stream! {
            let series = self.resolve("list_episodes", selector).await?;
            for raw in self.episodes(&series).await? {
                yield raw;
            }
        })
    }

    async fn delete_episode(&self, target: &DeleteTarget) -> SourceResult<DeleteOutcome> {
        let (file_id, episode_id) = parse_reference(&target.source_ref)?;
        let unmonitor = MonitorRequest {
            episode_ids: vec![episode_id],
            monitored: false,
        };
        match self
            .http
            .put_json("unmonitor_episode", "/api/v3/episode/monitor", &unmonitor)
            .await
        {
            Ok(()) | Err(SourceError::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        let outcome = self
            .http
            .delete("delete_episode", &format!("/api/v3/episodefile/{file_id}"))
            .await?;
        debug!(episode = %target.identity, file_id, ?outcome, "sonarr episode file removed");
        Ok(outcome)
    }

    async fn describe_show(&self, selector: &ShowSelector) -> SourceResult<ShowMetadata> {
        let series = self.resolve("describe_show", selector).await?;
        let labels = self.labels("describe_show", &series.tags).await?;
        Ok(ShowMetadata {
            selector: selector.clone(),
            native_id: series.id.to_string(),
            title: series.title.clone(),
            series_type: series.series_type.clone(),
            overrides: ShowOverrides::from_labels(labels),
        })
    }

    async fn probe(&self) -> SourceResult<()> {
        self.http.get("probe", "/api/v3/system/status").await
    }

    async fn discover_daily_shows(&self) -> SourceResult<Vec<DiscoveredShow>> {
        Ok(self
            .series("discover_daily_shows")
            .await?
            .into_iter()
            .filter(SeriesResource::is_daily)
            .map(|series| DiscoveredShow {
                title: series.title,
                tvdb_id: series.tvdb_id,
            })
            .collect())
    }
}
