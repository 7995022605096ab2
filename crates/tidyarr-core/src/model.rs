//! Episode domain types shared by adapters, the inventory builder and the evaluator.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::ShowOverrides;

/// Backing system an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Plex Media Server library.
    Plex,
    /// Sonarr series manager.
    Sonarr,
}

impl SourceKind {
    /// Every known source kind, in a stable order.
    pub const ALL: [Self; 2] = [Self::Plex, Self::Sonarr];

    #[must_use]
    /// Render the kind as its lowercase identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plex => "plex",
            Self::Sonarr => "sonarr",
        }
    }

    /// Rank used when two sources disagree about file metadata.
    ///
    /// Sonarr manages the files on disk, so it outranks a library index.
    #[must_use]
    pub const fn file_authority_rank(self) -> u8 {
        match self {
            Self::Plex => 0,
            Self::Sonarr => 1,
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of adapters that reported a given episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFlags {
    /// Reported by Plex.
    pub plex: bool,
    /// Reported by Sonarr.
    pub sonarr: bool,
}

impl SourceFlags {
    /// Flags with exactly one source set.
    #[must_use]
    pub const fn only(kind: SourceKind) -> Self {
        let mut flags = Self {
            plex: false,
            sonarr: false,
        };
        flags.insert(kind);
        flags
    }

    /// Mark `kind` as having reported the episode.
    pub const fn insert(&mut self, kind: SourceKind) {
        match kind {
            SourceKind::Plex => self.plex = true,
            SourceKind::Sonarr => self.sonarr = true,
        }
    }

    #[must_use]
    /// Whether `kind` reported the episode.
    pub const fn contains(self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Plex => self.plex,
            SourceKind::Sonarr => self.sonarr,
        }
    }

    #[must_use]
    /// Whether both adapters reported the episode.
    pub const fn is_both(self) -> bool {
        self.plex && self.sonarr
    }
}

/// Show identifier as written in configuration (title or `tvdb:<id>`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShowSelector(String);

impl ShowSelector {
    /// Wrap a selector string, trimming surrounding whitespace.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self(value.trim().to_string())
    }

    #[must_use]
    /// Borrow the selector text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// TVDB identifier when the selector uses the `tvdb:<id>` form.
    #[must_use]
    pub fn tvdb_id(&self) -> Option<u64> {
        self.0
            .strip_prefix("tvdb:")
            .and_then(|id| id.trim().parse().ok())
    }

    /// Case-insensitive title comparison.
    #[must_use]
    pub fn matches_title(&self, title: &str) -> bool {
        self.0.eq_ignore_ascii_case(title.trim())
    }
}

impl Display for ShowSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShowSelector {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Stable key for one episode within a run's inventory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpisodeIdentity {
    /// Keyed by season and episode number.
    Numbered {
        /// Show the episode belongs to.
        show: ShowSelector,
        /// Season number (daily shows typically use the year).
        season: u32,
        /// Episode number within the season.
        episode: u32,
    },
    /// Keyed by the file path when numbering is unavailable.
    Path {
        /// Show the episode belongs to.
        show: ShowSelector,
        /// Absolute path of the media file.
        path: PathBuf,
    },
}

impl EpisodeIdentity {
    #[must_use]
    /// Show component of the identity.
    pub const fn show(&self) -> &ShowSelector {
        match self {
            Self::Numbered { show, .. } | Self::Path { show, .. } => show,
        }
    }
}

impl Display for EpisodeIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbered {
                show,
                season,
                episode,
            } => write!(f, "{show} S{season:02}E{episode:02}"),
            Self::Path { show, path } => write!(f, "{show} [{}]", path.display()),
        }
    }
}

/// Watch state reported by a metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WatchStatus {
    /// Never played.
    Unwatched,
    /// Played at least once.
    Watched {
        /// Number of recorded plays.
        view_count: u32,
        /// Last playback time when known.
        last_viewed_at: Option<DateTime<Utc>>,
    },
}

/// One entry as reported by a single adapter, before merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEpisode {
    /// Adapter that produced the entry.
    pub source: SourceKind,
    /// Adapter-native reference used to delete the item later.
    pub source_ref: String,
    /// Season number when the adapter knows it.
    pub season: Option<u32>,
    /// Episode number when the adapter knows it.
    pub episode: Option<u32>,
    /// Episode title.
    pub title: Option<String>,
    /// Original air date.
    pub air_date: Option<DateTime<Utc>>,
    /// Time the file was added to the library.
    pub added_date: Option<DateTime<Utc>>,
    /// Absolute file location on the media volume.
    pub file_path: Option<PathBuf>,
    /// File size in bytes.
    pub file_size_bytes: Option<u64>,
    /// Watch state when the adapter tracks it.
    pub watch_status: Option<WatchStatus>,
    /// Set by the inventory builder when the file path was confirmed on disk.
    #[serde(default)]
    pub path_verified: bool,
}

impl RawEpisode {
    /// Minimal entry for `source` with the given native reference.
    #[must_use]
    pub fn new(source: SourceKind, source_ref: impl Into<String>) -> Self {
        Self {
            source,
            source_ref: source_ref.into(),
            season: None,
            episode: None,
            title: None,
            air_date: None,
            added_date: None,
            file_path: None,
            file_size_bytes: None,
            watch_status: None,
            path_verified: false,
        }
    }

    #[must_use]
    /// Season/episode pair when both numbers are present.
    pub const fn numbers(&self) -> Option<(u32, u32)> {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) => Some((season, episode)),
            _ => None,
        }
    }

    /// Ordering key deciding which entry wins on conflicting file metadata.
    #[must_use]
    pub const fn authority_key(&self) -> (bool, bool, u8) {
        (
            self.path_verified,
            self.file_path.is_some(),
            self.source.file_authority_rank(),
        )
    }
}

/// Normalised, merged view of one episode under consideration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Unique key within the run.
    pub identity: EpisodeIdentity,
    /// Episode title when any source reported one.
    pub title: Option<String>,
    /// Original air date.
    pub air_date: Option<DateTime<Utc>>,
    /// Library added date.
    pub added_date: Option<DateTime<Utc>>,
    /// Absolute file location.
    pub file_path: Option<PathBuf>,
    /// File size captured before any deletion.
    pub file_size_bytes: u64,
    /// Adapters that reported this episode.
    pub source_flags: SourceFlags,
    /// Watch state, if known.
    pub watch_status: Option<WatchStatus>,
    /// Adapter whose file metadata was used; deletions go through it.
    pub authority: SourceKind,
    /// Adapter-native references keyed by source.
    pub refs: BTreeMap<SourceKind, String>,
}

impl EpisodeRecord {
    /// Timestamp used as the age reference: air date, falling back to added date.
    #[must_use]
    pub fn age_reference(&self) -> Option<DateTime<Utc>> {
        self.air_date.or(self.added_date)
    }

    /// Whole days elapsed between the age reference and `now`.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.age_reference()
            .map(|reference| now.signed_duration_since(reference).num_days())
    }

    /// Native reference for `kind`, if that source reported the episode.
    #[must_use]
    pub fn source_ref(&self, kind: SourceKind) -> Option<&str> {
        self.refs.get(&kind).map(String::as_str)
    }
}

/// Show-level metadata returned by `describe_show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowMetadata {
    /// Selector that was resolved.
    pub selector: ShowSelector,
    /// Adapter-native show identifier.
    pub native_id: String,
    /// Canonical title in the backend.
    pub title: String,
    /// Series type when the backend classifies shows (`daily`, `standard`, ...).
    pub series_type: Option<String>,
    /// Overrides derived from tags or labels attached to the show.
    pub overrides: ShowOverrides,
}

/// Daily series reported by a backend that supports discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredShow {
    /// Title in the backend.
    pub title: String,
    /// TVDB identifier when the backend knows it.
    pub tvdb_id: Option<u64>,
}

impl DiscoveredShow {
    /// Selector a discovered show is planned under.
    #[must_use]
    pub fn selector(&self) -> ShowSelector {
        ShowSelector::new(self.title.as_str())
    }

    /// Whether `selector` already names this show, by TVDB id or title.
    #[must_use]
    pub fn is_named_by(&self, selector: &ShowSelector) -> bool {
        match (selector.tvdb_id(), self.tvdb_id) {
            (Some(configured), Some(discovered)) if configured == discovered => true,
            _ => selector.matches_title(&self.title),
        }
    }
}
