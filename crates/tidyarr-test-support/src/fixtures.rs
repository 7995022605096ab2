//! Episode builders for engine and adapter tests.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tidyarr_core::{RawEpisode, ShowSelector, SourceKind};

/// Fixed reference instant so age arithmetic is reproducible.
#[must_use]
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Instant `days` whole days before `now`.
#[must_use]
pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Numbered entry aired `age_days` before `now`, with a file under `/tv/<show>/`.
#[must_use]
pub fn aired_episode(
    source: SourceKind,
    show: &ShowSelector,
    episode: u32,
    age_days: i64,
    now: DateTime<Utc>,
) -> RawEpisode {
    let mut raw = RawEpisode::new(source, format!("{source}-{episode}"));
    raw.season = Some(1);
    raw.episode = Some(episode);
    raw.title = Some(format!("{show} #{episode}"));
    raw.air_date = Some(days_ago(now, age_days));
    raw.file_path = Some(episode_path(show, episode));
    raw.file_size_bytes = Some(1_000);
    raw
}

/// Numbered entry with no air or added date.
#[must_use]
pub fn undated_episode(source: SourceKind, show: &ShowSelector, episode: u32) -> RawEpisode {
    let mut raw = RawEpisode::new(source, format!("{source}-{episode}"));
    raw.season = Some(1);
    raw.episode = Some(episode);
    raw.file_path = Some(episode_path(show, episode));
    raw
}

/// One numbered entry per age, episode numbers starting at 1.
#[must_use]
pub fn aired_episodes(
    source: SourceKind,
    show: &ShowSelector,
    ages: &[i64],
    now: DateTime<Utc>,
) -> Vec<RawEpisode> {
    ages.iter()
        .zip(1_u32..)
        .map(|(age, episode)| aired_episode(source, show, episode, *age, now))
        .collect()
}

/// Canonical media path for a fixture episode.
#[must_use]
pub fn episode_path(show: &ShowSelector, episode: u32) -> PathBuf {
    let folder = show.as_str().to_ascii_lowercase().replace(' ', "-");
    PathBuf::from(format!("/tv/{folder}/s01e{episode:02}.mkv"))
}
