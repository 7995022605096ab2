//! Inventory Builder.
//!
//! # Design
//! - Every configured source is read independently; a failing source is skipped for the
//!   show and its partial output discarded.
//! - Entries are grouped by `(season, episode)` and by file path; an entry matching two
//!   groups joins them, so one file never yields two records.
//! - The entry with the strongest filesystem claim supplies conflicting file metadata.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tidyarr_core::{
    EpisodeIdentity, EpisodeRecord, EpisodeSource, RawEpisode, ShowMetadata, ShowOverrides,
    ShowSelector, ShowStatus, SourceError, SourceFlags, SourceKind, SourceResult, SourceSkip,
};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Merged inventory for one show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowInventory {
    /// Show the inventory belongs to.
    pub selector: ShowSelector,
    /// One record per logical episode.
    pub episodes: Vec<EpisodeRecord>,
    /// Overrides reported by the sources, merged conservatively.
    pub overrides: ShowOverrides,
    /// Sources that failed for this show.
    pub skipped: Vec<SourceSkip>,
    /// Entries dropped for lacking both numbering and a file path.
    pub unidentified: usize,
    /// Number of sources consulted.
    pub consulted: usize,
}

impl ShowInventory {
    /// Inventory outcome derived from the skip annotations.
    #[must_use]
    pub fn status(&self) -> ShowStatus {
        if self.skipped.len() >= self.consulted {
            ShowStatus::Skipped
        } else if self.skipped.is_empty() {
            ShowStatus::Processed
        } else {
            ShowStatus::PartialSources
        }
    }
}

/// Read every source for `selector` and merge the results.
pub async fn build_inventory(
    selector: &ShowSelector,
    sources: &[Arc<dyn EpisodeSource>],
    verify_paths: bool,
) -> ShowInventory {
    let fetches = sources
        .iter()
        .map(|source| fetch_source(source.as_ref(), selector));
    let results = join_all(fetches).await;

    let mut overrides = ShowOverrides::default();
    let mut skipped = Vec::new();
    let mut entries = Vec::new();
    for (kind, result) in results {
        match result {
            Ok((metadata, raw)) => {
                debug!(show = %selector, source = %kind, entries = raw.len(), "source listed");
                overrides = overrides.merge(metadata.overrides);
                entries.extend(raw);
            }
            Err(err) => {
                warn!(show = %selector, source = %kind, error = %err.describe(), "skipping source for show");
                skipped.push(SourceSkip {
                    source: kind,
                    reason: err.describe(),
                });
            }
        }
    }

    if verify_paths {
        verify_entry_paths(&mut entries).await;
    }

    let (episodes, unidentified) = merge_entries(selector, entries);
    ShowInventory {
        selector: selector.clone(),
        episodes,
        overrides,
        skipped,
        unidentified,
        consulted: sources.len(),
    }
}

async fn fetch_source(
    source: &dyn EpisodeSource,
    selector: &ShowSelector,
) -> (SourceKind, SourceResult<(ShowMetadata, Vec<RawEpisode>)>) {
    let kind = source.kind();
    let result = async {
        let metadata = source.describe_show(selector).await?;
        let mut stream = source.list_episodes(selector);
        let mut entries = Vec::new();
        while let Some(entry) = stream.next().await {
            let mut entry = entry?;
            entry.source = kind;
            entries.push(entry);
        }
        Ok::<_, SourceError>((metadata, entries))
    }
    .await;
    (kind, result)
}

async fn verify_entry_paths(entries: &mut [RawEpisode]) {
    for entry in entries.iter_mut() {
        let Some(path) = entry.file_path.clone() else {
            continue;
        };
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {
                entry.path_verified = true;
                entry.file_size_bytes = Some(metadata.len());
            }
            Ok(_) | Err(_) => {
                debug!(path = %path.display(), source = %entry.source, "reported path not found on disk");
            }
        }
    }
}

/// Merge raw entries into one record per logical episode.
///
/// Returns the records and the number of entries dropped for lacking any identity.
#[must_use]
pub fn merge_entries(
    selector: &ShowSelector,
    entries: Vec<RawEpisode>,
) -> (Vec<EpisodeRecord>, usize) {
    let mut groups: Vec<Vec<RawEpisode>> = Vec::new();
    let mut unidentified = 0;

    for entry in entries {
        if entry.numbers().is_none() && entry.file_path.is_none() {
            warn!(show = %selector, source = %entry.source, reference = %entry.source_ref, "dropping entry without numbering or path");
            unidentified += 1;
            continue;
        }

        let matching: Vec<usize> = groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.iter().any(|member| same_episode(member, &entry)))
            .map(|(index, _)| index)
            .collect();

        let Some((&first, rest)) = matching.split_first() else {
            groups.push(vec![entry]);
            continue;
        };
        for &index in rest.iter().rev() {
            let absorbed = groups.remove(index);
            groups[first].extend(absorbed);
        }
        let group = &mut groups[first];
        if group.iter().any(|member| member.source == entry.source) {
            warn!(show = %selector, source = %entry.source, reference = %entry.source_ref, "ignoring duplicate entry from source");
            continue;
        }
        group.push(entry);
    }

    let records = groups
        .into_iter()
        .filter_map(|group| merge_group(selector, group))
        .collect();
    (records, unidentified)
}

fn same_episode(left: &RawEpisode, right: &RawEpisode) -> bool {
    if let (Some(a), Some(b)) = (left.numbers(), right.numbers())
        && a == b
    {
        return true;
    }
    matches!((&left.file_path, &right.file_path), (Some(a), Some(b)) if a == b)
}

fn merge_group(selector: &ShowSelector, mut group: Vec<RawEpisode>) -> Option<EpisodeRecord> {
    // Stable sort: strongest filesystem claim first, arrival order otherwise.
    group.sort_by_key(|entry| std::cmp::Reverse(entry.authority_key()));
    let authority = group.first()?.source;

    let identity = match group.iter().find_map(RawEpisode::numbers) {
        Some((season, episode)) => EpisodeIdentity::Numbered {
            show: selector.clone(),
            season,
            episode,
        },
        None => EpisodeIdentity::Path {
            show: selector.clone(),
            path: group.iter().find_map(|entry| entry.file_path.clone())?,
        },
    };

    let mut source_flags = SourceFlags::default();
    let mut refs = BTreeMap::new();
    for entry in &group {
        source_flags.insert(entry.source);
        refs.entry(entry.source)
            .or_insert_with(|| entry.source_ref.clone());
    }

    Some(EpisodeRecord {
        identity,
        title: group.iter().find_map(|entry| entry.title.clone()),
        air_date: group.iter().find_map(|entry| entry.air_date),
        added_date: group.iter().find_map(|entry| entry.added_date),
        file_path: group.iter().find_map(|entry| entry.file_path.clone()),
        file_size_bytes: group
            .iter()
            .find_map(|entry| entry.file_size_bytes)
            .unwrap_or(0),
        source_flags,
        watch_status: group.iter().find_map(|entry| entry.watch_status),
        authority,
        refs,
    })
}
