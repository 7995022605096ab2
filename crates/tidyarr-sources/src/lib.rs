#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! HTTP-backed `EpisodeSource` adapters.
//!
//! Layout: `http.rs` (shared client and status classification), `sonarr.rs`
//! (Sonarr v3 API), `plex.rs` (Plex Media Server API).

mod http;
pub mod plex;
pub mod sonarr;

pub use plex::{PlexSettings, PlexSource};
pub use sonarr::{SonarrSettings, SonarrSource};
