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

//! File-backed configuration for the cleanup service.
//!
//! Layout: `model.rs` (YAML document sections), `defaults.rs` (default values),
//! `loader.rs` (file loading and environment overrides), `validate.rs` (field checks and
//! conversion into a [`tidyarr_core::RunPlan`]), `error.rs` (`ConfigError`).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::CONFIG_PATH;
pub use error::{ConfigError, ConfigResult};
pub use loader::{EnvOverrides, apply_overrides, from_yaml_str, load};
pub use model::{
    CleanupConfig, CleanupSettings, LogFormatSetting, LoggingSettings, PerformanceSettings,
    PlexConfig, ShowEntry, SonarrConfig,
};
