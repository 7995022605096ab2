//! Lookup table from source kind to adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use tidyarr_core::{EpisodeSource, SourceKind};

/// Adapters available to a run, at most one per kind.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<SourceKind, Arc<dyn EpisodeSource>>,
}

impl SourceRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous adapter of the same kind.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn EpisodeSource>) -> Self {
        self.register(source);
        self
    }

    /// Register an adapter in place.
    pub fn register(&mut self, source: Arc<dyn EpisodeSource>) {
        self.sources.insert(source.kind(), source);
    }

    /// Adapter for `kind`, if registered.
    #[must_use]
    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn EpisodeSource>> {
        self.sources.get(&kind).cloned()
    }

    /// Registered kinds in stable order.
    #[must_use]
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.keys().copied().collect()
    }

    #[must_use]
    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over registered adapters.
    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &Arc<dyn EpisodeSource>)> {
        self.sources.iter().map(|(kind, source)| (*kind, source))
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
