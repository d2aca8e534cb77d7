use std::{path::PathBuf, sync::Arc};

use tracing::debug;

use crate::{model::BoundingBox, source::ElementSource};

/// Identifies what a cached element source was created for
#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    /// A local chunk, identified by its locator
    Chunk(PathBuf),

    /// Data fetched remotely for the given query box
    Remote(BoundingBox),
}

impl CacheKey {
    /// Returns `true` if a source cached under `self` can answer a request
    /// keyed by `other`. A remote source answers every query inside the box it
    /// was fetched for.
    pub fn covers(&self, other: &CacheKey) -> bool {
        match (self, other) {
            (CacheKey::Chunk(a), CacheKey::Chunk(b)) => a == b,
            (CacheKey::Remote(a), CacheKey::Remote(b)) => a.contains(b),
            _ => false,
        }
    }
}

/// Holds at most one element source. Displaced sources are handed back to
/// the caller, who must release them.
#[derive(Default)]
pub(crate) struct Slot {
    entry: Option<(CacheKey, Arc<dyn ElementSource>)>,
}

impl Slot {
    /// Returns the held source if it was cached under a key covering `key`
    pub fn get(&self, key: &CacheKey) -> Option<Arc<dyn ElementSource>> {
        self.entry
            .as_ref()
            .filter(|(k, _)| k.covers(key))
            .map(|(_, source)| Arc::clone(source))
    }

    pub fn active(&self) -> Option<Arc<dyn ElementSource>> {
        self.entry.as_ref().map(|(_, source)| Arc::clone(source))
    }

    /// Stores `source` under `key` and returns the previously held source
    #[must_use]
    pub fn replace(
        &mut self,
        key: CacheKey,
        source: Arc<dyn ElementSource>,
    ) -> Option<Arc<dyn ElementSource>> {
        debug!(?key, id = %source.id(), "caching element source");
        self.entry
            .replace((key, source))
            .map(|(_, old)| old)
    }

    /// Empties the slot and returns the held source, if any
    #[must_use]
    pub fn take(&mut self) -> Option<Arc<dyn ElementSource>> {
        self.entry.take().map(|(_, old)| old)
    }
}

/// Releases a source that has left the slot
pub(crate) fn release(source: Option<Arc<dyn ElementSource>>) {
    if let Some(old) = source {
        debug!(id = %old.id(), "releasing element source");
        old.release();
    }
}
