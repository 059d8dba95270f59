use std::collections::HashMap;

use tokio::sync::RwLock;

use super::keys::{Namespace, ancestor_paths};
use super::repository::LibraryEntry;

/// Resolved library lookups keyed by full document key.
///
/// Values are served until invalidated; nothing is re-validated against the
/// store. A write drops the entries of its ancestors only, so unrelated
/// subtrees stay cached.
///
/// Every invalidation bumps a generation counter. A lookup records the
/// generation before going to the store and only caches its result if no
/// invalidation happened in between, so a slow read can never reinstate a
/// listing that a concurrent write already dropped.
#[derive(Default)]
pub struct LibraryCache {
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, LibraryEntry>,
    generation: u64,
}

impl LibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<LibraryEntry> {
        self.state.read().await.entries.get(key).cloned()
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    pub async fn insert(&self, key: String, entry: LibraryEntry) {
        self.state.write().await.entries.insert(key, entry);
    }

    /// Cache `entry` only if nothing was invalidated since `generation` was
    /// read. Returns whether the entry was stored.
    pub async fn insert_if_unchanged(&self, key: String, entry: LibraryEntry, generation: u64) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!(key = %key, "Library cache changed during lookup, not caching");
            return false;
        }
        state.entries.insert(key, entry);
        true
    }

    pub async fn remove(&self, key: &str) -> bool {
        let mut state = self.state.write().await;
        state.generation = state.generation.wrapping_add(1);
        state.entries.remove(key).is_some()
    }

    /// Drop every cached listing that a write at `path` changes: the root and
    /// each ancestor directory, not the written key itself. Returns how many
    /// entries were dropped.
    pub async fn invalidate_ancestors(&self, ns: &Namespace, lib_type: &str, path: &str) -> usize {
        let mut state = self.state.write().await;
        state.generation = state.generation.wrapping_add(1);
        let mut dropped = 0;
        for ancestor in ancestor_paths(path) {
            let key = ns.library_key(lib_type, &ancestor);
            if state.entries.remove(&key).is_some() {
                tracing::debug!(key = %key, "Invalidated cached library entry");
                dropped += 1;
            }
        }
        dropped
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}
