// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction cache for static decal meshes.
//!
//! Results are keyed by whatever identifies the originating decal (the
//! engine uses `(instance, renderer index)`). "No intersection" outcomes are
//! cached too so a miss is not recomputed every frame. Entries are never
//! invalidated implicitly: callers evict when decal parameters change.

use crate::error::Result;
use crate::mesh::Mesh;
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Cache of extracted meshes
#[derive(Debug)]
pub struct ExtractionCache<K> {
    entries: FxHashMap<K, Option<Arc<Mesh>>>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq> ExtractionCache<K> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached result for `key`, or run `extract` and cache its
    /// outcome. Errors are returned without being cached.
    pub fn get_or_extract<F>(&mut self, key: K, extract: F) -> Result<Option<Arc<Mesh>>>
    where
        F: FnOnce() -> Result<Option<Mesh>>,
    {
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(cached.clone());
        }

        self.misses += 1;
        let mesh = extract()?.map(Arc::new);
        self.entries.insert(key, mesh.clone());
        Ok(mesh)
    }

    /// Cached result without computing; `None` if absent or cached as empty
    pub fn get(&self, key: &K) -> Option<Arc<Mesh>> {
        self.entries.get(key).cloned().flatten()
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict one entry, returning whether it existed
    pub fn evict(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Evict every entry whose key matches, returning how many were removed
    pub fn evict_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        before - self.entries.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Hash + Eq> Default for ExtractionCache<K> {
    fn default() -> Self {
        Self::new()
    }
}
