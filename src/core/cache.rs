// File: src/core/cache.rs
use crate::core::types::ConvertOptions;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Identity of one conversion: the text plus every option that affects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
    options: ConvertOptions,
}

impl CacheKey {
    /// `options` should already have its special-character mode resolved, so
    /// that "default mode" and the explicit default share an entry.
    pub fn new(text: &str, options: ConvertOptions) -> Self {
        Self {
            text: text.to_string(),
            options,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Bounded least-recently-used store of finished conversions.
pub struct ResultCache {
    entries: Option<LruCache<CacheKey, String>>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    /// A capacity of zero turns caching off.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up a conversion and marks it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        let found = self.entries.as_mut().and_then(|c| c.get(key).cloned());
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn put(&mut self, key: CacheKey, value: String) {
        if let Some(cache) = self.entries.as_mut() {
            cache.put(key, value);
        }
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.entries.as_mut() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |c| c.cap().get())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.len(),
            capacity: self.capacity(),
        }
    }
}
