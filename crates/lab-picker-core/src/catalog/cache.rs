//! Short-lived cache of catalog pages keyed by exact query.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::models::{CatalogPage, CatalogQuery};

#[derive(Debug, Clone)]
struct CacheEntry {
    page: CatalogPage,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

/// LRU cache for catalog pages with a TTL.
///
/// Expired entries are dropped lazily on lookup and by [`purge_expired`];
/// once `capacity` is reached the least recently used entry is evicted.
///
/// [`purge_expired`]: QueryCache::purge_expired
#[derive(Debug)]
pub struct QueryCache {
    ttl: Duration,
    entries: LruCache<CatalogQuery, CacheEntry>,
}

impl QueryCache {
    /// A zero capacity is treated as one; config validation rejects it earlier.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: LruCache::new(capacity),
        }
    }

    /// Fresh page for `query`, if any.
    pub fn get(&mut self, query: &CatalogQuery, now: Instant) -> Option<&CatalogPage> {
        let ttl = self.ttl;
        let expired = self.entries.peek(query)?.is_expired(ttl, now);

        if expired {
            self.entries.pop(query);
            return None;
        }
        self.entries.get(query).map(|entry| &entry.page)
    }

    /// Store a page, replacing any older page for the same query.
    pub fn insert(&mut self, query: CatalogQuery, page: CatalogPage, now: Instant) {
        self.entries.put(
            query,
            CacheEntry {
                page,
                stored_at: now,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let expired: Vec<CatalogQuery> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl, now))
            .map(|(query, _)| query.clone())
            .collect();

        for query in &expired {
            self.entries.pop(query);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
