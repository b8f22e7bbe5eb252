use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use crate::query::types::{ProcessedQuery, SearchOptions};

/// Bounded LRU of processed queries, keyed by (query, options).
pub struct QueryCache {
    pub cache: Arc<RwLock<LruCache<QueryKey, Arc<ProcessedQuery>>>>,
    pub size_limit: usize,
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QueryKey {
    pub query: String,
    pub filters: String,
}

impl QueryKey {
    pub fn new(query: &str, options: &SearchOptions) -> Self {
        QueryKey {
            query: query.to_string(),
            filters: options.filters.cache_key(),
        }
    }
}

impl QueryCache {
    pub fn new(size_limit: usize) -> Self {
        let cap = NonZeroUsize::new(size_limit).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            cache: Arc::new(RwLock::new(LruCache::new(cap))),
            size_limit,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<Arc<ProcessedQuery>> {
        let mut cache = self.cache.write();
        if let Some(query) = cache.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            Some(query.clone())
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn put(&self, key: QueryKey, query: Arc<ProcessedQuery>) {
        self.cache.write().put(key, query);
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.read().len(),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryCacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl QueryCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
