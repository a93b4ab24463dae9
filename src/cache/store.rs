use super::key::CacheKey;
use crate::core::{MapperError, Result};
use crate::result::QueryResult;
use std::collections::HashMap;
use std::num::NonZeroUsize;

pub const DEFAULT_LRU_SIZE: usize = 1024;

/// Key/value store behind a cache region.
///
/// Stores are not expected to be thread safe; the owning region serializes
/// every call. An `Err` from a store is surfaced to the caller as is.
pub trait Cache: Send {
    fn get(&mut self, key: &CacheKey) -> Result<Option<QueryResult>>;

    fn put(&mut self, key: CacheKey, value: QueryResult) -> Result<()>;

    fn remove(&mut self, key: &CacheKey) -> Result<Option<QueryResult>>;

    fn clear(&mut self) -> Result<()>;

    fn size(&self) -> usize;
}

/// Unbounded store.
#[derive(Debug, Default)]
pub struct PerpetualCache {
    entries: HashMap<CacheKey, QueryResult>,
}

impl PerpetualCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for PerpetualCache {
    fn get(&mut self, key: &CacheKey) -> Result<Option<QueryResult>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: CacheKey, value: QueryResult) -> Result<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<Option<QueryResult>> {
        Ok(self.entries.remove(key))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}

/// Store evicting the least recently used entry once `capacity` is reached.
pub struct LruCache {
    entries: lru::LruCache<CacheKey, QueryResult>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            MapperError::CacheConfigError("LRU cache size must be greater than zero".into())
        })?;
        Ok(Self {
            entries: lru::LruCache::new(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for LruCache {
    fn default() -> Self {
        Self {
            entries: lru::LruCache::new(
                NonZeroUsize::new(DEFAULT_LRU_SIZE).unwrap_or(NonZeroUsize::MIN),
            ),
        }
    }
}

impl Cache for LruCache {
    fn get(&mut self, key: &CacheKey) -> Result<Option<QueryResult>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: CacheKey, value: QueryResult) -> Result<()> {
        self.entries.put(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<Option<QueryResult>> {
        Ok(self.entries.pop(key))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
