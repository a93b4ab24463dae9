// ============================================================================
// Transactional Cache Buffers
// ============================================================================
//
// Every session stages its cache effects per region: writes and a pending
// clear stay private to the session until commit, and are dropped on
// rollback.
//
// ============================================================================

use super::key::CacheKey;
use super::region::CacheRegion;
use crate::core::Result;
use crate::result::QueryResult;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-session staging buffer in front of one [`CacheRegion`].
#[derive(Debug)]
pub struct TransactionalCache {
    delegate: Arc<CacheRegion>,
    clear_on_commit: bool,
    entries_to_add_on_commit: HashMap<CacheKey, QueryResult>,
}

/// Buffer contents captured before a write, restored if the write fails.
#[derive(Debug, Clone)]
pub struct BufferCheckpoint {
    clear_on_commit: bool,
    entries: HashMap<CacheKey, QueryResult>,
}

impl TransactionalCache {
    pub fn new(delegate: Arc<CacheRegion>) -> Self {
        Self {
            delegate,
            clear_on_commit: false,
            entries_to_add_on_commit: HashMap::new(),
        }
    }

    pub fn region(&self) -> &Arc<CacheRegion> {
        &self.delegate
    }

    /// Own pending writes first; the shared region only while no clear is
    /// pending.
    pub fn get_object(&self, key: &CacheKey) -> Result<Option<QueryResult>> {
        if let Some(pending) = self.entries_to_add_on_commit.get(key) {
            return Ok(Some(pending.clone()));
        }
        if self.clear_on_commit {
            return Ok(None);
        }
        self.delegate.get(key)
    }

    pub fn put_object(&mut self, key: CacheKey, value: QueryResult) {
        self.entries_to_add_on_commit.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.clear_on_commit = true;
        self.entries_to_add_on_commit.clear();
    }

    pub fn is_clear_pending(&self) -> bool {
        self.clear_on_commit
    }

    pub fn pending_writes(&self) -> usize {
        self.entries_to_add_on_commit.len()
    }

    pub fn commit(&mut self) -> Result<()> {
        let entries = std::mem::take(&mut self.entries_to_add_on_commit);
        let clear = std::mem::replace(&mut self.clear_on_commit, false);
        self.delegate.apply(clear, entries)
    }

    pub fn rollback(&mut self) {
        if self.clear_on_commit || !self.entries_to_add_on_commit.is_empty() {
            debug!(
                "Discarding {} buffered entries for cache region [{}]",
                self.entries_to_add_on_commit.len(),
                self.delegate.id()
            );
        }
        self.reset();
    }

    pub fn checkpoint(&self) -> BufferCheckpoint {
        BufferCheckpoint {
            clear_on_commit: self.clear_on_commit,
            entries: self.entries_to_add_on_commit.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: BufferCheckpoint) {
        self.clear_on_commit = checkpoint.clear_on_commit;
        self.entries_to_add_on_commit = checkpoint.entries;
    }

    fn reset(&mut self) {
        self.clear_on_commit = false;
        self.entries_to_add_on_commit.clear();
    }
}

/// All buffers of one session, created lazily per region.
#[derive(Debug, Default)]
pub struct TransactionalCacheManager {
    transactional_caches: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self, region: &Arc<CacheRegion>) {
        self.transactional_cache(region).clear();
    }

    pub fn get_object(&mut self, region: &Arc<CacheRegion>, key: &CacheKey) -> Result<Option<QueryResult>> {
        self.transactional_cache(region).get_object(key)
    }

    pub fn put_object(&mut self, region: &Arc<CacheRegion>, key: CacheKey, value: QueryResult) {
        self.transactional_cache(region).put_object(key, value);
    }

    /// Commit every buffer. All buffers are attempted; the first error is
    /// returned.
    pub fn commit(&mut self) -> Result<()> {
        let mut first_error = None;
        for txc in self.transactional_caches.values_mut() {
            if let Err(e) = txc.commit() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn rollback(&mut self) {
        for txc in self.transactional_caches.values_mut() {
            txc.rollback();
        }
    }

    /// `None` when the session has not touched the region yet.
    pub fn checkpoint(&self, region: &CacheRegion) -> Option<BufferCheckpoint> {
        self.transactional_caches
            .get(region.id())
            .map(TransactionalCache::checkpoint)
    }

    pub fn restore(&mut self, region: &Arc<CacheRegion>, checkpoint: Option<BufferCheckpoint>) {
        match checkpoint {
            Some(checkpoint) => self.transactional_cache(region).restore(checkpoint),
            None => {
                self.transactional_caches.remove(region.id());
            }
        }
    }

    pub fn buffer(&self, region_id: &str) -> Option<&TransactionalCache> {
        self.transactional_caches.get(region_id)
    }

    fn transactional_cache(&mut self, region: &Arc<CacheRegion>) -> &mut TransactionalCache {
        self.transactional_caches
            .entry(region.id().to_string())
            .or_insert_with(|| TransactionalCache::new(Arc::clone(region)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn key(i: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(i);
        key
    }

    fn rows(i: i64) -> QueryResult {
        QueryResult::new(vec!["v".into()], vec![vec![Value::Integer(i)]])
    }

    #[test]
    fn test_writes_invisible_until_commit() {
        let region = Arc::new(CacheRegion::perpetual("ns"));
        let mut a = TransactionalCacheManager::new();
        let mut b = TransactionalCacheManager::new();

        a.put_object(&region, key(1), rows(1));
        assert_eq!(a.get_object(&region, &key(1)).unwrap(), Some(rows(1)));
        assert_eq!(b.get_object(&region, &key(1)).unwrap(), None);

        a.commit().unwrap();
        assert_eq!(b.get_object(&region, &key(1)).unwrap(), Some(rows(1)));
    }

    #[test]
    fn test_rollback_discards() {
        let region = Arc::new(CacheRegion::perpetual("ns"));
        let mut tcm = TransactionalCacheManager::new();
        tcm.put_object(&region, key(1), rows(1));
        tcm.rollback();
        tcm.commit().unwrap();
        assert_eq!(region.size().unwrap(), 0);
    }

    #[test]
    fn test_clear_then_write_survives_commit() {
        let region = Arc::new(CacheRegion::perpetual("ns"));
        region.put(key(1), rows(1)).unwrap();

        let mut tcm = TransactionalCacheManager::new();
        tcm.clear(&region);
        assert_eq!(tcm.get_object(&region, &key(1)).unwrap(), None);
        tcm.put_object(&region, key(2), rows(2));
        tcm.commit().unwrap();

        assert_eq!(region.get(&key(1)).unwrap(), None);
        assert_eq!(region.get(&key(2)).unwrap(), Some(rows(2)));
    }

    #[test]
    fn test_checkpoint_restore() {
        let region = Arc::new(CacheRegion::perpetual("ns"));
        region.put(key(1), rows(1)).unwrap();
        let mut tcm = TransactionalCacheManager::new();

        let checkpoint = tcm.checkpoint(&region);
        tcm.clear(&region);
        tcm.restore(&region, checkpoint);
        tcm.commit().unwrap();

        assert_eq!(region.get(&key(1)).unwrap(), Some(rows(1)));
    }
}
