use super::key::CacheKey;
use super::store::{Cache, LruCache, PerpetualCache};
use crate::core::Result;
use crate::result::QueryResult;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Shared, namespace-scoped cache.
///
/// One mutex guards the store and the statistics, so every get, put and
/// clear from any session is serialized.
pub struct CacheRegion {
    id: String,
    flush_interval: Option<Duration>,
    state: Mutex<RegionState>,
}

struct RegionState {
    store: Box<dyn Cache>,
    requests: u64,
    hits: u64,
    last_clear: Instant,
}

impl CacheRegion {
    pub fn new(id: &str, store: Box<dyn Cache>) -> Self {
        Self {
            id: id.to_string(),
            flush_interval: None,
            state: Mutex::new(RegionState {
                store,
                requests: 0,
                hits: 0,
                last_clear: Instant::now(),
            }),
        }
    }

    /// Region backed by an LRU store of the default size.
    pub fn lru(id: &str) -> Self {
        Self::new(id, Box::new(LruCache::default()))
    }

    pub fn perpetual(id: &str) -> Self {
        Self::new(id, Box::new(PerpetualCache::new()))
    }

    /// Clear the whole region once `interval` has elapsed since the last clear.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<QueryResult>> {
        let mut state = self.state.lock()?;
        self.clear_when_stale(&mut state)?;

        state.requests += 1;
        let value = state.store.get(key)?;
        if value.is_some() {
            state.hits += 1;
        }
        debug!(
            "Cache Hit Ratio [{}]: {}",
            self.id,
            state.hits as f64 / state.requests as f64
        );
        Ok(value)
    }

    pub fn put(&self, key: CacheKey, value: QueryResult) -> Result<()> {
        let mut state = self.state.lock()?;
        self.clear_when_stale(&mut state)?;
        state.store.put(key, value)
    }

    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        state.store.clear()?;
        state.last_clear = Instant::now();
        Ok(())
    }

    /// Apply a transaction's buffered effects under a single lock: the
    /// clear first, then the writes.
    pub fn apply(&self, clear: bool, entries: HashMap<CacheKey, QueryResult>) -> Result<()> {
        let mut state = self.state.lock()?;
        if clear {
            state.store.clear()?;
            state.last_clear = Instant::now();
        }
        for (key, value) in entries {
            state.store.put(key, value)?;
        }
        Ok(())
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.state.lock()?.store.size())
    }

    pub fn hit_ratio(&self) -> Result<f64> {
        let state = self.state.lock()?;
        if state.requests == 0 {
            return Ok(0.0);
        }
        Ok(state.hits as f64 / state.requests as f64)
    }

    fn clear_when_stale(&self, state: &mut RegionState) -> Result<()> {
        if let Some(interval) = self.flush_interval {
            if state.last_clear.elapsed() >= interval {
                debug!("Flushing cache region [{}] after {:?}", self.id, interval);
                state.store.clear()?;
                state.last_clear = Instant::now();
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegion")
            .field("id", &self.id)
            .field("flush_interval", &self.flush_interval)
            .finish()
    }
}
