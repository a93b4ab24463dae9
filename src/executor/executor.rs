use super::result_handler::SharedResultHandler;
use crate::cache::CacheKey;
use crate::core::Result;
use crate::mapping::{BoundCommand, MappedStatement, RowBounds};
use crate::result::QueryResult;
use crate::scripting::Parameter;
use std::sync::Arc;

/// Runs mapped statements for one session.
///
/// Implementations are stacked: the caching executor decorates the simple
/// executor, and interceptor proxies may wrap either.
pub trait Executor: Send {
    /// Run an INSERT, UPDATE or DELETE. Returns the affected row count.
    fn update(&mut self, ms: &Arc<MappedStatement>, parameter: &Parameter) -> Result<u64>;

    /// Run a SELECT. With a result handler the rows go to the handler and
    /// the returned result is empty.
    fn query(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
    ) -> Result<QueryResult>;

    /// [`query`](Self::query) with the bound command and cache key already
    /// computed.
    fn query_bound(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
        key: &CacheKey,
        command: &BoundCommand,
    ) -> Result<QueryResult>;

    fn commit(&mut self, required: bool) -> Result<()>;

    fn rollback(&mut self, required: bool) -> Result<()>;

    fn create_cache_key(
        &self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        command: &BoundCommand,
    ) -> Result<CacheKey>;

    /// Whether the session tier holds `key`.
    fn is_cached(&mut self, ms: &Arc<MappedStatement>, key: &CacheKey) -> Result<bool>;

    fn clear_local_cache(&mut self) -> Result<()>;

    fn close(&mut self, force_rollback: bool) -> Result<()>;

    fn is_closed(&self) -> bool;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn update(&mut self, ms: &Arc<MappedStatement>, parameter: &Parameter) -> Result<u64> {
        (**self).update(ms, parameter)
    }

    fn query(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
    ) -> Result<QueryResult> {
        (**self).query(ms, parameter, bounds, handler)
    }

    fn query_bound(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
        key: &CacheKey,
        command: &BoundCommand,
    ) -> Result<QueryResult> {
        (**self).query_bound(ms, parameter, bounds, handler, key, command)
    }

    fn commit(&mut self, required: bool) -> Result<()> {
        (**self).commit(required)
    }

    fn rollback(&mut self, required: bool) -> Result<()> {
        (**self).rollback(required)
    }

    fn create_cache_key(
        &self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        command: &BoundCommand,
    ) -> Result<CacheKey> {
        (**self).create_cache_key(ms, parameter, bounds, command)
    }

    fn is_cached(&mut self, ms: &Arc<MappedStatement>, key: &CacheKey) -> Result<bool> {
        (**self).is_cached(ms, key)
    }

    fn clear_local_cache(&mut self) -> Result<()> {
        (**self).clear_local_cache()
    }

    fn close(&mut self, force_rollback: bool) -> Result<()> {
        (**self).close(force_rollback)
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
