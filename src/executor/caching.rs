use super::executor::Executor;
use super::result_handler::SharedResultHandler;
use crate::cache::{CacheKey, CacheRegion, TransactionalCacheManager};
use crate::config::Configuration;
use crate::core::{MapperError, Result};
use crate::mapping::{BoundCommand, MappedStatement, ParameterMode, RowBounds, StatementType};
use crate::result::QueryResult;
use crate::scripting::Parameter;
use std::sync::Arc;

/// Decorates another executor with the shared, cross-session cache tier.
///
/// Results are staged in per-session transactional buffers and only reach
/// the shared regions on commit.
pub struct CachingExecutor {
    delegate: Box<dyn Executor>,
    configuration: Arc<Configuration>,
    tcm: TransactionalCacheManager,
}

impl CachingExecutor {
    pub fn new(delegate: Box<dyn Executor>, configuration: Arc<Configuration>) -> Self {
        Self {
            delegate,
            configuration,
            tcm: TransactionalCacheManager::new(),
        }
    }

    /// Staged state of this session, for inspection.
    pub fn transactional_caches(&self) -> &TransactionalCacheManager {
        &self.tcm
    }

    fn region(&self, ms: &MappedStatement) -> Result<Option<Arc<CacheRegion>>> {
        let Some(namespace) = &ms.cache_ref else {
            return Ok(None);
        };
        match self.configuration.cache(namespace) {
            Some(region) => Ok(Some(region)),
            None => Err(MapperError::CacheConfigError(format!(
                "No cache region for namespace '{}' referenced by {}",
                namespace, ms.id
            ))),
        }
    }

    fn flush_if_required(&mut self, ms: &MappedStatement, region: &Arc<CacheRegion>) {
        if ms.flush_cache {
            self.tcm.clear(region);
        }
    }
}

fn ensure_no_out_params(ms: &MappedStatement, command: &BoundCommand) -> Result<()> {
    if ms.statement_type != StatementType::Callable {
        return Ok(());
    }
    if command.parameter_mappings.iter().any(|m| m.mode != ParameterMode::In) {
        return Err(MapperError::CacheConfigError(format!(
            "Caching stored procedures with OUT params is not supported.  Please configure useCache=false in {} statement.",
            ms.id
        )));
    }
    Ok(())
}

impl Executor for CachingExecutor {
    fn update(&mut self, ms: &Arc<MappedStatement>, parameter: &Parameter) -> Result<u64> {
        let region = self.region(ms)?;
        let checkpoint = region.as_ref().and_then(|r| self.tcm.checkpoint(r));
        if let Some(region) = &region {
            self.flush_if_required(ms, region);
        }

        match self.delegate.update(ms, parameter) {
            Ok(count) => Ok(count),
            Err(err) => {
                if let Some(region) = &region {
                    self.tcm.restore(region, checkpoint);
                }
                Err(err)
            }
        }
    }

    fn query(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
    ) -> Result<QueryResult> {
        let database_id = self.configuration.settings().database_id.as_deref();
        let command = ms.sql_source.bound_command(parameter, database_id)?;
        let key = self.create_cache_key(ms, parameter, bounds, &command)?;
        self.query_bound(ms, parameter, bounds, handler, &key, &command)
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
        if let Some(region) = self.region(ms)? {
            self.flush_if_required(ms, &region);
            if ms.use_cache && handler.is_none() {
                ensure_no_out_params(ms, command)?;
                if let Some(hit) = self.tcm.get_object(&region, key)? {
                    return Ok(hit);
                }
                let result = self
                    .delegate
                    .query_bound(ms, parameter, bounds, None, key, command)?;
                self.tcm.put_object(&region, key.clone(), result.clone());
                return Ok(result);
            }
        }
        self.delegate
            .query_bound(ms, parameter, bounds, handler, key, command)
    }

    fn commit(&mut self, required: bool) -> Result<()> {
        self.delegate.commit(required)?;
        self.tcm.commit()
    }

    fn rollback(&mut self, required: bool) -> Result<()> {
        let result = self.delegate.rollback(required);
        if required {
            self.tcm.rollback();
        }
        result
    }

    fn create_cache_key(
        &self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        command: &BoundCommand,
    ) -> Result<CacheKey> {
        self.delegate.create_cache_key(ms, parameter, bounds, command)
    }

    fn is_cached(&mut self, ms: &Arc<MappedStatement>, key: &CacheKey) -> Result<bool> {
        self.delegate.is_cached(ms, key)
    }

    fn clear_local_cache(&mut self) -> Result<()> {
        self.delegate.clear_local_cache()
    }

    fn close(&mut self, force_rollback: bool) -> Result<()> {
        let flushed = if force_rollback {
            self.tcm.rollback();
            Ok(())
        } else {
            self.tcm.commit()
        };
        let closed = self.delegate.close(force_rollback);
        flushed.and(closed)
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }
}
