use super::executor::Executor;
use super::result_handler::SharedResultHandler;
use crate::cache::{Cache, CacheKey, PerpetualCache};
use crate::config::{Configuration, LocalCacheScope};
use crate::core::{MapperError, Result, Value};
use crate::driver::Connection;
use crate::mapping::{BoundCommand, MappedStatement, RowBounds};
use crate::result::QueryResult;
use crate::scripting::Parameter;
use log::debug;
use std::sync::Arc;

/// Executor owning the session's connection and the local cache tier.
///
/// The local tier is private to the session and never shared, so it needs
/// no synchronization.
pub struct SimpleExecutor {
    configuration: Arc<Configuration>,
    connection: Connection,
    local_cache: PerpetualCache,
    closed: bool,
}

impl SimpleExecutor {
    pub fn new(configuration: Arc<Configuration>, connection: Connection) -> Self {
        Self {
            configuration,
            connection,
            local_cache: PerpetualCache::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(MapperError::ExecutorClosed);
        }
        Ok(())
    }

    fn bind(&self, ms: &MappedStatement, parameter: &Parameter) -> Result<BoundCommand> {
        let database_id = self.configuration.settings().database_id.as_deref();
        ms.sql_source.bound_command(parameter, database_id)
    }

    fn do_query(
        &mut self,
        ms: &Arc<MappedStatement>,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
        command: &BoundCommand,
    ) -> Result<QueryResult> {
        let mut statement = self.configuration.new_statement_handler(
            Arc::clone(ms),
            bounds,
            handler,
            command.clone(),
            self.connection.clone(),
        );
        let request = statement.prepare()?;
        let request = statement.parameterize(request)?;
        statement.query(request)
    }
}

impl Executor for SimpleExecutor {
    fn update(&mut self, ms: &Arc<MappedStatement>, parameter: &Parameter) -> Result<u64> {
        self.ensure_open()?;
        self.clear_local_cache()?;

        let command = self.bind(ms, parameter)?;
        let mut statement = self.configuration.new_statement_handler(
            Arc::clone(ms),
            RowBounds::DEFAULT,
            None,
            command,
            self.connection.clone(),
        );
        let request = statement.prepare()?;
        let request = statement.parameterize(request)?;
        statement.update(request)
    }

    fn query(
        &mut self,
        ms: &Arc<MappedStatement>,
        parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
    ) -> Result<QueryResult> {
        let command = self.bind(ms, parameter)?;
        let key = self.create_cache_key(ms, parameter, bounds, &command)?;
        self.query_bound(ms, parameter, bounds, handler, &key, &command)
    }

    fn query_bound(
        &mut self,
        ms: &Arc<MappedStatement>,
        _parameter: &Parameter,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
        key: &CacheKey,
        command: &BoundCommand,
    ) -> Result<QueryResult> {
        self.ensure_open()?;
        if ms.flush_cache {
            self.clear_local_cache()?;
        }

        let materialize = handler.is_none();
        if materialize {
            if let Some(hit) = self.local_cache.get(key)? {
                debug!("Local cache hit for {}", ms.id);
                return Ok(hit);
            }
        }

        let result = self.do_query(ms, bounds, handler, command)?;
        if materialize {
            self.local_cache.put(key.clone(), result.clone())?;
        }

        if self.configuration.settings().local_cache_scope == LocalCacheScope::Statement {
            self.clear_local_cache()?;
        }
        Ok(result)
    }

    fn commit(&mut self, required: bool) -> Result<()> {
        if self.closed {
            return Err(MapperError::ExecutionError(
                "Cannot commit, transaction already closed".into(),
            ));
        }
        self.clear_local_cache()?;
        if required {
            self.connection.commit()?;
        }
        Ok(())
    }

    fn rollback(&mut self, required: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.clear_local_cache()?;
        if required {
            self.connection.rollback()?;
        }
        Ok(())
    }

    fn create_cache_key(
        &self,
        ms: &Arc<MappedStatement>,
        _parameter: &Parameter,
        bounds: RowBounds,
        command: &BoundCommand,
    ) -> Result<CacheKey> {
        self.ensure_open()?;

        let mut key = CacheKey::new();
        key.update(ms.id.as_str());
        key.update(window_bound(bounds.offset));
        key.update(window_bound(bounds.limit));
        key.update(command.sql.as_str());
        for (_, value) in command.input_values() {
            key.update(value.clone());
        }
        key.update(self.configuration.settings().environment_id.as_str());
        Ok(key)
    }

    fn is_cached(&mut self, _ms: &Arc<MappedStatement>, key: &CacheKey) -> Result<bool> {
        Ok(self.local_cache.get(key)?.is_some())
    }

    fn clear_local_cache(&mut self) -> Result<()> {
        if !self.closed {
            self.local_cache.clear()?;
        }
        Ok(())
    }

    fn close(&mut self, force_rollback: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let rolled_back = self.rollback(force_rollback);
        let closed = self.connection.close();
        self.local_cache.clear()?;
        self.closed = true;
        rolled_back.and(closed)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

fn window_bound(bound: usize) -> Value {
    Value::Integer(i64::try_from(bound).unwrap_or(i64::MAX))
}
