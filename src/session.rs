use crate::config::Configuration;
use crate::core::{MapperError, Result, Row};
use crate::driver::{Connection, DataSource};
use crate::executor::{Executor, SharedResultHandler};
use crate::mapping::RowBounds;
use crate::result::QueryResult;
use crate::scripting::Parameter;
use log::{debug, warn};
use std::sync::Arc;

/// Opens sessions against one data source.
///
/// # Examples
///
/// ```ignore
/// let factory = SessionFactory::new(Arc::new(config), Arc::new(data_source));
/// let mut session = factory.open_session()?;
/// let users = session.select_list("user.find", Parameter::from_pairs([("id", 5)]))?;
/// session.commit()?;
/// ```
pub struct SessionFactory {
    configuration: Arc<Configuration>,
    data_source: Arc<dyn DataSource>,
}

impl SessionFactory {
    pub fn new(configuration: Arc<Configuration>, data_source: Arc<dyn DataSource>) -> Self {
        Self {
            configuration,
            data_source,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Session with manual commit.
    pub fn open_session(&self) -> Result<Session> {
        self.open_session_with(false)
    }

    pub fn open_session_with(&self, auto_commit: bool) -> Result<Session> {
        let connection = Connection::new(self.data_source.connect()?);
        let executor = self.configuration.new_executor(connection);
        debug!("Opened session (auto_commit: {})", auto_commit);
        Ok(Session::new(Arc::clone(&self.configuration), executor, auto_commit))
    }
}

/// One unit of work: a connection, its local cache and its staged shared
/// cache writes. Not meant to be shared between threads.
pub struct Session {
    configuration: Arc<Configuration>,
    executor: Box<dyn Executor>,
    auto_commit: bool,
    dirty: bool,
}

impl Session {
    pub fn new(configuration: Arc<Configuration>, executor: Box<dyn Executor>, auto_commit: bool) -> Self {
        Self {
            configuration,
            executor,
            auto_commit,
            dirty: false,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Whether a write ran since the last commit or rollback.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }

    pub fn select_list(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<QueryResult> {
        self.select_list_with_bounds(statement, parameter, RowBounds::DEFAULT)
    }

    pub fn select_list_with_bounds(
        &mut self,
        statement: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
    ) -> Result<QueryResult> {
        let ms = self.configuration.get_statement(statement)?;
        self.executor.query(&ms, &parameter.into(), bounds, None)
    }

    /// At most one row. More than one is an error.
    pub fn select_one(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<Option<Row>> {
        let result = self.select_list(statement, parameter)?;
        match result.row_count() {
            0 => Ok(None),
            1 => Ok(result.rows.into_iter().next()),
            n => Err(MapperError::TooManyResults(n)),
        }
    }

    /// Stream rows to `handler`. Neither cache tier is used.
    pub fn select_with_handler(
        &mut self,
        statement: &str,
        parameter: impl Into<Parameter>,
        bounds: RowBounds,
        handler: SharedResultHandler,
    ) -> Result<()> {
        let ms = self.configuration.get_statement(statement)?;
        self.executor
            .query(&ms, &parameter.into(), bounds, Some(handler))?;
        Ok(())
    }

    pub fn insert(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<u64> {
        self.update(statement, parameter)
    }

    pub fn update(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<u64> {
        let ms = self.configuration.get_statement(statement)?;
        self.dirty = true;
        self.executor.update(&ms, &parameter.into())
    }

    pub fn delete(&mut self, statement: &str, parameter: impl Into<Parameter>) -> Result<u64> {
        self.update(statement, parameter)
    }

    /// Commit if anything was written. Staged cache writes are published
    /// either way.
    pub fn commit(&mut self) -> Result<()> {
        self.commit_force(false)
    }

    pub fn commit_force(&mut self, force: bool) -> Result<()> {
        let required = self.is_commit_or_rollback_required(force);
        self.executor.commit(required)?;
        self.dirty = false;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.rollback_force(false)
    }

    pub fn rollback_force(&mut self, force: bool) -> Result<()> {
        let required = self.is_commit_or_rollback_required(force);
        self.executor.rollback(required)?;
        self.dirty = false;
        Ok(())
    }

    pub fn clear_cache(&mut self) -> Result<()> {
        self.executor.clear_local_cache()
    }

    /// Close the session. Uncommitted writes are rolled back along with
    /// their staged cache entries; otherwise staged entries are published.
    pub fn close(&mut self) -> Result<()> {
        if self.executor.is_closed() {
            return Ok(());
        }
        let force_rollback = self.is_commit_or_rollback_required(false);
        let result = self.executor.close(force_rollback);
        self.dirty = false;
        result
    }

    fn is_commit_or_rollback_required(&self, force: bool) -> bool {
        (!self.auto_commit && self.dirty) || force
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing session: {}", e);
        }
    }
}
