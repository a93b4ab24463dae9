use super::parameter::ParameterHandler;
use super::result_set::ResultSetHandler;
use crate::core::Result;
use crate::driver::{Connection, DriverRequest};
use crate::mapping::{BoundCommand, MappedStatement};
use crate::result::QueryResult;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Drives one statement execution against the driver:
/// `prepare`, then `parameterize`, then `update` or `query`.
pub trait StatementHandler: Send {
    fn bound_command(&self) -> BoundCommand;

    fn prepare(&mut self) -> Result<DriverRequest>;

    fn parameterize(&mut self, request: DriverRequest) -> Result<DriverRequest>;

    fn update(&mut self, request: DriverRequest) -> Result<u64>;

    fn query(&mut self, request: DriverRequest) -> Result<QueryResult>;
}

impl<H: StatementHandler + ?Sized> StatementHandler for Box<H> {
    fn bound_command(&self) -> BoundCommand {
        (**self).bound_command()
    }

    fn prepare(&mut self) -> Result<DriverRequest> {
        (**self).prepare()
    }

    fn parameterize(&mut self, request: DriverRequest) -> Result<DriverRequest> {
        (**self).parameterize(request)
    }

    fn update(&mut self, request: DriverRequest) -> Result<u64> {
        (**self).update(request)
    }

    fn query(&mut self, request: DriverRequest) -> Result<QueryResult> {
        (**self).query(request)
    }
}

pub struct DefaultStatementHandler {
    ms: Arc<MappedStatement>,
    command: BoundCommand,
    connection: Connection,
    parameter_handler: Box<dyn ParameterHandler>,
    result_set_handler: Box<dyn ResultSetHandler>,
    default_timeout: Option<Duration>,
    default_fetch_size: Option<u32>,
}

impl DefaultStatementHandler {
    pub fn new(
        ms: Arc<MappedStatement>,
        command: BoundCommand,
        connection: Connection,
        parameter_handler: Box<dyn ParameterHandler>,
        result_set_handler: Box<dyn ResultSetHandler>,
    ) -> Self {
        Self {
            ms,
            command,
            connection,
            parameter_handler,
            result_set_handler,
            default_timeout: None,
            default_fetch_size: None,
        }
    }

    /// Fallbacks for statements that declare no timeout or fetch size.
    pub fn with_defaults(mut self, timeout: Option<Duration>, fetch_size: Option<u32>) -> Self {
        self.default_timeout = timeout;
        self.default_fetch_size = fetch_size;
        self
    }
}

impl StatementHandler for DefaultStatementHandler {
    fn bound_command(&self) -> BoundCommand {
        self.command.clone()
    }

    fn prepare(&mut self) -> Result<DriverRequest> {
        debug!("==>  Preparing: {}", self.command.sql);
        Ok(DriverRequest {
            statement_id: self.ms.id.clone(),
            sql: self.command.sql.clone(),
            statement_type: self.ms.statement_type,
            parameters: Vec::new(),
            timeout: self.ms.timeout.or(self.default_timeout),
            fetch_size: self.ms.fetch_size.or(self.default_fetch_size),
            key_generation: self.ms.key_generation.clone(),
        })
    }

    fn parameterize(&mut self, request: DriverRequest) -> Result<DriverRequest> {
        self.parameter_handler.set_parameters(request)
    }

    fn update(&mut self, request: DriverRequest) -> Result<u64> {
        let updates = self.connection.execute(&request)?;
        debug!("<==    Updates: {}", updates);
        Ok(updates)
    }

    fn query(&mut self, request: DriverRequest) -> Result<QueryResult> {
        let rows = self.connection.query(&request)?;
        debug!("<==      Total: {}", rows.row_count());
        self.result_set_handler.handle_result_set(rows)
    }
}
