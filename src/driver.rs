use crate::core::{Result, Value};
use crate::mapping::{KeyGeneration, ParameterMode, StatementType};
use crate::result::QueryResult;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One positional parameter handed to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverParameter {
    /// 1-based marker position.
    pub index: usize,
    /// `None` for OUT-only parameters, which are only registered.
    pub value: Option<Value>,
    pub mode: ParameterMode,
    pub jdbc_type: Option<String>,
    pub numeric_scale: Option<u32>,
}

/// Everything the driver needs to run one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRequest {
    pub statement_id: String,
    pub sql: String,
    pub statement_type: StatementType,
    pub parameters: Vec<DriverParameter>,
    pub timeout: Option<Duration>,
    pub fetch_size: Option<u32>,
    pub key_generation: KeyGeneration,
}

impl DriverRequest {
    /// Input values in marker order.
    pub fn input_values(&self) -> Vec<&Value> {
        self.parameters
            .iter()
            .filter_map(|p| p.value.as_ref())
            .collect()
    }
}

/// Raw execution collaborator: runs SQL against the database.
///
/// Implementations own one physical connection and its transaction. Any
/// failure is reported as an `Err` and is never retried here.
pub trait Driver: Send {
    /// Run a statement returning rows.
    fn query(&mut self, request: &DriverRequest) -> Result<QueryResult>;

    /// Run a statement modifying data; returns the affected row count.
    fn execute(&mut self, request: &DriverRequest) -> Result<u64>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Hands out driver connections to new sessions.
pub trait DataSource: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Driver>>;
}

/// Session-owned driver handle, shared between an executor and the
/// statement handlers it creates.
#[derive(Clone)]
pub struct Connection {
    driver: Arc<Mutex<Box<dyn Driver>>>,
}

impl Connection {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
        }
    }

    pub fn query(&self, request: &DriverRequest) -> Result<QueryResult> {
        self.driver.lock()?.query(request)
    }

    pub fn execute(&self, request: &DriverRequest) -> Result<u64> {
        self.driver.lock()?.execute(request)
    }

    pub fn commit(&self) -> Result<()> {
        self.driver.lock()?.commit()
    }

    pub fn rollback(&self) -> Result<()> {
        self.driver.lock()?.rollback()
    }

    pub fn close(&self) -> Result<()> {
        self.driver.lock()?.close()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
