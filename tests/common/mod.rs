#![allow(dead_code)]

use rustsqlmap::{
    CommandKind, Configuration, DataSource, Driver, DriverRequest, MapperError, MappedStatement,
    QueryResult, Result, SessionFactory, Settings, Value,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Everything the fake driver saw, across all its connections.
#[derive(Debug, Default)]
pub struct DriverLog {
    pub queries: Vec<DriverRequest>,
    pub executes: Vec<DriverRequest>,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
}

/// In-memory data source whose connections record every request.
///
/// Queries return the canned result registered for the statement id, or a
/// single echo row `[sql, p1, p2, ...]` of the input values. Writes whose
/// SQL contains `FAIL` return an execution error.
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    log: Arc<Mutex<DriverLog>>,
    canned: Arc<Mutex<HashMap<String, QueryResult>>>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, statement_id: &str, result: QueryResult) {
        self.canned
            .lock()
            .unwrap()
            .insert(statement_id.to_string(), result);
    }

    pub fn query_count(&self) -> usize {
        self.log.lock().unwrap().queries.len()
    }

    pub fn last_query(&self) -> DriverRequest {
        self.log.lock().unwrap().queries.last().cloned().unwrap()
    }

    pub fn execute_count(&self) -> usize {
        self.log.lock().unwrap().executes.len()
    }

    pub fn commits(&self) -> usize {
        self.log.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.log.lock().unwrap().rollbacks
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl DataSource for MemoryDataSource {
    fn connect(&self) -> Result<Box<dyn Driver>> {
        Ok(Box::new(MemoryDriver {
            log: Arc::clone(&self.log),
            canned: Arc::clone(&self.canned),
        }))
    }
}

struct MemoryDriver {
    log: Arc<Mutex<DriverLog>>,
    canned: Arc<Mutex<HashMap<String, QueryResult>>>,
}

impl Driver for MemoryDriver {
    fn query(&mut self, request: &DriverRequest) -> Result<QueryResult> {
        self.log.lock().unwrap().queries.push(request.clone());
        if let Some(result) = self.canned.lock().unwrap().get(&request.statement_id) {
            return Ok(result.clone());
        }

        let mut columns = vec!["sql".to_string()];
        let mut row = vec![Value::Text(request.sql.clone())];
        for (i, value) in request.input_values().into_iter().enumerate() {
            columns.push(format!("p{}", i + 1));
            row.push(value.clone());
        }
        Ok(QueryResult::new(columns, vec![row]))
    }

    fn execute(&mut self, request: &DriverRequest) -> Result<u64> {
        self.log.lock().unwrap().executes.push(request.clone());
        if request.sql.contains("FAIL") {
            return Err(MapperError::ExecutionError("constraint violated".into()));
        }
        Ok(1)
    }

    fn commit(&mut self) -> Result<()> {
        self.log.lock().unwrap().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.log.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Compile and register a statement, letting `tune` adjust its flags.
pub fn add_statement(
    config: &mut Configuration,
    id: &str,
    kind: CommandKind,
    template: &str,
    tune: impl FnOnce(MappedStatement) -> MappedStatement,
) {
    let ms = config.compile_statement(id, kind, template).unwrap();
    config.add_statement(tune(ms)).unwrap();
}

pub fn factory(
    settings: Settings,
    setup: impl FnOnce(&mut Configuration),
) -> (SessionFactory, MemoryDataSource) {
    let mut config = Configuration::new(settings).unwrap();
    setup(&mut config);
    let data_source = MemoryDataSource::new();
    let factory = SessionFactory::new(Arc::new(config), Arc::new(data_source.clone()));
    (factory, data_source)
}

pub fn rows(values: &[i64]) -> QueryResult {
    QueryResult::new(
        vec!["id".to_string()],
        values.iter().map(|v| vec![Value::Integer(*v)]).collect(),
    )
}
