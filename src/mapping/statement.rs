use crate::scripting::SqlSource;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl CommandKind {
    pub fn is_select(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// How the driver should run the SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatementType {
    /// Unprepared, values inlined by the driver.
    Statement,
    #[default]
    Prepared,
    /// Stored procedure call; may declare OUT / INOUT parameters.
    Callable,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyGeneration {
    #[default]
    None,
    /// Ask the driver for generated keys after an insert.
    Generated {
        key_properties: Vec<String>,
        key_columns: Vec<String>,
    },
}

/// Compiled representation of one mapped SQL operation.
///
/// Immutable once registered. `flush_cache` defaults to `true` for writes
/// and `use_cache` to `true` for selects.
#[derive(Debug, Clone)]
pub struct MappedStatement {
    pub id: String,
    pub command_kind: CommandKind,
    pub statement_type: StatementType,
    pub sql_source: SqlSource,
    /// Namespace whose cache region this statement uses.
    pub cache_ref: Option<String>,
    pub use_cache: bool,
    pub flush_cache: bool,
    pub result_ordered: bool,
    pub key_generation: KeyGeneration,
    pub timeout: Option<Duration>,
    pub fetch_size: Option<u32>,
}

impl MappedStatement {
    pub fn new(id: &str, command_kind: CommandKind, sql_source: SqlSource) -> Self {
        let is_select = command_kind.is_select();
        Self {
            id: id.to_string(),
            command_kind,
            statement_type: StatementType::default(),
            sql_source,
            cache_ref: None,
            use_cache: is_select,
            flush_cache: !is_select,
            result_ordered: false,
            key_generation: KeyGeneration::None,
            timeout: None,
            fetch_size: None,
        }
    }

    /// Attach the statement to the cache region of `namespace`.
    pub fn cache_ref(mut self, namespace: &str) -> Self {
        self.cache_ref = Some(namespace.to_string());
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn flush_cache(mut self, flush_cache: bool) -> Self {
        self.flush_cache = flush_cache;
        self
    }

    pub fn result_ordered(mut self, result_ordered: bool) -> Self {
        self.result_ordered = result_ordered;
        self
    }

    pub fn statement_type(mut self, statement_type: StatementType) -> Self {
        self.statement_type = statement_type;
        self
    }

    pub fn key_generation(mut self, key_generation: KeyGeneration) -> Self {
        self.key_generation = key_generation;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }

    /// Everything before the last `.` of the id.
    pub fn namespace(&self) -> &str {
        self.id.rsplit_once('.').map_or("", |(namespace, _)| namespace)
    }
}
