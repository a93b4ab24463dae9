use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapperError {
    /// Malformed template, unknown tag or duplicate `otherwise`.
    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Binding error: {0}")]
    BindingError(String),

    #[error("Cache configuration error: {0}")]
    CacheConfigError(String),

    /// Raised by the driver, or by a shared cache store that failed.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Plugin configuration error: {0}")]
    PluginConfigError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Mapped statement '{0}' not found")]
    StatementNotFound(String),

    #[error("Mapped statement '{0}' already registered")]
    DuplicateStatement(String),

    #[error("Expected one result (or null) to be returned, but found: {0}")]
    TooManyResults(usize),

    #[error("Executor was closed")]
    ExecutorClosed,

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, MapperError>;

impl<T> From<std::sync::PoisonError<T>> for MapperError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<sqlparser::parser::ParserError> for MapperError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self::TemplateError(err.to_string())
    }
}
