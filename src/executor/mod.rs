pub mod caching;
pub mod executor;
pub mod parameter;
pub mod result_handler;
pub mod result_set;
pub mod simple;
pub mod statement;

pub use caching::CachingExecutor;
pub use executor::Executor;
pub use parameter::{DefaultParameterHandler, ParameterHandler};
pub use result_handler::{ResultContext, ResultHandler, SharedResultHandler};
pub use result_set::{DefaultResultSetHandler, ResultSetHandler};
pub use simple::SimpleExecutor;
pub use statement::{DefaultStatementHandler, StatementHandler};
