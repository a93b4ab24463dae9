// ============================================================================
// rustsqlmap Library
// ============================================================================
//
// Maps statement ids to dynamic SQL templates, executes them through a
// pluggable pipeline and caches results in two tiers: a per-session local
// cache and transactional shared regions per namespace.
//
// ============================================================================

pub mod cache;
pub mod config;
pub mod core;
pub mod driver;
pub mod executor;
pub mod expression;
pub mod mapping;
pub mod plugin;
pub mod result;
pub mod scripting;
pub mod session;

pub use cache::{Cache, CacheKey, CacheRegion, LruCache, PerpetualCache};
pub use config::{Configuration, LocalCacheScope, Settings};
pub use core::{MapperError, Result, Row, Value};
pub use driver::{DataSource, Driver, DriverParameter, DriverRequest};
pub use executor::{ResultContext, ResultHandler, SharedResultHandler};
pub use mapping::{
    BoundCommand, CommandKind, KeyGeneration, MappedStatement, ParameterMapping, ParameterMode,
    RowBounds, StatementType,
};
pub use plugin::{Arg, Capability, Interceptor, Invocation, Reply, Signature, Target};
pub use result::QueryResult;
pub use scripting::{Parameter, ParameterSource, ScriptCompiler, SqlSource};
pub use session::{Session, SessionFactory};
