use crate::cache::CacheRegion;
use crate::core::{MapperError, Result};
use crate::driver::Connection;
use crate::executor::{
    CachingExecutor, DefaultParameterHandler, DefaultResultSetHandler, DefaultStatementHandler,
    Executor, ParameterHandler, ResultSetHandler, SharedResultHandler, SimpleExecutor,
    StatementHandler,
};
use crate::mapping::{BoundCommand, CommandKind, MappedStatement, RowBounds};
use crate::plugin::{Interceptor, InterceptorChain};
use crate::scripting::{CompileOptions, ScriptCompiler};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of entries in the session cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocalCacheScope {
    /// Entries live until a write, commit, rollback or close.
    #[default]
    Session,
    /// Entries are dropped after every query.
    Statement,
}

/// Global settings
///
/// Loadable from JSON; every field is optional there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cache key discriminator between environments sharing regions
    pub environment_id: String,

    /// Exposed to templates as `_databaseId`
    pub database_id: Option<String>,

    /// Wrap executors with the shared cache tier
    pub cache_enabled: bool,

    pub local_cache_scope: LocalCacheScope,

    /// Seconds, handed to the driver for statements without their own
    pub default_statement_timeout: Option<u64>,

    pub default_fetch_size: Option<u32>,

    /// Collapse whitespace runs in the final SQL
    pub shrink_whitespaces_in_sql: bool,

    /// `nullable` of a `<foreach>` that does not set it
    pub nullable_on_for_each: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment_id: "default".to_string(),
            database_id: None,
            cache_enabled: true,
            local_cache_scope: LocalCacheScope::Session,
            default_statement_timeout: None,
            default_fetch_size: None,
            shrink_whitespaces_in_sql: false,
            nullable_on_for_each: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| MapperError::ConfigError(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn environment_id(mut self, environment_id: &str) -> Self {
        self.environment_id = environment_id.to_string();
        self
    }

    pub fn database_id(mut self, database_id: &str) -> Self {
        self.database_id = Some(database_id.to_string());
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn local_cache_scope(mut self, scope: LocalCacheScope) -> Self {
        self.local_cache_scope = scope;
        self
    }

    pub fn default_statement_timeout(mut self, seconds: u64) -> Self {
        self.default_statement_timeout = Some(seconds);
        self
    }

    pub fn default_fetch_size(mut self, fetch_size: u32) -> Self {
        self.default_fetch_size = Some(fetch_size);
        self
    }

    pub fn shrink_whitespaces_in_sql(mut self, shrink: bool) -> Self {
        self.shrink_whitespaces_in_sql = shrink;
        self
    }

    pub fn nullable_on_for_each(mut self, nullable: bool) -> Self {
        self.nullable_on_for_each = nullable;
        self
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.default_statement_timeout.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.environment_id.trim().is_empty() {
            return Err(MapperError::ConfigError("environment_id must not be empty".into()));
        }
        if self.database_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(MapperError::ConfigError("database_id must not be empty when set".into()));
        }
        if self.default_statement_timeout == Some(0) {
            return Err(MapperError::ConfigError(
                "default_statement_timeout must be greater than 0".into(),
            ));
        }
        if self.default_fetch_size == Some(0) {
            return Err(MapperError::ConfigError("default_fetch_size must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Registries and factories shared by every session.
///
/// Built once, then frozen behind an `Arc` for the session factory. Cache
/// regions are the only state shared between sessions at run time.
pub struct Configuration {
    settings: Settings,
    compiler: ScriptCompiler,
    statements: HashMap<String, Arc<MappedStatement>>,
    caches: HashMap<String, Arc<CacheRegion>>,
    interceptor_chain: InterceptorChain,
}

impl Configuration {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let compiler = ScriptCompiler::new(CompileOptions {
            shrink_whitespace: settings.shrink_whitespaces_in_sql,
            nullable_on_for_each: settings.nullable_on_for_each,
        });
        Ok(Self {
            settings,
            compiler,
            statements: HashMap::new(),
            caches: HashMap::new(),
            interceptor_chain: InterceptorChain::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn script_compiler(&self) -> &ScriptCompiler {
        &self.compiler
    }

    /// Compile `template` into a statement with default flags. Template
    /// errors surface here.
    pub fn compile_statement(&self, id: &str, kind: CommandKind, template: &str) -> Result<MappedStatement> {
        let source = self
            .compiler
            .compile(template)
            .map_err(|e| match e {
                MapperError::TemplateError(msg) => {
                    MapperError::TemplateError(format!("Error compiling statement {}: {}", id, msg))
                }
                other => other,
            })?;
        Ok(MappedStatement::new(id, kind, source))
    }

    pub fn add_statement(&mut self, statement: MappedStatement) -> Result<Arc<MappedStatement>> {
        if self.statements.contains_key(&statement.id) {
            return Err(MapperError::DuplicateStatement(statement.id));
        }
        debug!("Registered mapped statement: {}", statement.id);
        let statement = Arc::new(statement);
        self.statements
            .insert(statement.id.clone(), Arc::clone(&statement));
        Ok(statement)
    }

    pub fn get_statement(&self, id: &str) -> Result<Arc<MappedStatement>> {
        self.statements
            .get(id)
            .cloned()
            .ok_or_else(|| MapperError::StatementNotFound(id.to_string()))
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    pub fn statement_ids(&self) -> impl Iterator<Item = &str> {
        self.statements.keys().map(String::as_str)
    }

    /// Register a shared region under its id, which is the namespace it
    /// serves.
    pub fn add_cache(&mut self, region: CacheRegion) -> Result<Arc<CacheRegion>> {
        if self.caches.contains_key(region.id()) {
            return Err(MapperError::ConfigError(format!(
                "Cache region '{}' already registered",
                region.id()
            )));
        }
        let region = Arc::new(region);
        self.caches.insert(region.id().to_string(), Arc::clone(&region));
        Ok(region)
    }

    pub fn cache(&self, namespace: &str) -> Option<Arc<CacheRegion>> {
        self.caches.get(namespace).cloned()
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) -> Result<()> {
        self.interceptor_chain.add_interceptor(interceptor)
    }

    pub fn add_interceptor_with_properties(
        &mut self,
        interceptor: Box<dyn Interceptor>,
        properties: &HashMap<String, String>,
    ) -> Result<()> {
        self.interceptor_chain
            .add_interceptor_with_properties(interceptor, properties)
    }

    pub fn interceptor_chain(&self) -> &InterceptorChain {
        &self.interceptor_chain
    }

    /// Executor stack for one session.
    pub fn new_executor(self: &Arc<Self>, connection: Connection) -> Box<dyn Executor> {
        let mut executor: Box<dyn Executor> =
            Box::new(SimpleExecutor::new(Arc::clone(self), connection));
        if self.settings.cache_enabled {
            executor = Box::new(CachingExecutor::new(executor, Arc::clone(self)));
        }
        self.interceptor_chain.plugin_all(executor)
    }

    pub fn new_statement_handler(
        &self,
        ms: Arc<MappedStatement>,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
        command: BoundCommand,
        connection: Connection,
    ) -> Box<dyn StatementHandler> {
        let parameter_handler = self.new_parameter_handler(command.clone());
        let result_set_handler = self.new_result_set_handler(bounds, handler);
        let statement = DefaultStatementHandler::new(
            ms,
            command,
            connection,
            parameter_handler,
            result_set_handler,
        )
        .with_defaults(self.settings.statement_timeout(), self.settings.default_fetch_size);
        self.interceptor_chain
            .plugin_all(Box::new(statement) as Box<dyn StatementHandler>)
    }

    pub fn new_parameter_handler(&self, command: BoundCommand) -> Box<dyn ParameterHandler> {
        self.interceptor_chain
            .plugin_all(Box::new(DefaultParameterHandler::new(command)) as Box<dyn ParameterHandler>)
    }

    pub fn new_result_set_handler(
        &self,
        bounds: RowBounds,
        handler: Option<SharedResultHandler>,
    ) -> Box<dyn ResultSetHandler> {
        self.interceptor_chain.plugin_all(
            Box::new(DefaultResultSetHandler::new(bounds, handler)) as Box<dyn ResultSetHandler>
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_json() {
        let settings = Settings::from_json(
            r#"{"environment_id": "prod", "local_cache_scope": "STATEMENT", "default_fetch_size": 100}"#,
        )
        .unwrap();
        assert_eq!(settings.environment_id, "prod");
        assert_eq!(settings.local_cache_scope, LocalCacheScope::Statement);
        assert_eq!(settings.default_fetch_size, Some(100));
        assert!(settings.cache_enabled);
    }

    #[test]
    fn test_settings_validation() {
        assert!(Settings::new().validate().is_ok());
        assert!(Settings::new().environment_id("").validate().is_err());
        assert!(Settings::new().default_fetch_size(0).validate().is_err());
        assert!(Settings::from_json(r#"{"default_statement_timeout": 0}"#).is_err());
        assert!(matches!(
            Settings::from_json("{not json"),
            Err(MapperError::ConfigError(_))
        ));
    }

    #[test]
    fn test_duplicate_statement() {
        let mut config = Configuration::new(Settings::new()).unwrap();
        let ms = config
            .compile_statement("user.find", CommandKind::Select, "SELECT 1")
            .unwrap();
        config.add_statement(ms.clone()).unwrap();
        assert!(matches!(
            config.add_statement(ms),
            Err(MapperError::DuplicateStatement(id)) if id == "user.find"
        ));
    }

    #[test]
    fn test_unknown_statement() {
        let config = Configuration::new(Settings::new()).unwrap();
        assert!(matches!(
            config.get_statement("nope"),
            Err(MapperError::StatementNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_compile_error_names_statement() {
        let config = Configuration::new(Settings::new()).unwrap();
        let err = config
            .compile_statement("user.bad", CommandKind::Select, "SELECT <oops>1</oops>")
            .unwrap_err();
        assert!(err.to_string().contains("user.bad"));
    }

    #[test]
    fn test_duplicate_cache_region() {
        let mut config = Configuration::new(Settings::new()).unwrap();
        config.add_cache(CacheRegion::lru("user")).unwrap();
        assert!(config.cache("user").is_some());
        assert!(config.add_cache(CacheRegion::perpetual("user")).is_err());
    }
}
