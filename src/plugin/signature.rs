use crate::core::{MapperError, Result};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Pipeline interfaces an interceptor may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Executor,
    StatementHandler,
    ParameterHandler,
    ResultSetHandler,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Executor,
        Capability::StatementHandler,
        Capability::ParameterHandler,
        Capability::ResultSetHandler,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Capability::Executor => "Executor",
            Capability::StatementHandler => "StatementHandler",
            Capability::ParameterHandler => "ParameterHandler",
            Capability::ResultSetHandler => "ResultSetHandler",
        }
    }

    /// Interceptable methods of the interface. Plain accessors such as
    /// `is_closed` or `bound_command` are not listed and always pass through.
    pub fn methods(&self) -> &'static [MethodId] {
        match self {
            Capability::Executor => &methods::EXECUTOR,
            Capability::StatementHandler => &methods::STATEMENT_HANDLER,
            Capability::ParameterHandler => &methods::PARAMETER_HANDLER,
            Capability::ResultSetHandler => &methods::RESULT_SET_HANDLER,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| MapperError::PluginConfigError(format!("Unknown interceptable type '{}'", s)))
    }
}

/// Identity of one interceptable method: interface, name and parameter
/// types. Overloads share a name and differ in parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId {
    pub capability: Capability,
    pub name: &'static str,
    pub params: &'static [&'static str],
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.capability, self.name, self.params.join(", "))
    }
}

pub mod methods {
    use super::{Capability, MethodId};

    const fn method(
        capability: Capability,
        name: &'static str,
        params: &'static [&'static str],
    ) -> MethodId {
        MethodId {
            capability,
            name,
            params,
        }
    }

    pub const EXECUTOR_UPDATE: MethodId =
        method(Capability::Executor, "update", &["MappedStatement", "Parameter"]);
    pub const EXECUTOR_QUERY: MethodId = method(
        Capability::Executor,
        "query",
        &["MappedStatement", "Parameter", "RowBounds", "ResultHandler"],
    );
    pub const EXECUTOR_QUERY_BOUND: MethodId = method(
        Capability::Executor,
        "query",
        &[
            "MappedStatement",
            "Parameter",
            "RowBounds",
            "ResultHandler",
            "CacheKey",
            "BoundCommand",
        ],
    );
    pub const EXECUTOR_COMMIT: MethodId = method(Capability::Executor, "commit", &["bool"]);
    pub const EXECUTOR_ROLLBACK: MethodId = method(Capability::Executor, "rollback", &["bool"]);
    pub const EXECUTOR_CREATE_CACHE_KEY: MethodId = method(
        Capability::Executor,
        "create_cache_key",
        &["MappedStatement", "Parameter", "RowBounds", "BoundCommand"],
    );
    pub const EXECUTOR_IS_CACHED: MethodId =
        method(Capability::Executor, "is_cached", &["MappedStatement", "CacheKey"]);
    pub const EXECUTOR_CLEAR_LOCAL_CACHE: MethodId =
        method(Capability::Executor, "clear_local_cache", &[]);
    pub const EXECUTOR_CLOSE: MethodId = method(Capability::Executor, "close", &["bool"]);

    pub const STATEMENT_PREPARE: MethodId = method(Capability::StatementHandler, "prepare", &[]);
    pub const STATEMENT_PARAMETERIZE: MethodId =
        method(Capability::StatementHandler, "parameterize", &["DriverRequest"]);
    pub const STATEMENT_UPDATE: MethodId =
        method(Capability::StatementHandler, "update", &["DriverRequest"]);
    pub const STATEMENT_QUERY: MethodId =
        method(Capability::StatementHandler, "query", &["DriverRequest"]);

    pub const PARAMETER_SET_PARAMETERS: MethodId =
        method(Capability::ParameterHandler, "set_parameters", &["DriverRequest"]);

    pub const RESULT_SET_HANDLE: MethodId =
        method(Capability::ResultSetHandler, "handle_result_set", &["QueryResult"]);

    pub(super) static EXECUTOR: [MethodId; 9] = [
        EXECUTOR_UPDATE,
        EXECUTOR_QUERY,
        EXECUTOR_QUERY_BOUND,
        EXECUTOR_COMMIT,
        EXECUTOR_ROLLBACK,
        EXECUTOR_CREATE_CACHE_KEY,
        EXECUTOR_IS_CACHED,
        EXECUTOR_CLEAR_LOCAL_CACHE,
        EXECUTOR_CLOSE,
    ];
    pub(super) static STATEMENT_HANDLER: [MethodId; 4] = [
        STATEMENT_PREPARE,
        STATEMENT_PARAMETERIZE,
        STATEMENT_UPDATE,
        STATEMENT_QUERY,
    ];
    pub(super) static PARAMETER_HANDLER: [MethodId; 1] = [PARAMETER_SET_PARAMETERS];
    pub(super) static RESULT_SET_HANDLER: [MethodId; 1] = [RESULT_SET_HANDLE];
}

/// Method an interceptor declares it wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub capability: Capability,
    pub method: String,
    pub args: Vec<String>,
}

impl Signature {
    pub fn new(capability: Capability, method: &str, args: &[&str]) -> Self {
        Self {
            capability,
            method: method.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn matches(&self, method: &MethodId) -> bool {
        method.capability == self.capability
            && method.name == self.method
            && method.params.len() == self.args.len()
            && method.params.iter().zip(&self.args).all(|(p, a)| *p == a.as_str())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.capability, self.method, self.args.join(", "))
    }
}

/// Signatures of one interceptor resolved against the method tables.
#[derive(Debug, Clone, Default)]
pub struct ProxyBinding {
    methods: HashSet<MethodId>,
    capabilities: HashSet<Capability>,
}

impl ProxyBinding {
    /// Fails when a signature names a method the interface does not have.
    pub fn resolve(interceptor: &str, signatures: &[Signature]) -> Result<Self> {
        let mut binding = Self::default();
        for signature in signatures {
            let method = signature
                .capability
                .methods()
                .iter()
                .find(|m| signature.matches(m))
                .ok_or_else(|| {
                    MapperError::PluginConfigError(format!(
                        "Could not find method on {} named {} for interceptor {}. Cause: no method {}",
                        signature.capability, signature.method, interceptor, signature
                    ))
                })?;
            binding.methods.insert(*method);
            binding.capabilities.insert(method.capability);
        }
        Ok(binding)
    }

    pub fn intercepts(&self, method: &MethodId) -> bool {
        self.methods.contains(method)
    }

    pub fn covers(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Interfaces of `implemented` this binding touches.
    pub fn intersect(&self, implemented: &[Capability]) -> Vec<Capability> {
        implemented
            .iter()
            .copied()
            .filter(|c| self.covers(*c))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_overloaded_query() {
        let binding = ProxyBinding::resolve(
            "paging",
            &[Signature::new(
                Capability::Executor,
                "query",
                &["MappedStatement", "Parameter", "RowBounds", "ResultHandler"],
            )],
        )
        .unwrap();

        assert!(binding.intercepts(&methods::EXECUTOR_QUERY));
        assert!(!binding.intercepts(&methods::EXECUTOR_QUERY_BOUND));
        assert!(binding.covers(Capability::Executor));
        assert!(!binding.covers(Capability::StatementHandler));
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let err = ProxyBinding::resolve(
            "broken",
            &[Signature::new(Capability::Executor, "flushStatements", &[])],
        )
        .unwrap_err();
        assert!(matches!(err, MapperError::PluginConfigError(_)));

        let err = ProxyBinding::resolve(
            "broken",
            &[Signature::new(Capability::StatementHandler, "prepare", &["bool"])],
        )
        .unwrap_err();
        assert!(matches!(err, MapperError::PluginConfigError(_)));
    }

    #[test]
    fn test_intersect() {
        let binding = ProxyBinding::resolve(
            "p",
            &[Signature::new(Capability::ParameterHandler, "set_parameters", &["DriverRequest"])],
        )
        .unwrap();
        assert_eq!(
            binding.intersect(&[Capability::ParameterHandler, Capability::ResultSetHandler]),
            vec![Capability::ParameterHandler]
        );
        assert!(binding.intersect(&[Capability::Executor]).is_empty());
    }

    #[test]
    fn test_capability_from_str() {
        assert_eq!("Executor".parse::<Capability>().unwrap(), Capability::Executor);
        assert!("Foo".parse::<Capability>().is_err());
        assert_eq!(
            methods::STATEMENT_PREPARE.to_string(),
            "StatementHandler.prepare()"
        );
    }
}
