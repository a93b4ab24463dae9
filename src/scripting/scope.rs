// ============================================================================
// Expression Scope & Parameter Sources
// ============================================================================
//
// A scope is a layered variable environment: lookups fall through to the
// parent chain and finally to the parameter object; writes only ever land
// in the scope they were made on.
//
// ============================================================================

use crate::core::{MapperError, Result, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name under which the whole parameter object is visible to templates.
pub const PARAMETER_OBJECT_KEY: &str = "_parameter";
/// Name under which the configured database id is visible to templates.
pub const DATABASE_ID_KEY: &str = "_databaseId";
/// Name a scalar parameter is additionally bound to for `${}` substitution.
pub const SCALAR_VALUE_KEY: &str = "value";

/// Anything a statement can be invoked with.
///
/// The only capability needed is lookup by dotted property path; adapters
/// exist for [`Value`] maps, `serde_json` documents (and therefore any
/// `Serialize` struct) and plain hash maps.
pub trait ParameterSource: fmt::Debug + Send + Sync {
    /// Resolve a dotted property path. `None` means the path does not exist,
    /// which is different from a present `Value::Null`.
    fn lookup(&self, path: &str) -> Option<Value>;

    /// The whole parameter object as a value.
    fn to_value(&self) -> Value;

    fn is_scalar(&self) -> bool {
        self.to_value().is_scalar()
    }
}

impl ParameterSource for Value {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.get_path(path).cloned()
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn is_scalar(&self) -> bool {
        Value::is_scalar(self)
    }
}

impl ParameterSource for serde_json::Value {
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                serde_json::Value::Object(fields) => fields.get(segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(Value::from(current.clone()))
    }

    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    fn is_scalar(&self) -> bool {
        !matches!(self, serde_json::Value::Object(_) | serde_json::Value::Array(_))
    }
}

impl ParameterSource for HashMap<String, Value> {
    fn lookup(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.get(head)?;
        match rest {
            Some(rest) => value.get_path(rest).cloned(),
            None => Some(value.clone()),
        }
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn is_scalar(&self) -> bool {
        false
    }
}

/// Cheaply clonable handle to the parameter object of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Parameter(Option<Arc<dyn ParameterSource>>);

impl Parameter {
    /// Invocation without a parameter object.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(source: impl ParameterSource + 'static) -> Self {
        Self(Some(Arc::new(source)))
    }

    /// Adapt any serializable struct; its fields become property paths.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| MapperError::BindingError(format!("Cannot adapt parameter object: {}", e)))?;
        Ok(Self::new(json))
    }

    /// Build a map-backed parameter from `(name, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(Value::Map(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.as_ref().is_some_and(|source| source.is_scalar())
    }

    pub fn lookup(&self, path: &str) -> Option<Value> {
        self.0.as_ref().and_then(|source| source.lookup(path))
    }

    pub fn to_value(&self) -> Value {
        self.0.as_ref().map_or(Value::Null, |source| source.to_value())
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.is_none() == other.is_none() && self.to_value() == other.to_value()
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<serde_json::Value> for Parameter {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

impl From<HashMap<String, Value>> for Parameter {
    fn from(map: HashMap<String, Value>) -> Self {
        Self::new(map)
    }
}

/// Layered variable environment used while evaluating a template.
#[derive(Debug)]
pub struct ExpressionScope<'a> {
    vars: HashMap<String, Value>,
    parent: Option<&'a ExpressionScope<'a>>,
    parameter: Option<&'a Parameter>,
}

impl<'a> ExpressionScope<'a> {
    /// Root scope seeded from the parameter object.
    pub fn root(parameter: &'a Parameter, database_id: Option<&str>) -> Self {
        let mut scope = Self {
            vars: HashMap::new(),
            parent: None,
            parameter: Some(parameter),
        };
        let whole = parameter.to_value();
        if parameter.is_scalar() {
            scope.set(SCALAR_VALUE_KEY, whole.clone());
        }
        scope.set(PARAMETER_OBJECT_KEY, whole);
        scope.set(DATABASE_ID_KEY, Value::from(database_id.map(str::to_string)));
        scope
    }

    /// Scope with no parameter object and no bindings.
    pub fn empty() -> ExpressionScope<'static> {
        ExpressionScope {
            vars: HashMap::new(),
            parent: None,
            parameter: None,
        }
    }

    /// Child scope whose writes never reach `self`.
    pub fn child(&self) -> ExpressionScope<'_> {
        ExpressionScope {
            vars: HashMap::new(),
            parent: Some(self),
            parameter: self.parameter,
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Variable lookup through the parent chain (parameter object excluded).
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.vars.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.get(name)),
        }
    }

    /// Resolve a dotted path: the first segment is looked up among the
    /// bound variables, then against the parameter object.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        if let Some(value) = self.get(head) {
            return match rest {
                Some(rest) => value.get_path(rest).cloned(),
                None => Some(value.clone()),
            };
        }
        self.parameter.and_then(|parameter| parameter.lookup(path))
    }
}
