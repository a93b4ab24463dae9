use super::ast::{Expr, Method};
use super::plugins;
use crate::core::{MapperError, Result, Value};
use crate::scripting::ExpressionScope;

lazy_static::lazy_static! {
    static ref DEFAULT_REGISTRY: EvaluatorRegistry = EvaluatorRegistry::with_default_evaluators();
}

/// Shared registry with the built-in evaluators.
pub fn default_registry() -> &'static EvaluatorRegistry {
    &DEFAULT_REGISTRY
}

/// Evaluates one family of [`Expr`] nodes.
pub trait ExpressionEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_evaluate(&self, expr: &Expr) -> bool;

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value>;
}

pub struct EvaluationContext<'a> {
    registry: &'a EvaluatorRegistry,
    scope: &'a ExpressionScope<'a>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(registry: &'a EvaluatorRegistry, scope: &'a ExpressionScope<'a>) -> Self {
        Self { registry, scope }
    }

    pub fn scope(&self) -> &ExpressionScope<'a> {
        self.scope
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(val) => return Ok(val.clone()),
            // Unbound names read as null so `x != null` guards work
            Expr::Property(path) => return Ok(self.scope.resolve(path).unwrap_or(Value::Null)),
            Expr::Method { target, method } => {
                let value = self.scope.resolve(target).unwrap_or(Value::Null);
                return invoke_method(target, &value, *method);
            }
            _ => {}
        }

        if let Some(evaluator) = self.registry.find_evaluator(expr) {
            return evaluator.evaluate(expr, self);
        }

        Err(MapperError::EvaluationError(format!(
            "No evaluator found for expression: {:?}",
            expr
        )))
    }
}

fn invoke_method(target: &str, value: &Value, method: Method) -> Result<Value> {
    let size = value.size().ok_or_else(|| {
        MapperError::EvaluationError(format!(
            "Cannot call {:?} on '{}' of type {}",
            method,
            target,
            value.type_name()
        ))
    })?;
    match method {
        Method::Size | Method::Length => Ok(Value::Integer(size as i64)),
        Method::IsEmpty => Ok(Value::Boolean(size == 0)),
    }
}

pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn ExpressionEvaluator>) {
        log::trace!("Registered evaluator: {}", evaluator.name());
        self.evaluators.push(evaluator);
    }

    pub fn with_default_evaluators() -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(plugins::predicate::BooleanEvaluator));
        registry.register(Box::new(plugins::comparison::ComparisonEvaluator));
        registry.register(Box::new(plugins::arithmetic::ArithmeticEvaluator));
        registry.register(Box::new(plugins::predicate::NullCheckEvaluator));
        registry.register(Box::new(plugins::predicate::MembershipEvaluator));

        registry
    }

    fn find_evaluator(&self, expr: &Expr) -> Option<&dyn ExpressionEvaluator> {
        self.evaluators
            .iter()
            .find(|ev| ev.can_evaluate(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}
