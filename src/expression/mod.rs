//! Test, bind and collection expressions used inside templates.
//!
//! Expressions are parsed once when a template is compiled and evaluated
//! against an [`ExpressionScope`] every time the template is rendered.

pub mod ast;
pub mod converter;
pub mod evaluator;
pub mod plugins;

pub use ast::{BinaryOp, Expr, Method};
pub use evaluator::{EvaluationContext, EvaluatorRegistry, ExpressionEvaluator};

use crate::core::{MapperError, Result, Value};
use crate::scripting::ExpressionScope;
use converter::ExpressionConverter;

lazy_static::lazy_static! {
    static ref CONVERTER: ExpressionConverter = ExpressionConverter::new();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Fails with `TemplateError` when the source is malformed.
    pub fn parse(source: &str) -> Result<Self> {
        let root = CONVERTER.parse(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn evaluate(&self, scope: &ExpressionScope<'_>) -> Result<Value> {
        let context = EvaluationContext::new(evaluator::default_registry(), scope);
        context.evaluate(&self.root).map_err(|e| match e {
            MapperError::EvaluationError(msg) => MapperError::EvaluationError(format!(
                "Error evaluating expression '{}': {}",
                self.source, msg
            )),
            other => other,
        })
    }

    pub fn evaluate_boolean(&self, scope: &ExpressionScope<'_>) -> Result<bool> {
        Ok(self.evaluate(scope)?.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::Parameter;

    fn eval(src: &str, parameter: &Parameter) -> Value {
        let scope = ExpressionScope::root(parameter, None);
        Expression::parse(src).unwrap().evaluate(&scope).unwrap()
    }

    #[test]
    fn test_guard_expressions() {
        let p = Parameter::from_pairs([("name", Value::from("bob")), ("age", Value::Null)]);
        assert_eq!(eval("name != null", &p), Value::Boolean(true));
        assert_eq!(eval("age != null", &p), Value::Boolean(false));
        assert_eq!(eval("missing == null", &p), Value::Boolean(true));
        assert_eq!(eval("name != null and name != ''", &p), Value::Boolean(true));
        assert_eq!(eval("name != null && age == null", &p), Value::Boolean(true));
    }

    #[test]
    fn test_methods_and_concat() {
        let p = Parameter::from(Value::from(serde_json::json!({"ids": [1, 2, 3], "name": "al"})));
        assert_eq!(eval("ids.size() > 2", &p), Value::Boolean(true));
        assert_eq!(eval("'%' + name + '%'", &p), Value::Text("%al%".into()));
        assert_eq!(eval("ids.isEmpty()", &p), Value::Boolean(false));
    }

    #[test]
    fn test_truthiness() {
        let p = Parameter::from_pairs([("n", 0), ("flag", 1)]);
        assert!(!Expression::parse("n").unwrap().evaluate_boolean(&ExpressionScope::root(&p, None)).unwrap());
        assert!(Expression::parse("flag").unwrap().evaluate_boolean(&ExpressionScope::root(&p, None)).unwrap());
        assert!(!Expression::parse("nothing").unwrap().evaluate_boolean(&ExpressionScope::root(&p, None)).unwrap());
    }

    #[test]
    fn test_evaluation_error_mentions_source() {
        let p = Parameter::from_pairs([("flag", true)]);
        let scope = ExpressionScope::root(&p, None);
        let err = Expression::parse("flag > 1").unwrap().evaluate(&scope).unwrap_err();
        match err {
            MapperError::EvaluationError(msg) => assert!(msg.contains("flag > 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
