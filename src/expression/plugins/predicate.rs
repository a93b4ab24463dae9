use crate::core::{Result, Value};
use crate::expression::ast::{BinaryOp, Expr};
use crate::expression::evaluator::{EvaluationContext, ExpressionEvaluator};

/// `and`/`or` with short-circuit, and `not`/`!`.
pub struct BooleanEvaluator;

impl ExpressionEvaluator for BooleanEvaluator {
    fn name(&self) -> &'static str {
        "BOOLEAN"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Not(_))
            || matches!(expr, Expr::BinaryOp { op, .. } if op.is_logical())
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let truth = match expr {
            Expr::Not(inner) => !context.evaluate(inner)?.as_bool(),
            Expr::BinaryOp { left, op, right } => {
                let left = context.evaluate(left)?.as_bool();
                match (op, left) {
                    (BinaryOp::And, false) => false,
                    (BinaryOp::Or, true) => true,
                    _ => context.evaluate(right)?.as_bool(),
                }
            }
            _ => unreachable!(),
        };
        Ok(Value::Boolean(truth))
    }
}

/// `x is null` / `x is not null`.
pub struct NullCheckEvaluator;

impl ExpressionEvaluator for NullCheckEvaluator {
    fn name(&self) -> &'static str {
        "NULL_CHECK"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::IsNull { .. })
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::IsNull { expr, negated } = expr else {
            unreachable!();
        };
        Ok(Value::Boolean(context.evaluate(expr)?.is_null() != *negated))
    }
}

/// `x in (a, b)`. A single candidate that is itself a collection is
/// searched element-wise, so `status in (allowed)` tests list membership.
pub struct MembershipEvaluator;

impl ExpressionEvaluator for MembershipEvaluator {
    fn name(&self) -> &'static str {
        "MEMBERSHIP"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::InList { .. })
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::InList { expr, list, negated } = expr else {
            unreachable!();
        };

        let needle = context.evaluate(expr)?;
        let candidates = match list.as_slice() {
            [single] => match context.evaluate(single)? {
                Value::List(items) => items,
                other => vec![other],
            },
            many => many
                .iter()
                .map(|item| context.evaluate(item))
                .collect::<Result<Vec<_>>>()?,
        };

        let found = candidates.iter().any(|c| c.loosely_equals(&needle));
        Ok(Value::Boolean(found != *negated))
    }
}

#[cfg(test)]
mod tests {
    use crate::core::Value;
    use crate::expression::Expression;
    use crate::scripting::{ExpressionScope, Parameter};
    use serde_json::json;

    fn truth(src: &str, parameter: &Parameter) -> bool {
        let scope = ExpressionScope::root(parameter, None);
        Expression::parse(src)
            .unwrap()
            .evaluate_boolean(&scope)
            .unwrap()
    }

    #[test]
    fn test_short_circuit_skips_failing_operand() {
        let p = Parameter::from(json!({"flag": false, "name": "x"}));
        // `name > 1` would fail to compare text with a number
        assert!(!truth("flag and name > 1", &p));
        assert!(truth("not flag or name > 1", &p));
    }

    #[test]
    fn test_null_checks() {
        let p = Parameter::from(json!({"a": null, "b": 1}));
        assert!(truth("a is null", &p));
        assert!(truth("b is not null", &p));
        assert!(truth("missing is null", &p));
    }

    #[test]
    fn test_membership() {
        let p = Parameter::from(json!({"status": "open", "allowed": ["open", "held"], "n": 2}));
        assert!(truth("status in ('open', 'closed')", &p));
        assert!(truth("status in (allowed)", &p));
        assert!(truth("n not in (allowed)", &p));
        assert!(truth("n in (1.0, 2.0)", &p));
        assert_eq!(
            Expression::parse("status in ('x')")
                .unwrap()
                .evaluate(&ExpressionScope::root(&p, None))
                .unwrap(),
            Value::Boolean(false)
        );
    }
}
