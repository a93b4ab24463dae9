use crate::core::{Result, Value};
use crate::expression::ast::{BinaryOp, Expr};
use crate::expression::evaluator::{EvaluationContext, ExpressionEvaluator};
use std::cmp::Ordering;

pub struct ComparisonEvaluator;

impl ExpressionEvaluator for ComparisonEvaluator {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::BinaryOp { op, .. } if op.is_comparison())
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        let Expr::BinaryOp { left, op, right } = expr else {
            unreachable!();
        };

        let left_val = context.evaluate(left)?;
        let right_val = context.evaluate(right)?;

        Ok(Value::Boolean(self.compare(&left_val, &right_val, op)?))
    }
}

impl ComparisonEvaluator {
    pub fn compare(&self, left: &Value, right: &Value, op: &BinaryOp) -> Result<bool> {
        match op {
            BinaryOp::Eq => return Ok(left.loosely_equals(right)),
            BinaryOp::NotEq => return Ok(!left.loosely_equals(right)),
            _ => {}
        }

        // Ordering against null is never true
        if left.is_null() || right.is_null() {
            return Ok(false);
        }

        let ord = left.compare(right)?;
        Ok(match op {
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::LtEq => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::GtEq => ord != Ordering::Less,
            _ => unreachable!(),
        })
    }
}
