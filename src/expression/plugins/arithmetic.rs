use crate::core::{MapperError, Result, Value};
use crate::expression::ast::{BinaryOp, Expr};
use crate::expression::evaluator::{EvaluationContext, ExpressionEvaluator};

/// `+ - * / %` plus unary minus. `+` concatenates once either side is text.
pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn name(&self) -> &'static str {
        "ARITHMETIC"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Negate(_))
            || matches!(expr, Expr::BinaryOp { op, .. } if op.is_arithmetic())
    }

    fn evaluate(&self, expr: &Expr, context: &EvaluationContext<'_>) -> Result<Value> {
        match expr {
            Expr::Negate(inner) => self.negate(context.evaluate(inner)?),
            Expr::BinaryOp { left, op, right } => {
                let left_val = context.evaluate(left)?;
                let right_val = context.evaluate(right)?;
                self.apply(&left_val, &right_val, op)
            }
            _ => unreachable!(),
        }
    }
}

impl ArithmeticEvaluator {
    fn negate(&self, value: Value) -> Result<Value> {
        match value {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| MapperError::EvaluationError("Integer overflow in negation".into())),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(MapperError::EvaluationError(format!(
                "Cannot negate {}",
                other.type_name()
            ))),
        }
    }

    pub fn apply(&self, left: &Value, right: &Value, op: &BinaryOp) -> Result<Value> {
        // String concatenation wins as soon as one side is text
        if *op == BinaryOp::Add
            && (matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)))
        {
            return Ok(Value::Text(format!("{}{}", left, right)));
        }

        match (left, right) {
            (Value::Integer(a), Value::Integer(b)) => self.apply_integer(*a, *b, op),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                // is_numeric guarantees both conversions succeed
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                self.apply_float(a, b, op)
            }
            _ => Err(MapperError::EvaluationError(format!(
                "Cannot apply {:?} to {} and {}",
                op,
                left.type_name(),
                right.type_name()
            ))),
        }
    }

    fn apply_integer(&self, a: i64, b: i64, op: &BinaryOp) -> Result<Value> {
        let overflow = || MapperError::EvaluationError(format!("Integer overflow in {:?}", op));
        let result = match op {
            BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
            BinaryOp::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
            BinaryOp::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
            BinaryOp::Divide | BinaryOp::Modulo if b == 0 => {
                return Err(MapperError::EvaluationError("Division by zero".into()));
            }
            BinaryOp::Divide => a.checked_div(b).ok_or_else(overflow)?,
            BinaryOp::Modulo => a.checked_rem(b).ok_or_else(overflow)?,
            _ => unreachable!(),
        };
        Ok(Value::Integer(result))
    }

    fn apply_float(&self, a: f64, b: f64, op: &BinaryOp) -> Result<Value> {
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => {
                return Err(MapperError::EvaluationError("Division by zero".into()));
            }
            BinaryOp::Divide => a / b,
            BinaryOp::Modulo => a % b,
            _ => unreachable!(),
        };
        Ok(Value::Float(result))
    }
}
