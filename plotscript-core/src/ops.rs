//! Numeric operators
//!
//! Integer⊕Integer stays Integer where the operation is closed over the
//! integers; any Float operand promotes to Float. Division always yields a
//! Float. Results are never infinite or NaN.

use crate::{EvalError, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

enum Operands {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn operands(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Operands, EvalError> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        return Ok(Operands::Ints(*a, *b));
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(x), Some(y)) => Ok(Operands::Floats(x, y)),
        _ => Err(EvalError::TypeMismatch {
            op: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        }),
    }
}

fn finite(op: BinaryOp, x: f64) -> Result<Value, EvalError> {
    if x.is_finite() {
        Ok(Value::Float(x))
    } else {
        Err(EvalError::Overflow(op.symbol()))
    }
}

fn checked(op: BinaryOp, result: Option<i64>) -> Result<Value, EvalError> {
    result
        .map(Value::Integer)
        .ok_or(EvalError::Overflow(op.symbol()))
}

fn truth(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

impl Value {
    /// Apply a binary operator with numeric promotion
    pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
        use Operands::{Floats, Ints};

        match (op, operands(op, lhs, rhs)?) {
            (BinaryOp::Add, Ints(a, b)) => checked(op, a.checked_add(b)),
            (BinaryOp::Add, Floats(x, y)) => finite(op, x + y),

            (BinaryOp::Sub, Ints(a, b)) => checked(op, a.checked_sub(b)),
            (BinaryOp::Sub, Floats(x, y)) => finite(op, x - y),

            (BinaryOp::Mul, Ints(a, b)) => checked(op, a.checked_mul(b)),
            (BinaryOp::Mul, Floats(x, y)) => finite(op, x * y),

            (BinaryOp::Div, Ints(_, 0)) => Err(EvalError::DivisionByZero),
            (BinaryOp::Div, Ints(a, b)) => finite(op, a as f64 / b as f64),
            (BinaryOp::Div, Floats(_, y)) if y == 0.0 => Err(EvalError::DivisionByZero),
            (BinaryOp::Div, Floats(x, y)) => finite(op, x / y),

            (BinaryOp::Rem, Ints(_, 0)) => Err(EvalError::DivisionByZero),
            (BinaryOp::Rem, Ints(a, b)) => checked(op, a.checked_rem(b)),
            (BinaryOp::Rem, Floats(_, y)) if y == 0.0 => Err(EvalError::DivisionByZero),
            (BinaryOp::Rem, Floats(x, y)) => finite(op, x % y),

            (BinaryOp::Pow, Ints(a, b)) if b >= 0 => {
                let exp = u32::try_from(b).map_err(|_| EvalError::Overflow(op.symbol()))?;
                checked(op, a.checked_pow(exp))
            }
            (BinaryOp::Pow, Ints(a, b)) => power(a as f64, b as f64),
            (BinaryOp::Pow, Floats(x, y)) => power(x, y),

            (_, operands) => {
                let ordering = match operands {
                    Ints(a, b) => Some(a.cmp(&b)),
                    Floats(x, y) => x.partial_cmp(&y),
                };
                Ok(truth(compare(op, ordering)))
            }
        }
    }

    /// Unary minus
    pub fn negate(&self) -> Result<Value, EvalError> {
        match self {
            Value::Integer(i) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or(EvalError::Overflow("-")),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(EvalError::InvalidOperand {
                op: "-",
                operand: other.type_name(),
            }),
        }
    }

    /// Unary plus; only checks the operand is numeric
    pub fn identity(&self) -> Result<Value, EvalError> {
        if self.is_numeric() {
            Ok(self.clone())
        } else {
            Err(EvalError::InvalidOperand {
                op: "+",
                operand: self.type_name(),
            })
        }
    }
}

/// NaN operands compare unequal to everything
fn compare(op: BinaryOp, ordering: Option<Ordering>) -> bool {
    match op {
        BinaryOp::Eq => ordering == Some(Ordering::Equal),
        BinaryOp::Ne => ordering != Some(Ordering::Equal),
        BinaryOp::Lt => ordering == Some(Ordering::Less),
        BinaryOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Gt => ordering == Some(Ordering::Greater),
        BinaryOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        _ => false,
    }
}

fn power(x: f64, y: f64) -> Result<Value, EvalError> {
    if x == 0.0 && y < 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    let result = x.powf(y);
    if result.is_nan() {
        return Err(EvalError::domain("^", "negative base with fractional exponent"));
    }
    finite(BinaryOp::Pow, result)
}
