//! Runtime values in PlotScript
//!
//! The value set is closed: integers, floats, unit, functions and
//! graphing functions. Every evaluation result is one of these.

use crate::{EvalError, Function, GraphingFunction, SampleRange};
use serde::{Serialize, Serializer};
use std::fmt;

/// Runtime value in PlotScript
#[derive(Debug, Clone, Default)]
pub enum Value {
    Integer(i64),
    Float(f64),
    #[default]
    Unit,
    Function(Function),
    GraphingFunction(GraphingFunction),
}

impl Value {
    // ========== Safe Accessors (never panic) ==========

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric kinds as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            Value::GraphingFunction(g) => Some(g.function()),
            _ => None,
        }
    }

    pub fn as_graphing_function(&self) -> Option<&GraphingFunction> {
        match self {
            Value::GraphingFunction(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Unit => "Unit",
            Value::Function(_) => "Function",
            Value::GraphingFunction(_) => "GraphingFunction",
        }
    }

    // ========== Invocation ==========

    /// Call with a single scalar argument.
    pub fn invoke(&self, x: f64) -> Result<Value, EvalError> {
        match self {
            Value::Function(f) => f.call(&[Value::Float(x)]),
            Value::GraphingFunction(g) => g.invoke(x),
            other => Err(EvalError::NotCallable(other.type_name())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            (Value::Function(a), Value::Function(b)) => a.same_as(b),
            (Value::GraphingFunction(a), Value::GraphingFunction(b)) => {
                a.id() == b.id() && a.default_range() == b.default_range()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            // Debug keeps a trailing ".0" so floats never look like integers
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Unit => Ok(()),
            Value::Function(func) => write!(f, "{}", func),
            Value::GraphingFunction(g) => write!(f, "{}", g),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", content = "value")]
enum ValueRepr {
    Integer(i64),
    Float(f64),
    Unit,
    Function(String),
    GraphingFunction {
        label: String,
        range: Option<SampleRange>,
    },
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Value::Integer(i) => ValueRepr::Integer(*i),
            Value::Float(x) => ValueRepr::Float(*x),
            Value::Unit => ValueRepr::Unit,
            Value::Function(func) => ValueRepr::Function(func.to_string()),
            Value::GraphingFunction(g) => ValueRepr::GraphingFunction {
                label: g.to_string(),
                range: g.default_range(),
            },
        };
        repr.serialize(serializer)
    }
}

// From implementations for convenience
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<GraphingFunction> for Value {
    fn from(g: GraphingFunction) -> Self {
        Value::GraphingFunction(g)
    }
}
