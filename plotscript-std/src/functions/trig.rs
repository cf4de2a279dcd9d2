//! Trigonometric functions (radians)

use super::helpers::{unary, unary_in};
use plotscript_plugin::prelude::*;

pub struct Sin;
pub struct Cos;
pub struct Tan;
pub struct Asin;
pub struct Acos;
pub struct Atan;

fn meta(name: &'static str, usage: &'static str, description: &'static str) -> FunctionMeta {
    FunctionMeta::new(name, Arity::Exact(1))
        .usage(usage)
        .describe(description)
        .category("trig")
}

fn unit_interval(x: f64) -> bool {
    (-1.0..=1.0).contains(&x)
}

impl NativeFunction for Sin {
    fn meta(&self) -> FunctionMeta {
        meta("sin", "sin(x)", "Sine")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary("sin", args, f64::sin)
    }
}

impl NativeFunction for Cos {
    fn meta(&self) -> FunctionMeta {
        meta("cos", "cos(x)", "Cosine")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary("cos", args, f64::cos)
    }
}

impl NativeFunction for Tan {
    fn meta(&self) -> FunctionMeta {
        meta("tan", "tan(x)", "Tangent")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary("tan", args, f64::tan)
    }
}

impl NativeFunction for Asin {
    fn meta(&self) -> FunctionMeta {
        meta("asin", "asin(x)", "Inverse sine, -1 <= x <= 1")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary_in("asin", args, unit_interval, "x must be within [-1, 1]", f64::asin)
    }
}

impl NativeFunction for Acos {
    fn meta(&self) -> FunctionMeta {
        meta("acos", "acos(x)", "Inverse cosine, -1 <= x <= 1")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary_in("acos", args, unit_interval, "x must be within [-1, 1]", f64::acos)
    }
}

impl NativeFunction for Atan {
    fn meta(&self) -> FunctionMeta {
        meta("atan", "atan(x)", "Inverse tangent")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary("atan", args, f64::atan)
    }
}
