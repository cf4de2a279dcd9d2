//! Core math functions

use super::helpers::{float, number, unary, unary_in};
use plotscript_core::BinaryOp;
use plotscript_plugin::prelude::*;

pub struct Sqrt;
pub struct Abs;
pub struct Exp;
pub struct Ln;
pub struct Log10;
pub struct Pow;
pub struct Floor;
pub struct Ceil;
pub struct Round;
pub struct Min;
pub struct Max;

fn meta(name: &'static str, arity: Arity, usage: &'static str, description: &'static str) -> FunctionMeta {
    FunctionMeta::new(name, arity)
        .usage(usage)
        .describe(description)
        .category("math")
}

impl NativeFunction for Sqrt {
    fn meta(&self) -> FunctionMeta {
        meta("sqrt", Arity::Exact(1), "sqrt(x)", "Square root, x >= 0")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary_in("sqrt", args, |x| x >= 0.0, "x must be non-negative", f64::sqrt)
    }
}

impl NativeFunction for Abs {
    fn meta(&self) -> FunctionMeta {
        meta("abs", Arity::Exact(1), "abs(x)", "Absolute value, keeps integers integral")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        match args.first() {
            Some(Value::Integer(i)) => i.checked_abs().map(Value::Integer).ok_or(EvalError::Overflow("abs")),
            _ => unary("abs", args, f64::abs),
        }
    }
}

impl NativeFunction for Exp {
    fn meta(&self) -> FunctionMeta {
        meta("exp", Arity::Exact(1), "exp(x)", "Exponential function (e^x)")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary("exp", args, f64::exp)
    }
}

impl NativeFunction for Ln {
    fn meta(&self) -> FunctionMeta {
        meta("ln", Arity::Exact(1), "ln(x)", "Natural logarithm, x > 0")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary_in("ln", args, |x| x > 0.0, "x must be positive", f64::ln)
    }
}

impl NativeFunction for Log10 {
    fn meta(&self) -> FunctionMeta {
        meta("log10", Arity::Exact(1), "log10(x)", "Base-10 logarithm, x > 0")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        unary_in("log10", args, |x| x > 0.0, "x must be positive", f64::log10)
    }
}

impl NativeFunction for Pow {
    fn meta(&self) -> FunctionMeta {
        meta("pow", Arity::Exact(2), "pow(base, exponent)", "Same as base ^ exponent")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        number("pow", args, 1)?;
        Value::binary(BinaryOp::Pow, &args[0], &args[1])
    }
}

/// Integers pass through unchanged; floats are rounded with `f`
fn rounding(function: &'static str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
    match args.first() {
        Some(Value::Integer(i)) => Ok(Value::Integer(*i)),
        _ => unary(function, args, f),
    }
}

impl NativeFunction for Floor {
    fn meta(&self) -> FunctionMeta {
        meta("floor", Arity::Exact(1), "floor(x)", "Largest whole number <= x")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        rounding("floor", args, f64::floor)
    }
}

impl NativeFunction for Ceil {
    fn meta(&self) -> FunctionMeta {
        meta("ceil", Arity::Exact(1), "ceil(x)", "Smallest whole number >= x")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        rounding("ceil", args, f64::ceil)
    }
}

impl NativeFunction for Round {
    fn meta(&self) -> FunctionMeta {
        meta("round", Arity::Exact(1), "round(x)", "Nearest whole number, halves away from zero")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        rounding("round", args, f64::round)
    }
}

/// Smallest or largest argument; integral if every argument is an integer
fn extremum(function: &'static str, args: &[Value], pick: BinaryOp) -> Result<Value, EvalError> {
    let mut best = args
        .first()
        .ok_or_else(|| EvalError::arg_count(function, Arity::AtLeast(1), 0))?;
    number(function, args, 0)?;

    for (i, arg) in args.iter().enumerate().skip(1) {
        number(function, args, i)?;
        if Value::binary(pick, arg, best)? == Value::Integer(1) {
            best = arg;
        }
    }

    if args.iter().all(|a| matches!(a, Value::Integer(_))) {
        Ok(best.clone())
    } else {
        float(function, number(function, std::slice::from_ref(best), 0)?)
    }
}

impl NativeFunction for Min {
    fn meta(&self) -> FunctionMeta {
        meta("min", Arity::AtLeast(1), "min(a, b, ...)", "Smallest argument")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        extremum("min", args, BinaryOp::Lt)
    }
}

impl NativeFunction for Max {
    fn meta(&self) -> FunctionMeta {
        meta("max", Arity::AtLeast(1), "max(a, b, ...)", "Largest argument")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        extremum("max", args, BinaryOp::Gt)
    }
}
