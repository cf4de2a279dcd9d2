//! Argument extraction and result checks shared by the built-ins

use plotscript_core::{EvalError, Value};

/// Numeric argument `index` as `f64`
pub fn number(function: &'static str, args: &[Value], index: usize) -> Result<f64, EvalError> {
    let arg = args.get(index).ok_or_else(|| {
        EvalError::arg_count(function, plotscript_core::Arity::AtLeast(index + 1), args.len())
    })?;
    arg.as_f64().ok_or(EvalError::InvalidOperand {
        op: function,
        operand: arg.type_name(),
    })
}

/// Wrap a float result, rejecting NaN (domain) and infinities (overflow)
pub fn float(function: &'static str, x: f64) -> Result<Value, EvalError> {
    if x.is_nan() {
        Err(EvalError::domain(function, "result is not a number"))
    } else if x.is_infinite() {
        Err(EvalError::Overflow(function))
    } else {
        Ok(Value::Float(x))
    }
}

/// Apply `f` to the single numeric argument
pub fn unary(function: &'static str, args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value, EvalError> {
    float(function, f(number(function, args, 0)?))
}

/// Like `unary`, failing with a domain error when `accept` rejects the input
pub fn unary_in(
    function: &'static str,
    args: &[Value],
    accept: impl Fn(f64) -> bool,
    requirement: &str,
    f: impl Fn(f64) -> f64,
) -> Result<Value, EvalError> {
    let x = number(function, args, 0)?;
    if !accept(x) {
        return Err(EvalError::domain(function, format!("{} (got {})", requirement, x)));
    }
    float(function, f(x))
}
