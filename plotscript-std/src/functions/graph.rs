//! Graphing functions

use super::helpers::number;
use plotscript_plugin::prelude::*;

/// Intervals used when `plot` gets bounds but no step
pub const DEFAULT_INTERVALS: usize = 200;

/// `plot(f)`, `plot(f, lo, hi)` or `plot(f, lo, hi, step)`: mark a
/// one-argument function for plotting, optionally with its own range.
pub struct Plot;

impl NativeFunction for Plot {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta::new("plot", Arity::Between(1, 4))
            .usage("plot(f[, lo, hi[, step]])")
            .describe("Mark a function of one argument as a graph, optionally over [lo, hi]")
            .category("graph")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        let function = match args.first() {
            Some(value) => value.as_function().ok_or(EvalError::InvalidOperand {
                op: "plot",
                operand: value.type_name(),
            })?,
            None => return Err(EvalError::arg_count("plot", Arity::Between(1, 4), 0)),
        };

        if !function.arity().accepts(1) {
            return Err(EvalError::domain(
                "plot",
                format!("{} must take one argument", function),
            ));
        }

        let range = match args.len() {
            1 => None,
            3 => {
                let (lo, hi) = (number("plot", args, 1)?, number("plot", args, 2)?);
                Some(
                    SampleRange::with_samples(lo, hi, DEFAULT_INTERVALS)
                        .ok_or_else(|| invalid_range(lo, hi, None))?,
                )
            }
            4 => {
                let (lo, hi) = (number("plot", args, 1)?, number("plot", args, 2)?);
                let step = number("plot", args, 3)?;
                Some(SampleRange::new(lo, hi, step).ok_or_else(|| invalid_range(lo, hi, Some(step)))?)
            }
            _ => {
                return Err(EvalError::domain(
                    "plot",
                    "expected plot(f), plot(f, lo, hi) or plot(f, lo, hi, step)",
                ))
            }
        };

        Ok(Value::GraphingFunction(GraphingFunction::new(function.clone(), range)))
    }
}

fn invalid_range(lo: f64, hi: f64, step: Option<f64>) -> EvalError {
    let message = match step {
        Some(step) => format!("invalid range [{}, {}] with step {}", lo, hi, step),
        None => format!("invalid range [{}, {}]", lo, hi),
    };
    EvalError::domain("plot", message)
}
