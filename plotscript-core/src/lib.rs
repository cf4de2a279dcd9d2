//! PlotScript Core - Fundamental types
//!
//! This crate provides the core types used throughout PlotScript:
//! - `Value`: the closed set of runtime values
//! - `Function` / `GraphingFunction`: callable values and their ranges
//! - `VariableTable`: per-session bindings
//! - `LexError`, `ParseError`, `EvalError`: the error taxonomy

mod error;
mod function;
mod ops;
mod span;
mod table;
mod value;

pub use error::{codes, EvalError, LexError, LexErrorKind, ParseError, ParseErrorKind, ScriptError};
pub use function::{Arity, Callable, Function, FunctionId, GraphingFunction, SampleRange};
pub use ops::BinaryOp;
pub use span::Span;
pub use table::VariableTable;
pub use value::Value;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Arity, Callable, EvalError, Function, GraphingFunction, SampleRange, Value,
        VariableTable,
    };
}
