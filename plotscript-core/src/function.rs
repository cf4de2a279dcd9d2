//! Callable values
//!
//! A `Function` is a shared handle to something implementing `Callable`:
//! a native built-in, a plugin export or a script-defined body. A
//! `GraphingFunction` is the same callable marked for plotting.

use crate::{EvalError, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Number of arguments a callable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(lo, hi) => (lo..=hi).contains(&count),
        }
    }

    pub fn check(&self, name: &str, count: usize) -> Result<(), EvalError> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(EvalError::arg_count(name, *self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "{}+", n),
            Arity::Between(lo, hi) => write!(f, "{}..{}", lo, hi),
        }
    }
}

/// Anything that can be invoked from a script
pub trait Callable: Send + Sync {
    fn arity(&self) -> Arity;
    fn call(&self, args: &[Value]) -> Result<Value, EvalError>;
}

/// Inclusive range of x-values sampled when plotting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SampleRange {
    pub const DEFAULT_START: f64 = -10.0;
    pub const DEFAULT_END: f64 = 10.0;
    pub const DEFAULT_STEP: f64 = 0.1;
    pub const MAX_POINTS: usize = 1_000_000;

    /// Returns `None` unless all bounds are finite, `start <= end`,
    /// `step > 0` and the range holds at most `MAX_POINTS` points.
    pub fn new(start: f64, end: f64, step: f64) -> Option<Self> {
        let valid = start.is_finite() && end.is_finite() && step.is_finite()
            && start <= end
            && step > 0.0
            && (end - start) / step < Self::MAX_POINTS as f64;
        valid.then_some(Self { start, end, step })
    }

    /// Range split into `intervals` equal steps (a viewport sweep)
    pub fn with_samples(start: f64, end: f64, intervals: usize) -> Option<Self> {
        if intervals == 0 || end <= start {
            return None;
        }
        Self::new(start, end, (end - start) / intervals as f64)
    }

    /// Number of points produced by `points()`
    pub fn len(&self) -> usize {
        // tolerate rounding so that the end point itself is included
        ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1
    }

    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.start + i as f64 * self.step)
    }
}

impl Default for SampleRange {
    fn default() -> Self {
        Self {
            start: Self::DEFAULT_START,
            end: Self::DEFAULT_END,
            step: Self::DEFAULT_STEP,
        }
    }
}

impl fmt::Display for SampleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}; {}]", self.start, self.end, self.step)
    }
}

/// Identity of a function value, stable for as long as the value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(usize);

/// A callable value
#[derive(Clone)]
pub struct Function {
    name: Option<Arc<str>>,
    body: Arc<dyn Callable>,
    default_range: Option<SampleRange>,
}

impl Function {
    pub fn new(body: Arc<dyn Callable>) -> Self {
        Self {
            name: None,
            body,
            default_range: None,
        }
    }

    pub fn named(name: impl Into<Arc<str>>, body: Arc<dyn Callable>) -> Self {
        Self {
            name: Some(name.into()),
            body,
            default_range: None,
        }
    }

    pub fn with_default_range(mut self, range: SampleRange) -> Self {
        self.default_range = Some(range);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in messages; anonymous functions show as `fn`
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("fn")
    }

    pub fn arity(&self) -> Arity {
        self.body.arity()
    }

    pub fn default_range(&self) -> Option<SampleRange> {
        self.default_range
    }

    pub fn id(&self) -> FunctionId {
        FunctionId(Arc::as_ptr(&self.body) as *const () as usize)
    }

    /// True when both handles share the same callable
    pub fn same_as(&self, other: &Function) -> bool {
        self.id() == other.id()
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.arity().check(self.display_name(), args.len())?;
        self.body.call(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .field("default_range", &self.default_range)
            .finish()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}/{}>", self.display_name(), self.arity())
    }
}

/// A function marked as plottable
#[derive(Debug, Clone)]
pub struct GraphingFunction {
    function: Function,
    default_range: Option<SampleRange>,
}

impl GraphingFunction {
    pub fn new(function: Function, default_range: Option<SampleRange>) -> Self {
        Self {
            function,
            default_range,
        }
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn id(&self) -> FunctionId {
        self.function.id()
    }

    /// Own range, else the wrapped function's range
    pub fn default_range(&self) -> Option<SampleRange> {
        self.default_range.or(self.function.default_range())
    }

    /// Single-scalar invocation used by plotting
    pub fn invoke(&self, x: f64) -> Result<Value, EvalError> {
        self.function.call(&[Value::Float(x)])
    }
}

impl fmt::Display for GraphingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<graph {}/{}", self.function.display_name(), self.function.arity())?;
        if let Some(range) = self.default_range() {
            write!(f, " {}", range)?;
        }
        write!(f, ">")
    }
}
