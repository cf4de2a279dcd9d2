//! Native function trait

use plotscript_core::{Arity, Callable, EvalError, Function, Value};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

/// Metadata for a native function
#[derive(Debug, Clone, Serialize)]
pub struct FunctionMeta {
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub usage: Cow<'static, str>,
    pub arity: Arity,
    pub category: Cow<'static, str>,
}

impl FunctionMeta {
    pub fn new(name: impl Into<Cow<'static, str>>, arity: Arity) -> Self {
        let name = name.into();
        Self {
            usage: Cow::Owned(format!("{}(…)", name)),
            name,
            description: Cow::Borrowed(""),
            arity,
            category: Cow::Borrowed("misc"),
        }
    }

    pub fn describe(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<Cow<'static, str>>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn category(mut self, category: impl Into<Cow<'static, str>>) -> Self {
        self.category = category.into();
        self
    }
}

/// A function implemented natively (built-in or plugin)
pub trait NativeFunction: Send + Sync {
    fn meta(&self) -> FunctionMeta;
    fn call(&self, args: &[Value]) -> Result<Value, EvalError>;
}

/// Adapter exposing a registered native function as a script value.
///
/// The arity is read from the metadata once, at wrap time.
struct NativeCallable {
    function: Arc<dyn NativeFunction>,
    arity: Arity,
}

impl Callable for NativeCallable {
    fn arity(&self) -> Arity {
        self.arity
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.function.call(args)
    }
}

/// Wrap a native function as a first-class `Function` value
pub fn native_value(name: &str, function: Arc<dyn NativeFunction>) -> Function {
    let arity = function.meta().arity;
    Function::named(name, Arc::new(NativeCallable { function, arity }))
}
