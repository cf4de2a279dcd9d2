//! PlotScript Standard Library

pub mod constants;
pub mod functions;

use plotscript_plugin::FunctionRegistry;

/// Load standard library into registry
pub fn load_standard_library(registry: FunctionRegistry) -> FunctionRegistry {
    registry
        .with_function(functions::Sqrt)
        .with_function(functions::Abs)
        .with_function(functions::Exp)
        .with_function(functions::Ln)
        .with_function(functions::Log10)
        .with_function(functions::Pow)
        .with_function(functions::Floor)
        .with_function(functions::Ceil)
        .with_function(functions::Round)
        .with_function(functions::Min)
        .with_function(functions::Max)
        .with_function(functions::Sin)
        .with_function(functions::Cos)
        .with_function(functions::Tan)
        .with_function(functions::Asin)
        .with_function(functions::Acos)
        .with_function(functions::Atan)
        .with_function(functions::Plot)
        .with_constant(constants::pi())
        .with_constant(constants::e())
}

/// Create registry with standard library
pub fn standard_registry() -> FunctionRegistry {
    load_standard_library(FunctionRegistry::new())
}
