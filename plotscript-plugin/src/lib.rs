//! PlotScript Plugin System
//!
//! Provides:
//! - `NativeFunction`: functions implemented in Rust (built-ins, plugins)
//! - `FunctionRegistry`: name resolution with a first-wins conflict policy
//! - `abi` / `declare_plugin!`: the C ABI a plugin library exports
//! - `PluginLoader`: discovery and isolated loading of plugin libraries

pub mod abi;
mod context;
pub mod loader;
mod native;
mod registry;
mod traits;

pub use context::PluginContext;
pub use loader::{
    ConflictReporting, LoadReport, LoadedPlugin, ModuleOpener, NameConflict, PluginError,
    PluginLoader, PluginModule, SkippedCandidate,
};
pub use native::NativeOpener;
pub use registry::{
    Constant, FunctionListing, FunctionRegistry, RegisteredFunction, RegistryError, SourceKind,
};
pub use traits::{native_value, FunctionMeta, NativeFunction};

/// Re-export core types for function authors
pub mod prelude {
    pub use crate::{Constant, FunctionMeta, FunctionRegistry, NativeFunction, SourceKind};
    pub use plotscript_core::prelude::*;
}
