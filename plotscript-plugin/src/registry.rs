//! Function Registry

use crate::traits::native_value;
use crate::{FunctionMeta, NativeFunction};
use plotscript_core::Function;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a registered function came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "provider", rename_all = "lowercase")]
pub enum SourceKind {
    Builtin,
    Plugin(String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Builtin => write!(f, "built-in"),
            SourceKind::Plugin(provider) => write!(f, "plugin '{}'", provider),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("function '{name}' is already registered by {existing}")]
    Conflict { name: String, existing: SourceKind },

    #[error("function '{0}' is not registered")]
    NotFound(String),
}

/// Named numeric constant
#[derive(Debug, Clone, Serialize)]
pub struct Constant {
    pub name: &'static str,
    pub value: f64,
    pub description: &'static str,
}

/// A registry entry
#[derive(Clone)]
pub struct RegisteredFunction {
    native: Arc<dyn NativeFunction>,
    value: Function,
    source: SourceKind,
}

impl RegisteredFunction {
    pub fn native(&self) -> &Arc<dyn NativeFunction> {
        &self.native
    }

    /// The function as a script value; identity is stable per entry
    pub fn value(&self) -> &Function {
        &self.value
    }

    pub fn source(&self) -> &SourceKind {
        &self.source
    }
}

/// Row of `FunctionRegistry::functions()`
#[derive(Debug, Clone, Serialize)]
pub struct FunctionListing {
    #[serde(flatten)]
    pub meta: FunctionMeta,
    pub source: SourceKind,
}

/// Built-in and plugin functions by name.
///
/// Names are unique: the first registration wins and later ones are
/// rejected with `RegistryError::Conflict`.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, RegisteredFunction>,
    constants: HashMap<&'static str, Constant>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in, keeping any existing entry on conflict
    pub fn with_function<F: NativeFunction + 'static>(mut self, f: F) -> Self {
        let name = f.meta().name.into_owned();
        if let Err(err) = self.register(&name, Arc::new(f), SourceKind::Builtin) {
            tracing::warn!(%err, "duplicate built-in ignored");
        }
        self
    }

    pub fn with_constant(mut self, constant: Constant) -> Self {
        self.constants.insert(constant.name, constant);
        self
    }

    pub fn register(
        &mut self,
        name: &str,
        function: Arc<dyn NativeFunction>,
        source: SourceKind,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.functions.get(name) {
            return Err(RegistryError::Conflict {
                name: name.to_string(),
                existing: existing.source.clone(),
            });
        }

        let value = native_value(name, Arc::clone(&function));
        self.functions.insert(
            name.to_string(),
            RegisteredFunction {
                native: function,
                value,
                source,
            },
        );
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn NativeFunction>, RegistryError> {
        self.functions
            .get(name)
            .map(|entry| Arc::clone(&entry.native))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions.get(name)
    }

    /// Function value for `name`, arity-checked when called
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name).map(RegisteredFunction::value)
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).map(|c| c.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn source_of(&self, name: &str) -> Option<&SourceKind> {
        self.functions.get(name).map(RegisteredFunction::source)
    }

    /// Metadata for every function, sorted by name
    pub fn functions(&self) -> Vec<FunctionListing> {
        let mut listing: Vec<FunctionListing> = self
            .functions
            .values()
            .map(|entry| FunctionListing {
                meta: entry.native.meta(),
                source: entry.source.clone(),
            })
            .collect();
        listing.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        listing
    }

    /// Constants, sorted by name
    pub fn constants(&self) -> Vec<&Constant> {
        let mut constants: Vec<&Constant> = self.constants.values().collect();
        constants.sort_by_key(|c| c.name);
        constants
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .field("constants", &self.constants.len())
            .finish()
    }
}
