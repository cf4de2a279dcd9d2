//! Native module opener
//!
//! Opens plugin libraries with `libloading`. On Unix the library is opened
//! with `RTLD_LOCAL` so its symbols (and those of its own dependencies) do
//! not leak into the global namespace shared with the host or other plugins.

use crate::abi::{self, DeclarationFn, PluginCall, PluginDeclaration, PLUGIN_ABI_VERSION};
use crate::loader::{ModuleOpener, PluginError, PluginModule};
use crate::{FunctionMeta, NativeFunction};
use libloading::Library;
use plotscript_core::{Arity, EvalError, Value};
use std::ffi::{c_char, CStr};
use std::path::Path;
use std::sync::Arc;

/// Opens `*.psplugin.*` files as native libraries
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl ModuleOpener for NativeOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn PluginModule>, PluginError> {
        // SAFETY: loading runs the library's initialisers; plugin files are
        // trusted by virtue of being installed in a plugin directory.
        let library = unsafe { open_isolated(path) }.map_err(|e| PluginError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let library = Arc::new(library);

        // SAFETY: the symbol type matches the exported entry point
        let declaration = unsafe {
            let entry = library
                .get::<DeclarationFn>(abi::DECLARATION_SYMBOL)
                .map_err(|_| PluginError::MissingEntryPoint {
                    path: path.to_path_buf(),
                })?;
            entry()
        };

        // SAFETY: the declaration lives in the library, kept alive by the
        // functions built from it
        let module = unsafe { read_declaration(declaration, Some(Arc::clone(&library)))? };
        Ok(Arc::new(module))
    }
}

#[cfg(unix)]
unsafe fn open_isolated(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open_isolated(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

/// A module whose functions were read from a `PluginDeclaration`
pub(crate) struct NativeModule {
    name: String,
    functions: Vec<Arc<dyn NativeFunction>>,
}

impl PluginModule for NativeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn functions(&self) -> Vec<Arc<dyn NativeFunction>> {
        self.functions.clone()
    }
}

/// Validate a declaration and wrap its functions.
///
/// # Safety
///
/// `declaration` must be null or point to a `PluginDeclaration` whose data
/// stays valid while `library` (if any) is loaded.
pub(crate) unsafe fn read_declaration(
    declaration: *const PluginDeclaration,
    library: Option<Arc<Library>>,
) -> Result<NativeModule, PluginError> {
    let declaration = unsafe { declaration.as_ref() }
        .ok_or_else(|| PluginError::InvalidDeclaration("null declaration".into()))?;

    if declaration.abi_version != PLUGIN_ABI_VERSION {
        return Err(PluginError::AbiMismatch {
            found: declaration.abi_version,
            expected: PLUGIN_ABI_VERSION,
        });
    }

    let name = unsafe { read_name(declaration.name) }?;
    if declaration.function_count > 0 && declaration.functions.is_null() {
        return Err(PluginError::InvalidDeclaration(format!(
            "plugin '{}' declares {} functions but no table",
            name, declaration.function_count
        )));
    }

    let decls = if declaration.function_count == 0 {
        &[][..]
    } else {
        unsafe { std::slice::from_raw_parts(declaration.functions, declaration.function_count) }
    };

    let mut functions: Vec<Arc<dyn NativeFunction>> = Vec::with_capacity(decls.len());
    for decl in decls {
        let function_name = unsafe { read_name(decl.name) }?;
        functions.push(Arc::new(PluginFunction {
            name: function_name,
            plugin: name.clone(),
            arity: decl.arity as usize,
            call: decl.call,
            _library: library.clone(),
        }));
    }

    Ok(NativeModule { name, functions })
}

unsafe fn read_name(ptr: *const c_char) -> Result<String, PluginError> {
    if ptr.is_null() {
        return Err(PluginError::InvalidDeclaration("null name".into()));
    }
    let name = unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| PluginError::InvalidDeclaration("name is not UTF-8".into()))?;
    if !is_identifier(name) {
        return Err(PluginError::InvalidDeclaration(format!(
            "'{}' is not a valid name",
            name
        )));
    }
    Ok(name.to_string())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A function exported by a plugin
struct PluginFunction {
    name: String,
    plugin: String,
    arity: usize,
    call: PluginCall,
    _library: Option<Arc<Library>>,
}

impl PluginFunction {
    fn failure(&self, message: impl Into<String>) -> EvalError {
        EvalError::Plugin {
            function: self.name.clone(),
            message: message.into(),
        }
    }
}

impl NativeFunction for PluginFunction {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta::new(self.name.clone(), Arity::Exact(self.arity))
            .describe(format!("Provided by plugin '{}'", self.plugin))
            .category("plugin")
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        let scalars = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                arg.as_f64().ok_or_else(|| {
                    self.failure(format!("argument {} is {}, expected a number", i + 1, arg.type_name()))
                })
            })
            .collect::<Result<Vec<f64>, EvalError>>()?;

        let mut out = 0.0;
        // SAFETY: `scalars` and `out` are valid for the duration of the call
        let status = unsafe { (self.call)(scalars.as_ptr(), scalars.len(), &mut out) };

        match status {
            abi::status::OK if out.is_finite() => Ok(Value::Float(out)),
            abi::status::OK => Err(self.failure("returned a non-finite result")),
            abi::status::DOMAIN => Err(EvalError::domain(
                self.name.clone(),
                "argument outside the function's domain",
            )),
            abi::status::ARG_COUNT => Err(EvalError::arg_count(
                self.name.clone(),
                Arity::Exact(self.arity),
                args.len(),
            )),
            abi::status::INVALID_ARGS => Err(self.failure("rejected its arguments")),
            abi::status::PANICKED => Err(self.failure("panicked")),
            other => Err(self.failure(format!("failed with status {}", other))),
        }
    }
}
