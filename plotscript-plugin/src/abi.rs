//! Plugin ABI
//!
//! A plugin is a native library exporting one C-ABI entry point,
//! `plotscript_plugin_declaration`, that returns a pointer to a static
//! `PluginDeclaration`. Functions take and return `f64` scalars only.
//!
//! Plugin authors implement `ScalarFunction` and let `declare_plugin!`
//! generate the declaration:
//!
//! ```ignore
//! use plotscript_plugin::abi::{Fault, ScalarFunction};
//!
//! struct Cube;
//!
//! impl ScalarFunction for Cube {
//!     const NAME: &'static std::ffi::CStr = c"cube";
//!     const ARITY: u32 = 1;
//!
//!     fn call(args: &[f64]) -> Result<f64, Fault> {
//!         Ok(args[0] * args[0] * args[0])
//!     }
//! }
//!
//! plotscript_plugin::declare_plugin!(c"cubes", [Cube]);
//! ```

use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};

/// Bumped on any layout change of the types below
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Exported symbol name, nul-terminated
pub const DECLARATION_SYMBOL: &[u8] = b"plotscript_plugin_declaration\0";

/// Status codes returned by `PluginCall`
pub mod status {
    pub const OK: i32 = 0;
    pub const DOMAIN: i32 = 1;
    pub const ARG_COUNT: i32 = 2;
    pub const INVALID_ARGS: i32 = 3;
    pub const PANICKED: i32 = 4;
}

/// `call(args, len, out)`; writes the result to `out` and returns `status::OK`
pub type PluginCall = unsafe extern "C" fn(args: *const f64, len: usize, out: *mut f64) -> i32;

/// Signature of the exported entry point
pub type DeclarationFn = unsafe extern "C" fn() -> *const PluginDeclaration;

#[repr(C)]
pub struct PluginFunctionDecl {
    pub name: *const c_char,
    pub arity: u32,
    pub call: PluginCall,
}

#[repr(C)]
pub struct PluginDeclaration {
    pub abi_version: u32,
    pub name: *const c_char,
    pub functions: *const PluginFunctionDecl,
    pub function_count: usize,
}

// Declarations are immutable statics pointing at 'static data.
unsafe impl Sync for PluginFunctionDecl {}
unsafe impl Sync for PluginDeclaration {}

/// Recoverable failure of a plugin function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Argument outside the function's domain
    Domain,
    /// Arguments the function cannot accept
    InvalidArguments,
}

impl Fault {
    pub const fn status(self) -> i32 {
        match self {
            Fault::Domain => status::DOMAIN,
            Fault::InvalidArguments => status::INVALID_ARGS,
        }
    }
}

/// Safe side of a plugin function
pub trait ScalarFunction {
    const NAME: &'static CStr;
    const ARITY: u32;

    /// `args.len()` always equals `ARITY`
    fn call(args: &[f64]) -> Result<f64, Fault>;
}

impl PluginFunctionDecl {
    pub const fn of<F: ScalarFunction>() -> Self {
        Self {
            name: F::NAME.as_ptr(),
            arity: F::ARITY,
            call: trampoline::<F>,
        }
    }
}

/// C entry for a `ScalarFunction`; panics never cross the boundary.
///
/// # Safety
///
/// `args` must point to `len` readable values (or be null with `len == 0`)
/// and `out` must be writable.
pub unsafe extern "C" fn trampoline<F: ScalarFunction>(
    args: *const f64,
    len: usize,
    out: *mut f64,
) -> i32 {
    if out.is_null() || (args.is_null() && len > 0) {
        return status::INVALID_ARGS;
    }
    if len != F::ARITY as usize {
        return status::ARG_COUNT;
    }

    let args = if len == 0 {
        &[][..]
    } else {
        // SAFETY: checked non-null above, length guaranteed by the caller
        unsafe { std::slice::from_raw_parts(args, len) }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| F::call(args))) {
        Ok(Ok(value)) => {
            // SAFETY: checked non-null above
            unsafe { out.write(value) };
            status::OK
        }
        Ok(Err(fault)) => fault.status(),
        Err(_) => status::PANICKED,
    }
}

/// Export a plugin declaration.
///
/// `declare_plugin!(c"name", [FunctionA, FunctionB])` where every listed
/// type implements `ScalarFunction`.
#[macro_export]
macro_rules! declare_plugin {
    ($name:expr, [$($function:ty),* $(,)?]) => {
        #[no_mangle]
        pub extern "C" fn plotscript_plugin_declaration() -> *const $crate::abi::PluginDeclaration {
            static FUNCTIONS: &[$crate::abi::PluginFunctionDecl] = &[
                $($crate::abi::PluginFunctionDecl::of::<$function>()),*
            ];
            static DECLARATION: $crate::abi::PluginDeclaration = $crate::abi::PluginDeclaration {
                abi_version: $crate::abi::PLUGIN_ABI_VERSION,
                name: {
                    let name: &'static ::std::ffi::CStr = $name;
                    name.as_ptr()
                },
                functions: FUNCTIONS.as_ptr(),
                function_count: FUNCTIONS.len(),
            };
            &DECLARATION
        }
    };
}
