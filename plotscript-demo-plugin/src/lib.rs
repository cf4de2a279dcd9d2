//! Demo PlotScript plugin
//!
//! Builds a native library exporting four scalar functions. The loader
//! only picks up files named `*.psplugin.<ext>`, so copy the built
//! library into a plugin folder under such a name, e.g.
//! `PlotPlugins/demo.psplugin.so`.

use plotscript_plugin::abi::{Fault, ScalarFunction};
use std::ffi::CStr;

/// `sin(x) / x`, 1 at 0
pub struct Sinc;

/// Normal density `gaussian(x, mu, sigma)`, sigma > 0
pub struct Gaussian;

/// Logistic curve `1 / (1 + e^-x)`
pub struct Sigmoid;

/// Heaviside step, 0.5 at 0
pub struct Step;

impl ScalarFunction for Sinc {
    const NAME: &'static CStr = c"sinc";
    const ARITY: u32 = 1;

    fn call(args: &[f64]) -> Result<f64, Fault> {
        let x = args[0];
        if x == 0.0 {
            return Ok(1.0);
        }
        Ok(x.sin() / x)
    }
}

impl ScalarFunction for Gaussian {
    const NAME: &'static CStr = c"gaussian";
    const ARITY: u32 = 3;

    fn call(args: &[f64]) -> Result<f64, Fault> {
        let (x, mu, sigma) = (args[0], args[1], args[2]);
        if sigma <= 0.0 {
            return Err(Fault::Domain);
        }
        let z = (x - mu) / sigma;
        Ok((-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt()))
    }
}

impl ScalarFunction for Sigmoid {
    const NAME: &'static CStr = c"sigmoid";
    const ARITY: u32 = 1;

    fn call(args: &[f64]) -> Result<f64, Fault> {
        Ok(1.0 / (1.0 + (-args[0]).exp()))
    }
}

impl ScalarFunction for Step {
    const NAME: &'static CStr = c"step";
    const ARITY: u32 = 1;

    fn call(args: &[f64]) -> Result<f64, Fault> {
        let x = args[0];
        if x.is_nan() {
            return Err(Fault::InvalidArguments);
        }
        Ok(if x > 0.0 {
            1.0
        } else if x < 0.0 {
            0.0
        } else {
            0.5
        })
    }
}

plotscript_plugin::declare_plugin!(c"demo", [Sinc, Gaussian, Sigmoid, Step]);

#[cfg(test)]
mod tests {
    use super::*;
    use plotscript_plugin::abi::{status, PLUGIN_ABI_VERSION};
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_functions() {
        assert_eq!(Sinc::call(&[0.0]), Ok(1.0));
        assert!(close(Sinc::call(&[std::f64::consts::PI]).unwrap(), 0.0));
        assert!(close(Sigmoid::call(&[0.0]).unwrap(), 0.5));
        assert_eq!(Step::call(&[-2.0]), Ok(0.0));
        assert_eq!(Step::call(&[0.0]), Ok(0.5));
        assert_eq!(Step::call(&[f64::NAN]), Err(Fault::InvalidArguments));

        let peak = Gaussian::call(&[0.0, 0.0, 1.0]).unwrap();
        assert!(close(peak, 1.0 / (2.0 * std::f64::consts::PI).sqrt()));
        assert_eq!(Gaussian::call(&[0.0, 0.0, 0.0]), Err(Fault::Domain));
    }

    #[test]
    fn test_declaration() {
        let declaration = unsafe { &*plotscript_plugin_declaration() };
        assert_eq!(declaration.abi_version, PLUGIN_ABI_VERSION);
        assert_eq!(unsafe { CStr::from_ptr(declaration.name) }, c"demo");

        let functions =
            unsafe { std::slice::from_raw_parts(declaration.functions, declaration.function_count) };
        let names: Vec<&CStr> = functions
            .iter()
            .map(|f| unsafe { CStr::from_ptr(f.name) })
            .collect();
        assert_eq!(names, vec![c"sinc", c"gaussian", c"sigmoid", c"step"]);
        assert_eq!(functions[1].arity, 3);
    }

    #[test]
    fn test_entry_points() {
        let declaration = unsafe { &*plotscript_plugin_declaration() };
        let gaussian = unsafe { &*declaration.functions.add(1) };

        let mut out = 0.0;
        let args = [1.0, 1.0, 2.0];
        let code = unsafe { (gaussian.call)(args.as_ptr(), args.len(), &mut out) };
        assert_eq!(code, status::OK);
        assert!(close(out, 1.0 / (2.0 * (2.0 * std::f64::consts::PI).sqrt())));

        let bad = [1.0, 1.0, -1.0];
        let code = unsafe { (gaussian.call)(bad.as_ptr(), bad.len(), &mut out) };
        assert_eq!(code, status::DOMAIN);
    }
}
