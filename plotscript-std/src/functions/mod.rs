//! Built-in functions

mod graph;
mod helpers;
mod math;
mod trig;

pub use graph::{Plot, DEFAULT_INTERVALS};
pub use math::{Abs, Ceil, Exp, Floor, Ln, Log10, Max, Min, Pow, Round, Sqrt};
pub use trig::{Acos, Asin, Atan, Cos, Sin, Tan};
