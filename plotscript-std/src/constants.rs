//! Mathematical constants

use plotscript_plugin::Constant;

pub fn pi() -> Constant {
    Constant {
        name: "pi",
        value: std::f64::consts::PI,
        description: "Ratio of a circle's circumference to its diameter",
    }
}

pub fn e() -> Constant {
    Constant {
        name: "e",
        value: std::f64::consts::E,
        description: "Base of the natural logarithm",
    }
}
