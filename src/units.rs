//! Unit-generator registry: every named word the interpreter understands,
//! with its fixed input/output arity.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Add,
    Sub,
    Mul,
    Div,
    /// Read a parameter slot: `index p`.
    Param,
    /// `freq amp sine`
    Sine,
    /// `freq amp blsaw`
    BlSaw,
    /// `freq amp width blsquare`
    BlSquare,
    /// `in feedback time delay` (time is init-time)
    Delay,
    /// `in revtime looptime allpass` (looptime is init-time)
    Allpass,
    /// `in revtime looptime comb` (looptime is init-time)
    Comb,
    /// `in jcrev` -> left right
    JcRev,
    /// `trig atk hold rel tenv`
    Tenv,
    /// `freq metro`
    Metro,
}

/// Static description of a unit generator.
#[derive(Debug, Clone, Copy)]
pub struct UnitInfo {
    pub kind: UnitKind,
    pub name: &'static str,
    pub inputs: usize,
    pub outputs: usize,
    /// Index of the input that is read once at compile time, if any.
    pub init_input: Option<usize>,
}

const fn unit(
    kind: UnitKind,
    name: &'static str,
    inputs: usize,
    outputs: usize,
    init_input: Option<usize>,
) -> UnitInfo {
    UnitInfo {
        kind,
        name,
        inputs,
        outputs,
        init_input,
    }
}

pub const UNITS: &[UnitInfo] = &[
    unit(UnitKind::Add, "+", 2, 1, None),
    unit(UnitKind::Sub, "-", 2, 1, None),
    unit(UnitKind::Mul, "*", 2, 1, None),
    unit(UnitKind::Div, "/", 2, 1, None),
    unit(UnitKind::Param, "p", 1, 1, None),
    unit(UnitKind::Sine, "sine", 2, 1, None),
    unit(UnitKind::BlSaw, "blsaw", 2, 1, None),
    unit(UnitKind::BlSquare, "blsquare", 3, 1, None),
    unit(UnitKind::Delay, "delay", 3, 1, Some(2)),
    unit(UnitKind::Allpass, "allpass", 3, 1, Some(2)),
    unit(UnitKind::Comb, "comb", 3, 1, Some(2)),
    unit(UnitKind::JcRev, "jcrev", 1, 2, None),
    unit(UnitKind::Tenv, "tenv", 4, 1, None),
    unit(UnitKind::Metro, "metro", 1, 1, None),
];

impl UnitKind {
    pub fn lookup(name: &str) -> Option<UnitKind> {
        UNITS.iter().find(|u| u.name == name).map(|u| u.kind)
    }

    pub fn info(self) -> &'static UnitInfo {
        // Every variant has exactly one table row.
        UNITS
            .iter()
            .find(|u| u.kind == self)
            .unwrap_or(&UNITS[0])
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn inputs(self) -> usize {
        self.info().inputs
    }

    pub fn outputs(self) -> usize {
        self.info().outputs
    }

    /// True for units whose output depends only on their inputs this tick.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, UnitKind::Add | UnitKind::Sub | UnitKind::Mul | UnitKind::Div)
    }

    /// Evaluate an arithmetic unit. Division by zero yields 0.
    pub fn apply_arithmetic(self, a: f64, b: f64) -> f64 {
        match self {
            UnitKind::Add => a + b,
            UnitKind::Sub => a - b,
            UnitKind::Mul => a * b,
            UnitKind::Div if b == 0.0 => 0.0,
            UnitKind::Div => a / b,
            _ => 0.0,
        }
    }
}
