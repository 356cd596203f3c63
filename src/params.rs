//! Parameter specs, fixed name→index tables, and the values that cross
//! from the control thread to the audio thread.

use crate::dsp::ramp::{Ramp, RampCurve};
use crate::error::InvalidParameter;

/// Number of parameter slots available to a generator graph.
pub const MAX_PARAMETERS: usize = 16;

/// What a setter does with an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfRange {
    Reject,
    Clamp,
}

/// Static description of a named parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Whether `min` itself is allowed.
    pub min_inclusive: bool,
    pub out_of_range: OutOfRange,
    pub curve: RampCurve,
}

impl ParamSpec {
    /// Check a value against this range, returning the value to store.
    pub fn validate(&self, value: f64) -> Result<f64, InvalidParameter> {
        if !value.is_finite() {
            return Err(InvalidParameter::new(self.name, value, "must be finite"));
        }
        let below = if self.min_inclusive {
            value < self.min
        } else {
            value <= self.min
        };
        if below || value > self.max {
            return match self.out_of_range {
                OutOfRange::Clamp => Ok(value.clamp(self.min, self.max)),
                OutOfRange::Reject => Err(InvalidParameter::new(self.name, value, "out of range")),
            };
        }
        Ok(value)
    }
}

/// Index of a parameter inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// A fixed table of parameters, looked up by name once and by index afterwards.
#[derive(Debug, Clone, Copy)]
pub struct ParameterTable {
    specs: &'static [ParamSpec],
}

impl ParameterTable {
    pub const fn new(specs: &'static [ParamSpec]) -> Self {
        ParameterTable { specs }
    }

    pub fn resolve(&self, name: &str) -> Result<ParamId, InvalidParameter> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .map(ParamId)
            .ok_or_else(|| InvalidParameter::new(name, f64::NAN, "no such parameter"))
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    pub fn spec(&self, id: ParamId) -> Option<&'static ParamSpec> {
        self.specs.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &'static ParamSpec)> {
        self.specs.iter().enumerate().map(|(i, s)| (ParamId(i), s))
    }
}

/// A live parameter value owned by the audio thread.
#[derive(Debug, Clone)]
pub struct Parameter {
    ramp: Ramp,
}

impl Parameter {
    pub fn new(spec: &ParamSpec, value: f64) -> Self {
        Parameter {
            ramp: Ramp::new(value, spec.curve),
        }
    }

    pub fn set(&mut self, value: f64) {
        self.ramp.set(value);
    }

    pub fn ramp_to(&mut self, target: f64, samples: usize) {
        self.ramp.ramp_to(target, samples);
    }

    /// Advance one sample. Returns the value and whether a ramp finished on this sample.
    #[inline]
    pub fn next(&mut self) -> (f64, bool) {
        let was_ramping = self.ramp.is_ramping();
        let value = self.ramp.next();
        (value, was_ramping && !self.ramp.is_ramping())
    }

    pub fn value(&self) -> f64 {
        self.ramp.value()
    }

    pub fn target(&self) -> f64 {
        self.ramp.target()
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_ramping()
    }
}

/// Published by the audio thread when a parameter value lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    pub index: usize,
    pub value: f64,
}

/// Fixed-capacity parameter vector, small enough to pass through a ring buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamVector {
    values: [f64; MAX_PARAMETERS],
    len: usize,
}

impl ParamVector {
    pub fn from_slice(values: &[f64]) -> Result<Self, InvalidParameter> {
        if values.len() > MAX_PARAMETERS {
            return Err(InvalidParameter::new(
                "parameters",
                values.len() as f64,
                "more values than parameter slots",
            ));
        }
        let mut out = ParamVector {
            values: [0.0; MAX_PARAMETERS],
            len: values.len(),
        };
        for (i, &v) in values.iter().enumerate() {
            if !v.is_finite() {
                return Err(InvalidParameter::new(format!("parameters[{i}]"), v, "must be finite"));
            }
            out.values[i] = v;
        }
        Ok(out)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec {
            name: "frequency",
            default: 440.0,
            min: 0.0,
            max: 20_000.0,
            min_inclusive: false,
            out_of_range: OutOfRange::Reject,
            curve: RampCurve::Linear,
        },
        ParamSpec {
            name: "pulseWidth",
            default: 0.5,
            min: 0.01,
            max: 0.99,
            min_inclusive: true,
            out_of_range: OutOfRange::Clamp,
            curve: RampCurve::Linear,
        },
    ];
    const TABLE: ParameterTable = ParameterTable::new(SPECS);

    #[test]
    fn resolve_by_name() {
        assert_eq!(TABLE.resolve("frequency").unwrap(), ParamId(0));
        assert_eq!(TABLE.resolve("pulseWidth").unwrap(), ParamId(1));
        assert!(TABLE.resolve("cutoff").is_err());
        assert_eq!(TABLE.len(), 2);
    }

    #[test]
    fn validate_rejects_or_clamps() {
        let freq = &SPECS[0];
        assert!(freq.validate(0.0).is_err());
        assert!(freq.validate(-5.0).is_err());
        assert!(freq.validate(f64::NAN).is_err());
        assert_eq!(freq.validate(220.0).unwrap(), 220.0);

        let width = &SPECS[1];
        assert_eq!(width.validate(0.0).unwrap(), 0.01);
        assert_eq!(width.validate(1.0).unwrap(), 0.99);
        assert_eq!(width.validate(0.3).unwrap(), 0.3);
    }

    #[test]
    fn parameter_reports_ramp_completion() {
        let mut p = Parameter::new(&SPECS[0], 440.0);
        p.ramp_to(880.0, 3);
        assert!(!p.next().1);
        assert!(!p.next().1);
        assert_eq!(p.next(), (880.0, true));
        assert_eq!(p.next(), (880.0, false));
    }

    #[test]
    fn param_vector_limits() {
        let v = ParamVector::from_slice(&[1.0, 2.0]).unwrap();
        assert_eq!(v.as_slice(), &[1.0, 2.0]);
        assert!(ParamVector::from_slice(&[0.0; MAX_PARAMETERS + 1]).is_err());
        assert!(ParamVector::from_slice(&[f64::INFINITY]).is_err());
    }
}
