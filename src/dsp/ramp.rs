//! Parameter ramps: per-sample interpolation toward a target value.
//!
//! The control side only ever sets a target and a duration; the audio
//! thread advances the ramp one sample at a time.

use std::f64::consts::FRAC_PI_2;

/// Default ramp duration for parameter changes.
pub const DEFAULT_RAMP_MS: f64 = 20.0;

/// Shape of the interpolation between start and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampCurve {
    Linear,
    /// Quarter-sine shape, used for crossfades such as reverb mix.
    EqualPower,
}

/// A value that moves toward a target over a fixed number of samples.
#[derive(Debug, Clone)]
pub struct Ramp {
    curve: RampCurve,
    current: f64,
    start: f64,
    target: f64,
    total: usize,
    remaining: usize,
}

impl Ramp {
    pub fn new(value: f64, curve: RampCurve) -> Self {
        Ramp {
            curve,
            current: value,
            start: value,
            target: value,
            total: 0,
            remaining: 0,
        }
    }

    /// Convert a duration in milliseconds to a whole number of samples (at least 1).
    pub fn samples_for(ms: f64, sample_rate: f64) -> usize {
        ((ms * sample_rate / 1000.0).round() as usize).max(1)
    }

    /// Jump to `value` immediately, cancelling any ramp in progress.
    pub fn set(&mut self, value: f64) {
        self.current = value;
        self.start = value;
        self.target = value;
        self.total = 0;
        self.remaining = 0;
    }

    /// Start ramping from the current value to `target` over `samples` samples.
    pub fn ramp_to(&mut self, target: f64, samples: usize) {
        if samples == 0 || target == self.current {
            self.set(target);
            return;
        }
        self.start = self.current;
        self.target = target;
        self.total = samples;
        self.remaining = samples;
    }

    /// Advance one sample and return the new value.
    ///
    /// The final sample of a ramp returns exactly the target.
    #[inline]
    pub fn next(&mut self) -> f64 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                let t = (self.total - self.remaining) as f64 / self.total as f64;
                let shaped = match self.curve {
                    RampCurve::Linear => t,
                    RampCurve::EqualPower => (t * FRAC_PI_2).sin(),
                };
                self.current = self.start + (self.target - self.start) * shaped;
            }
        }
        self.current
    }

    pub fn value(&self) -> f64 {
        self.current
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}
