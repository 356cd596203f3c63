//! Allpass and comb filters: the building blocks of the reverb network.

use crate::dsp::delay::DelayLine;
use crate::error::InvalidParameter;

/// Loop gain that decays by 60 dB after `decay_time` seconds when applied
/// once every `loop_time` seconds.
pub fn gain_for_decay(loop_time: f64, decay_time: f64) -> f64 {
    if decay_time <= 0.0 || !decay_time.is_finite() {
        return 0.0;
    }
    0.001f64.powf(loop_time / decay_time)
}

fn validate_gain(gain: f64) -> Result<(), InvalidParameter> {
    if !gain.is_finite() || gain.abs() >= 1.0 {
        return Err(InvalidParameter::new("gain", gain, "must satisfy |g| < 1"));
    }
    Ok(())
}

/// Schroeder allpass: `y = -g*x + d; d' = x + g*y`.
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    buffer: Vec<f64>,
    index: usize,
    gain: f64,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize, gain: f64) -> Result<Self, InvalidParameter> {
        validate_gain(gain)?;
        Ok(Self {
            buffer: vec![0.0; delay_samples.max(1)],
            index: 0,
            gain,
        })
    }

    /// Change the loop gain; the previous gain is kept on error.
    pub fn configure(&mut self, gain: f64) -> Result<(), InvalidParameter> {
        validate_gain(gain)?;
        self.gain = gain;
        Ok(())
    }

    /// Set the gain without validation, clamping into the stable range.
    /// Used when the gain is driven per sample from a signal.
    #[inline]
    pub fn set_gain_clamped(&mut self, gain: f64) {
        self.gain = if gain.is_finite() { gain.clamp(-0.9999, 0.9999) } else { 0.0 };
    }

    #[inline]
    pub fn step(&mut self, input: f64) -> f64 {
        let delayed = self.buffer[self.index];
        let output = -self.gain * input + delayed;
        self.buffer[self.index] = input + self.gain * output;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn delay_samples(&self) -> usize {
        self.buffer.len()
    }
}

/// Feedback comb: `y[n] = x[n-D] + g*y[n-D]`.
#[derive(Debug, Clone)]
pub struct CombFilter {
    line: DelayLine,
}

impl CombFilter {
    pub fn new(delay_samples: usize, gain: f64) -> Result<Self, InvalidParameter> {
        Ok(Self {
            line: DelayLine::with_samples(delay_samples, gain)?,
        })
    }

    /// Change the feedback gain in [0, 1); the previous gain is kept on error.
    pub fn configure(&mut self, gain: f64) -> Result<(), InvalidParameter> {
        self.line.set_feedback(gain)
    }

    /// Set the gain from a signal, clamping into [0, 1).
    #[inline]
    pub fn set_gain_clamped(&mut self, gain: f64) {
        self.line.set_feedback_clamped(gain);
    }

    #[inline]
    pub fn step(&mut self, input: f64) -> f64 {
        self.line.step(input)
    }

    pub fn reset(&mut self) {
        self.line.reset();
    }

    pub fn gain(&self) -> f64 {
        self.line.feedback()
    }

    pub fn delay_samples(&self) -> usize {
        self.line.delay_samples()
    }
}
