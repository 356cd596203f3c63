//! Reverb effect: JCRev network.
//!
//! Three series allpass filters feed four parallel comb filters whose sum
//! goes through two short delays of different length, one per output
//! channel, to decorrelate left from right.

use crate::dsp::delay::DelayLine;
use crate::dsp::filter::{AllpassFilter, CombFilter};
use crate::dsp::ramp::{Ramp, RampCurve};
use crate::error::InvalidParameter;

// Tuning constants (scaled for 44100 Hz sample rate)
const ALLPASS_TUNING: [usize; 3] = [225, 341, 441];
const COMB_TUNING: [usize; 4] = [1116, 1356, 1422, 1617];
const OUTPUT_TUNING: [usize; 2] = [211, 179];
const ALLPASS_GAIN: f64 = 0.7;
const COMB_SCALE: f64 = 0.25;
const REFERENCE_RATE: f64 = 44100.0;

pub const DEFAULT_T60: f64 = 1.0;
pub const DEFAULT_MIX: f64 = 0.3;

/// A mono-in, stereo-out JCRev reverb.
#[derive(Debug, Clone)]
pub struct Reverb {
    allpass: [AllpassFilter; 3],
    combs: [CombFilter; 4],
    out_left: DelayLine,
    out_right: DelayLine,
    mix: Ramp,
    t60: f64,
    sample_rate: f64,
}

fn scaled(len: usize, scale: f64) -> usize {
    ((len as f64 * scale).round() as usize).max(1)
}

impl Reverb {
    /// Create a reverb with the default decay time and mix.
    ///
    /// # Arguments
    /// - `sample_rate`: Audio sample rate in Hz. Delay lengths scale from 44.1 kHz.
    pub fn new(sample_rate: f64) -> Result<Self, InvalidParameter> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(InvalidParameter::new("sampleRate", sample_rate, "must be > 0 Hz"));
        }
        let scale = sample_rate / REFERENCE_RATE;
        let allpass = [
            AllpassFilter::new(scaled(ALLPASS_TUNING[0], scale), ALLPASS_GAIN)?,
            AllpassFilter::new(scaled(ALLPASS_TUNING[1], scale), ALLPASS_GAIN)?,
            AllpassFilter::new(scaled(ALLPASS_TUNING[2], scale), ALLPASS_GAIN)?,
        ];
        let combs = [
            CombFilter::new(scaled(COMB_TUNING[0], scale), 0.0)?,
            CombFilter::new(scaled(COMB_TUNING[1], scale), 0.0)?,
            CombFilter::new(scaled(COMB_TUNING[2], scale), 0.0)?,
            CombFilter::new(scaled(COMB_TUNING[3], scale), 0.0)?,
        ];

        let mut reverb = Self {
            allpass,
            combs,
            out_left: DelayLine::with_samples(scaled(OUTPUT_TUNING[0], scale), 0.0)?,
            out_right: DelayLine::with_samples(scaled(OUTPUT_TUNING[1], scale), 0.0)?,
            mix: Ramp::new(DEFAULT_MIX, RampCurve::EqualPower),
            t60: DEFAULT_T60,
            sample_rate,
        };
        reverb.set_t60(DEFAULT_T60)?;
        Ok(reverb)
    }

    /// Set the time for the tail to fall by 60 dB.
    pub fn set_t60(&mut self, t60: f64) -> Result<(), InvalidParameter> {
        if !t60.is_finite() || t60 <= 0.0 {
            return Err(InvalidParameter::new("t60", t60, "must be > 0 seconds"));
        }
        for comb in &mut self.combs {
            let len = comb.delay_samples() as f64;
            let gain = 10f64.powf(-3.0 * len / (t60 * self.sample_rate));
            comb.configure(gain)?;
        }
        self.t60 = t60;
        Ok(())
    }

    /// Set the wet/dry mix. `ramp_samples == 0` jumps immediately; otherwise
    /// the mix moves along an equal-power curve.
    pub fn set_mix(&mut self, mix: f64, ramp_samples: usize) -> Result<(), InvalidParameter> {
        if !mix.is_finite() || !(0.0..=1.0).contains(&mix) {
            return Err(InvalidParameter::new("mix", mix, "must be in [0, 1]"));
        }
        self.mix.ramp_to(mix, ramp_samples);
        Ok(())
    }

    pub fn t60(&self) -> f64 {
        self.t60
    }

    pub fn mix(&self) -> f64 {
        self.mix.value()
    }

    /// Run the network once and return the wet `(left, right)` pair.
    #[inline]
    fn wet(&mut self, input: f64) -> (f64, f64) {
        let mut diffused = input;
        for ap in &mut self.allpass {
            diffused = ap.step(diffused);
        }
        let mut sum = 0.0;
        for comb in &mut self.combs {
            sum += comb.step(diffused);
        }
        sum *= COMB_SCALE;
        (self.out_left.step(sum), self.out_right.step(sum))
    }

    /// Process one mono sample into a stereo pair.
    #[inline]
    pub fn process_mono(&mut self, input: f64) -> (f64, f64) {
        let mix = self.mix.next();
        let (wl, wr) = self.wet(input);
        let dry = 1.0 - mix;
        (dry * input + mix * wl, dry * input + mix * wr)
    }

    /// Process a stereo pair. The network runs on the mono sum; the dry
    /// path keeps the channels apart.
    #[inline]
    pub fn process_stereo(&mut self, left: f64, right: f64) -> (f64, f64) {
        let mix = self.mix.next();
        let (wl, wr) = self.wet(0.5 * (left + right));
        let dry = 1.0 - mix;
        (dry * left + mix * wl, dry * right + mix * wr)
    }

    /// Clear all internal buffers.
    pub fn reset(&mut self) {
        for ap in &mut self.allpass {
            ap.reset();
        }
        for comb in &mut self.combs {
            comb.reset();
        }
        self.out_left.reset();
        self.out_right.reset();
    }
}
