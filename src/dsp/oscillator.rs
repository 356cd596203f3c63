//! Anti-aliased oscillators using PolyBLEP.

use std::f64::consts::PI;

use crate::error::InvalidParameter;

/// Narrowest and widest pulse the square oscillator will produce.
pub const PULSE_WIDTH_MIN: f64 = 0.01;
pub const PULSE_WIDTH_MAX: f64 = 0.99;

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    /// Pulse wave; 0.5 is a square.
    Pulse,
}

/// A band-limited oscillator with anti-aliasing (PolyBLEP).
///
/// Frequency and pulse width are plain fields so the interpreter can update
/// them every sample from its stack without a validation round-trip.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    pub pulse_width: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            pulse_width: 0.5,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.frequency / self.sample_rate
    }

    /// Generate the next sample in [-1, 1] (PolyBLEP may overshoot slightly).
    #[inline]
    pub fn step(&mut self) -> f64 {
        let inc = self.phase_inc();
        let dt = inc.abs().min(0.5);
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Sawtooth => sawtooth(self.phase, dt),
            Waveform::Pulse => pulse(self.phase, dt, self.pulse_width),
        };

        self.phase = (self.phase + inc).rem_euclid(1.0);
        sample
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Bandlimited square/pulse oscillator with amplitude, detuning and pulse width.
#[derive(Debug, Clone)]
pub struct SquareWaveOscillator {
    osc: Oscillator,
    frequency: f64,
    amplitude: f64,
    detuning: f64,
}

impl SquareWaveOscillator {
    pub fn new(sample_rate: f64) -> Self {
        SquareWaveOscillator {
            osc: Oscillator::new(Waveform::Pulse, sample_rate),
            frequency: 440.0,
            amplitude: 1.0,
            detuning: 0.0,
        }
    }

    /// Set all parameters at once. On error nothing changes.
    ///
    /// # Arguments
    /// - `frequency`: Hz, > 0.
    /// - `amplitude`: >= 0.
    /// - `detuning`: Hz offset added to `frequency`.
    /// - `pulse_width`: duty cycle, clamped into `[PULSE_WIDTH_MIN, PULSE_WIDTH_MAX]`.
    pub fn configure(
        &mut self,
        frequency: f64,
        amplitude: f64,
        detuning: f64,
        pulse_width: f64,
    ) -> Result<(), InvalidParameter> {
        validate_frequency(frequency)?;
        validate_amplitude(amplitude)?;
        validate_finite("detuning", detuning)?;
        validate_finite("pulseWidth", pulse_width)?;
        self.frequency = frequency;
        self.amplitude = amplitude;
        self.detuning = detuning;
        self.osc.pulse_width = clamp_pulse_width(pulse_width);
        Ok(())
    }

    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), InvalidParameter> {
        validate_frequency(frequency)?;
        self.frequency = frequency;
        Ok(())
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<(), InvalidParameter> {
        validate_amplitude(amplitude)?;
        self.amplitude = amplitude;
        Ok(())
    }

    pub fn set_detuning(&mut self, detuning: f64) -> Result<(), InvalidParameter> {
        validate_finite("detuning", detuning)?;
        self.detuning = detuning;
        Ok(())
    }

    pub fn set_pulse_width(&mut self, pulse_width: f64) -> Result<(), InvalidParameter> {
        validate_finite("pulseWidth", pulse_width)?;
        self.osc.pulse_width = clamp_pulse_width(pulse_width);
        Ok(())
    }

    /// Set all parameters from values that were validated elsewhere.
    /// Pulse width is still clamped.
    #[inline]
    pub(crate) fn set_unchecked(&mut self, frequency: f64, amplitude: f64, detuning: f64, pulse_width: f64) {
        self.frequency = frequency;
        self.amplitude = amplitude;
        self.detuning = detuning;
        self.osc.pulse_width = clamp_pulse_width(pulse_width);
    }

    #[inline]
    pub fn step(&mut self) -> f64 {
        self.osc.frequency = self.frequency + self.detuning;
        self.osc.step() * self.amplitude
    }

    pub fn reset(&mut self) {
        self.osc.reset();
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn detuning(&self) -> f64 {
        self.detuning
    }

    pub fn pulse_width(&self) -> f64 {
        self.osc.pulse_width
    }
}

/// Smallest wavetable a [`TableOscillator`] accepts.
pub const MIN_TABLE_SIZE: usize = 2;

/// Size of the default sine table.
pub const DEFAULT_TABLE_SIZE: usize = 4096;

/// Wavetable oscillator with linear interpolation between table entries.
///
/// The table is allocated by [`setup_waveform`](Self::setup_waveform) (or a
/// constructor) and filled with [`set_waveform_value`](Self::set_waveform_value)
/// on the control side. `step` only reads it.
#[derive(Debug, Clone)]
pub struct TableOscillator {
    table: Vec<f64>,
    phase: f64,
    sample_rate: f64,
    frequency: f64,
    amplitude: f64,
    detuning: f64,
}

impl TableOscillator {
    /// An oscillator over a zeroed table of `size` entries.
    pub fn new(sample_rate: f64, size: usize) -> Result<Self, InvalidParameter> {
        validate_table_size(size)?;
        Ok(TableOscillator {
            table: vec![0.0; size],
            phase: 0.0,
            sample_rate,
            frequency: 440.0,
            amplitude: 1.0,
            detuning: 0.0,
        })
    }

    /// One cycle of a sine over [`DEFAULT_TABLE_SIZE`] entries.
    pub fn sine(sample_rate: f64) -> Self {
        let table = (0..DEFAULT_TABLE_SIZE)
            .map(|i| (2.0 * PI * i as f64 / DEFAULT_TABLE_SIZE as f64).sin())
            .collect();
        TableOscillator {
            table,
            phase: 0.0,
            sample_rate,
            frequency: 440.0,
            amplitude: 1.0,
            detuning: 0.0,
        }
    }

    /// An oscillator reading a copy of `waveform`, one cycle long.
    pub fn from_table(sample_rate: f64, waveform: &[f64]) -> Result<Self, InvalidParameter> {
        let mut osc = Self::new(sample_rate, waveform.len())?;
        for (index, &value) in waveform.iter().enumerate() {
            osc.set_waveform_value(value, index)?;
        }
        Ok(osc)
    }

    /// Reallocate the table with `size` zeroed entries and restart the phase.
    pub fn setup_waveform(&mut self, size: usize) -> Result<(), InvalidParameter> {
        validate_table_size(size)?;
        self.table = vec![0.0; size];
        self.phase = 0.0;
        Ok(())
    }

    pub fn set_waveform_value(&mut self, value: f64, index: usize) -> Result<(), InvalidParameter> {
        validate_finite("waveformValue", value)?;
        let slot = self
            .table
            .get_mut(index)
            .ok_or_else(|| InvalidParameter::new("index", index as f64, "outside the wavetable"))?;
        *slot = value;
        Ok(())
    }

    /// Set frequency, amplitude and detuning at once. On error nothing changes.
    pub fn configure(&mut self, frequency: f64, amplitude: f64, detuning: f64) -> Result<(), InvalidParameter> {
        validate_frequency(frequency)?;
        validate_amplitude(amplitude)?;
        validate_finite("detuning", detuning)?;
        self.set_unchecked(frequency, amplitude, detuning);
        Ok(())
    }

    #[inline]
    pub(crate) fn set_unchecked(&mut self, frequency: f64, amplitude: f64, detuning: f64) {
        self.frequency = frequency;
        self.amplitude = amplitude;
        self.detuning = detuning;
    }

    #[inline]
    pub fn step(&mut self) -> f64 {
        let len = self.table.len();
        let position = self.phase * len as f64;
        let index = (position as usize).min(len - 1);
        let frac = position - index as f64;
        let a = self.table[index];
        let b = self.table[(index + 1) % len];
        let sample = (a + (b - a) * frac) * self.amplitude;

        let inc = (self.frequency + self.detuning) / self.sample_rate;
        self.phase = (self.phase + inc).rem_euclid(1.0);
        sample
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    pub fn table(&self) -> &[f64] {
        &self.table
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn detuning(&self) -> f64 {
        self.detuning
    }
}

fn validate_table_size(size: usize) -> Result<(), InvalidParameter> {
    if size < MIN_TABLE_SIZE {
        return Err(InvalidParameter::new("size", size as f64, "wavetable needs at least 2 entries"));
    }
    Ok(())
}

pub fn clamp_pulse_width(width: f64) -> f64 {
    width.clamp(PULSE_WIDTH_MIN, PULSE_WIDTH_MAX)
}

fn validate_frequency(frequency: f64) -> Result<(), InvalidParameter> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(InvalidParameter::new("frequency", frequency, "must be > 0 Hz"));
    }
    Ok(())
}

fn validate_amplitude(amplitude: f64) -> Result<(), InvalidParameter> {
    if !amplitude.is_finite() || amplitude < 0.0 {
        return Err(InvalidParameter::new("amplitude", amplitude, "must be >= 0"));
    }
    Ok(())
}

fn validate_finite(name: &'static str, value: f64) -> Result<(), InvalidParameter> {
    if !value.is_finite() {
        return Err(InvalidParameter::new(name, value, "must be finite"));
    }
    Ok(())
}

/// Naive sawtooth rising from -1 to +1; PolyBLEP corrects the wrap.
fn sawtooth(phase: f64, dt: f64) -> f64 {
    2.0 * phase - 1.0 - poly_blep(phase, dt)
}

/// Pulse wave: +1 for `phase < width`, -1 otherwise, with both edges corrected.
fn pulse(phase: f64, dt: f64, width: f64) -> f64 {
    let width = width.clamp(PULSE_WIDTH_MIN, PULSE_WIDTH_MAX);
    let mut value = if phase < width { 1.0 } else { -1.0 };
    value += poly_blep(phase, dt);
    value -= poly_blep((phase + 1.0 - width) % 1.0, dt);
    value
}

/// PolyBLEP (Polynomial Band-Limited Step) anti-aliasing correction.
///
/// `t` is the phase [0, 1), `dt` is the phase increment per sample.
/// Returns a correction value to subtract from the naive waveform
/// at discontinuities.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        // Just after the discontinuity
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        // Just before the next discontinuity
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}
