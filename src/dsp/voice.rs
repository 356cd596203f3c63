//! Oscillator voices: a bandlimited pulse oscillator with named, rampable
//! parameters driven from the control thread.
//!
//! [`VoiceCore`] holds what every voice shares on the audio thread (the
//! parameter ramps, the control queue and the fault policy). [`VoiceHandle`]
//! is the control side for any voice.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::dsp::engine::AudioContext;
use crate::dsp::oscillator::SquareWaveOscillator;
use crate::dsp::ramp::RampCurve;
use crate::error::{InvalidParameter, SporthError};
use crate::generator::Shared;
use crate::params::{OutOfRange, ParamId, ParamSpec, Parameter, ParameterChange, ParameterTable};

pub const FREQUENCY: ParamId = ParamId(0);
pub const AMPLITUDE: ParamId = ParamId(1);
pub const DETUNING: ParamId = ParamId(2);
pub const PULSE_WIDTH: ParamId = ParamId(3);

pub(crate) const FREQUENCY_SPEC: ParamSpec = ParamSpec {
    name: "frequency",
    default: 440.0,
    min: 0.0,
    max: 20_000.0,
    min_inclusive: false,
    out_of_range: OutOfRange::Reject,
    curve: RampCurve::Linear,
};

pub(crate) const AMPLITUDE_SPEC: ParamSpec = ParamSpec {
    name: "amplitude",
    default: 1.0,
    min: 0.0,
    max: 10.0,
    min_inclusive: true,
    out_of_range: OutOfRange::Reject,
    curve: RampCurve::Linear,
};

pub(crate) const DETUNING_SPEC: ParamSpec = ParamSpec {
    name: "detuning",
    default: 0.0,
    min: -1000.0,
    max: 1000.0,
    min_inclusive: true,
    out_of_range: OutOfRange::Reject,
    curve: RampCurve::Linear,
};

const PULSE_WIDTH_SPEC: ParamSpec = ParamSpec {
    name: "pulseWidth",
    default: 0.5,
    min: 0.01,
    max: 0.99,
    min_inclusive: true,
    out_of_range: OutOfRange::Clamp,
    curve: RampCurve::Linear,
};

const SQUARE_WAVE_SPECS: &[ParamSpec] = &[FREQUENCY_SPEC, AMPLITUDE_SPEC, DETUNING_SPEC, PULSE_WIDTH_SPEC];

/// Name→index table for the square voice's parameters.
pub const SQUARE_WAVE_PARAMETERS: ParameterTable = ParameterTable::new(SQUARE_WAVE_SPECS);

/// Initial parameter values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareWaveSettings {
    pub frequency: f64,
    pub amplitude: f64,
    pub detuning: f64,
    pub pulse_width: f64,
}

impl Default for SquareWaveSettings {
    fn default() -> Self {
        SquareWaveSettings {
            frequency: FREQUENCY_SPEC.default,
            amplitude: AMPLITUDE_SPEC.default,
            detuning: DETUNING_SPEC.default,
            pulse_width: PULSE_WIDTH_SPEC.default,
        }
    }
}

// ── Voice core (audio thread) ───────────────────────────────

#[derive(Debug, Clone, Copy)]
enum VoiceMessage {
    Set(ParamId, f64),
    Ramp(ParamId, f64),
}

/// Audio-thread state shared by every voice with `N` parameters.
pub(crate) struct VoiceCore<const N: usize> {
    params: [Parameter; N],
    ramp_samples: usize,
    control: Consumer<VoiceMessage>,
    changes: Producer<ParameterChange>,
    shared: Arc<Shared>,
}

impl<const N: usize> VoiceCore<N> {
    /// Validate initial values against `table` and build the queues.
    /// Returns the stored (possibly clamped) values alongside.
    pub(crate) fn new(
        ctx: &AudioContext,
        table: ParameterTable,
        values: [f64; N],
    ) -> Result<(Self, VoiceHandle, [f64; N]), SporthError> {
        if table.len() != N {
            return Err(InvalidParameter::new("parameters", N as f64, "does not match the parameter table").into());
        }
        let specs = table.specs();
        let mut validated = [0.0; N];
        for (slot, (spec, &value)) in validated.iter_mut().zip(specs.iter().zip(&values)) {
            *slot = spec.validate(value)?;
        }
        let params = std::array::from_fn(|i| Parameter::new(&specs[i], validated[i]));

        let capacity = ctx.config().control_queue_capacity;
        let (control_tx, control_rx) = RingBuffer::new(capacity);
        let (change_tx, change_rx) = RingBuffer::new(capacity);
        let shared = Shared::new();

        let core = VoiceCore {
            params,
            ramp_samples: ctx.ramp_samples(),
            control: control_rx,
            changes: change_tx,
            shared: Arc::clone(&shared),
        };
        let handle = VoiceHandle {
            table,
            control: control_tx,
            changes: change_rx,
            shared,
        };
        Ok((core, handle, validated))
    }

    fn publish(&mut self, index: usize, value: f64) {
        // Dropped when the control side is not draining.
        let _ = self.changes.push(ParameterChange { index, value });
    }

    fn drain_control(&mut self) {
        while let Ok(message) = self.control.pop() {
            match message {
                VoiceMessage::Set(id, value) => {
                    if let Some(param) = self.params.get_mut(id.0) {
                        param.set(value);
                        self.publish(id.0, value);
                    }
                }
                VoiceMessage::Ramp(id, value) => {
                    let samples = self.ramp_samples;
                    if let Some(param) = self.params.get_mut(id.0) {
                        param.ramp_to(value, samples);
                        if !param.is_ramping() {
                            self.publish(id.0, value);
                        }
                    }
                }
            }
        }
    }

    /// Apply pending control messages and decide whether to render.
    ///
    /// Mismatched buffer lengths or a block longer than `ctx.block_size()`
    /// silence the block and count a fault. A stopped voice writes silence
    /// and keeps its state frozen. Returns `true` when the caller should
    /// render `left.len()` frames.
    pub(crate) fn begin_block(&mut self, ctx: &AudioContext, left: &mut [f32], right: &mut [f32]) -> bool {
        let frames = left.len();
        if frames != right.len() || frames > ctx.block_size() {
            left.fill(0.0);
            right.fill(0.0);
            self.shared.faults.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.drain_control();

        if !self.shared.active.load(Ordering::Acquire) {
            left.fill(0.0);
            right.fill(0.0);
            return false;
        }
        true
    }

    /// Advance every parameter one sample.
    #[inline]
    pub(crate) fn next_values(&mut self) -> [f64; N] {
        let mut values = [0.0; N];
        for index in 0..N {
            let (value, finished) = self.params[index].next();
            values[index] = value;
            if finished {
                self.publish(index, value);
            }
        }
        values
    }

    pub(crate) fn value(&self, id: ParamId) -> Option<f64> {
        self.params.get(id.0).map(Parameter::value)
    }
}

// ── Square wave voice ───────────────────────────────────────

/// Audio-thread side of the square voice.
pub struct SquareWaveVoice {
    osc: SquareWaveOscillator,
    core: VoiceCore<4>,
}

/// Control side of a [`SquareWaveVoice`].
pub type SquareWaveHandle = VoiceHandle;

impl SquareWaveVoice {
    pub fn new(
        ctx: &AudioContext,
        settings: SquareWaveSettings,
    ) -> Result<(Self, SquareWaveHandle), SporthError> {
        let values = [
            settings.frequency,
            settings.amplitude,
            settings.detuning,
            settings.pulse_width,
        ];
        let (core, handle, [frequency, amplitude, detuning, pulse_width]) =
            VoiceCore::new(ctx, SQUARE_WAVE_PARAMETERS, values)?;

        let mut osc = SquareWaveOscillator::new(ctx.sample_rate());
        osc.configure(frequency, amplitude, detuning, pulse_width)?;

        tracing::info!(frequency, amplitude, "created square wave voice");

        Ok((SquareWaveVoice { osc, core }, handle))
    }

    /// Current value of a parameter, mid-ramp values included.
    pub fn value(&self, id: ParamId) -> Option<f64> {
        self.core.value(id)
    }

    /// Render one block. The same fault policy as the operation generator
    /// applies: a malformed block is silenced and counted.
    pub fn process(&mut self, ctx: &AudioContext, left: &mut [f32], right: &mut [f32]) {
        if !self.core.begin_block(ctx, left, right) {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let [frequency, amplitude, detuning, pulse_width] = self.core.next_values();
            self.osc.set_unchecked(frequency, amplitude, detuning, pulse_width);
            let sample = self.osc.step() as f32;
            *l = sample;
            *r = sample;
        }
    }
}

// ── Handle (control thread) ─────────────────────────────────

/// Control-thread side of a voice. Values are validated here; the audio
/// thread only consumes them.
pub struct VoiceHandle {
    table: ParameterTable,
    control: Producer<VoiceMessage>,
    changes: Consumer<ParameterChange>,
    shared: Arc<Shared>,
}

impl VoiceHandle {
    /// Look a parameter up by name. Do this once and keep the id.
    pub fn resolve(&self, name: &str) -> Result<ParamId, SporthError> {
        Ok(self.table.resolve(name)?)
    }

    fn send(&mut self, id: ParamId, value: f64, ramp: bool) -> Result<(), SporthError> {
        let spec = self
            .table
            .spec(id)
            .ok_or_else(|| InvalidParameter::new("id", id.0 as f64, "no such parameter"))?;
        let value = spec.validate(value).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected voice parameter");
        })?;
        let message = if ramp {
            VoiceMessage::Ramp(id, value)
        } else {
            VoiceMessage::Set(id, value)
        };
        self.control.push(message).map_err(|_| {
            tracing::warn!("voice control queue full, message dropped");
            SporthError::QueueFull
        })
    }

    /// Jump to `value` at the start of the next block.
    pub fn set(&mut self, id: ParamId, value: f64) -> Result<(), SporthError> {
        self.send(id, value, false)
    }

    /// Ramp to `value` over the context's ramp time.
    pub fn ramp(&mut self, id: ParamId, value: f64) -> Result<(), SporthError> {
        self.send(id, value, true)
    }

    pub fn start(&self) {
        self.shared.active.store(true, Ordering::Release);
    }

    /// Silence output. The voice's state is frozen until `start`.
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn faults(&self) -> u64 {
        self.shared.faults.load(Ordering::Relaxed)
    }

    pub fn poll_change(&mut self) -> Option<ParameterChange> {
        self.changes.pop().ok()
    }
}
