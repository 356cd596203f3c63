//! Operation generator: runs a compiled program once per sample and hands
//! control between threads without locks.
//!
//! [`OperationGenerator`] lives on the audio thread. Its paired
//! [`GeneratorHandle`] lives on the control thread and talks to it through
//! two single-producer/single-consumer ring buffers: control messages go in,
//! parameter-change notifications come back. The active flag and the fault
//! counter are shared atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::compiler::{self, Program};
use crate::dsp::engine::AudioContext;
use crate::error::{InvalidParameter, SporthError};
use crate::operation::{
    Operation, OperationForm, StereoOperation, TRIGGER_SLOTS, program_source,
};
use crate::params::{MAX_PARAMETERS, ParamVector, ParameterChange};

// ── Shared State ────────────────────────────────────────────

/// Flags shared between an audio-thread node and its control handle.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) active: AtomicBool,
    pub(crate) faults: AtomicU64,
}

impl Shared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Shared {
            active: AtomicBool::new(true),
            faults: AtomicU64::new(0),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum ControlMessage {
    Parameters(ParamVector),
    Trigger(Option<ParamVector>),
}

// ── Generator (audio thread) ────────────────────────────────

/// Executes an operation graph sample by sample into a stereo output.
pub struct OperationGenerator {
    program: Program,
    /// Values read by `p`, reserved trigger slots included.
    slots: [f64; MAX_PARAMETERS],
    /// First slot holding user values.
    offset: usize,
    triggered: bool,
    trigger_pending: bool,
    channels: usize,
    control: Consumer<ControlMessage>,
    changes: Producer<ParameterChange>,
    shared: Arc<Shared>,
}

impl OperationGenerator {
    /// Build a generator from a raw token string that leaves two channels.
    pub fn from_sporth(
        ctx: &AudioContext,
        sporth: &str,
        triggered: bool,
    ) -> Result<(Self, GeneratorHandle), SporthError> {
        Self::with_channels(ctx, sporth, triggered, 2)
    }

    /// One signal on both channels.
    pub fn mono(
        ctx: &AudioContext,
        operation: Operation,
        triggered: bool,
    ) -> Result<(Self, GeneratorHandle), SporthError> {
        Self::from_form(ctx, OperationForm::Mono(operation), triggered)
    }

    pub fn stereo(
        ctx: &AudioContext,
        operation: StereoOperation,
        triggered: bool,
    ) -> Result<(Self, GeneratorHandle), SporthError> {
        Self::from_form(ctx, OperationForm::Stereo(operation), triggered)
    }

    /// Independent left and right signals.
    pub fn dual_mono(
        ctx: &AudioContext,
        left: Operation,
        right: Operation,
        triggered: bool,
    ) -> Result<(Self, GeneratorHandle), SporthError> {
        Self::from_form(ctx, OperationForm::DualMono { left, right }, triggered)
    }

    fn from_form(
        ctx: &AudioContext,
        form: OperationForm,
        triggered: bool,
    ) -> Result<(Self, GeneratorHandle), SporthError> {
        Self::with_channels(ctx, &form.compose(triggered), triggered, 2)
    }

    /// Build a generator from a token string that leaves `channels` values
    /// (1 or 2). A one-channel program is copied to both outputs.
    pub fn with_channels(
        ctx: &AudioContext,
        sporth: &str,
        triggered: bool,
        channels: usize,
    ) -> Result<(Self, GeneratorHandle), SporthError> {
        if !(1..=2).contains(&channels) {
            return Err(InvalidParameter::new("channels", channels as f64, "must be 1 or 2").into());
        }
        let source = program_source(sporth, triggered);
        let graph = crate::parse_with_outputs(&source, channels)?;
        let program = compiler::compile(&graph, ctx)?;

        let offset = if triggered { TRIGGER_SLOTS } else { 0 };
        let capacity = ctx.config().control_queue_capacity;
        let (control_tx, control_rx) = RingBuffer::new(capacity);
        let (change_tx, change_rx) = RingBuffer::new(capacity * MAX_PARAMETERS);
        let shared = Shared::new();

        let usage = graph.params();
        let expected = usage
            .expected_count()
            .map(|count| count.saturating_sub(offset));

        tracing::info!(
            source = %source,
            channels,
            triggered,
            parameters = ?expected,
            "created operation generator"
        );

        let generator = OperationGenerator {
            program,
            slots: [0.0; MAX_PARAMETERS],
            offset,
            triggered,
            trigger_pending: false,
            channels,
            control: control_rx,
            changes: change_tx,
            shared: Arc::clone(&shared),
        };
        let handle = GeneratorHandle {
            control: control_tx,
            changes: change_rx,
            shared,
            expected,
            free_slots: MAX_PARAMETERS - offset,
            reported_faults: 0,
        };
        Ok((generator, handle))
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Current user parameter values (trigger slots excluded).
    pub fn parameters(&self) -> &[f64] {
        &self.slots[self.offset..]
    }

    /// Store user values and publish a notification for each slot that changed.
    fn apply(&mut self, values: &ParamVector) {
        for (i, &value) in values.as_slice().iter().enumerate() {
            let slot = &mut self.slots[self.offset + i];
            if *slot != value {
                *slot = value;
                // Dropped when the control side is not draining.
                let _ = self.changes.push(ParameterChange { index: i, value });
            }
        }
    }

    fn drain_control(&mut self) {
        while let Ok(message) = self.control.pop() {
            match message {
                ControlMessage::Parameters(values) => self.apply(&values),
                ControlMessage::Trigger(snapshot) => {
                    if let Some(values) = snapshot {
                        self.apply(&values);
                    }
                    self.trigger_pending = true;
                }
            }
        }
    }

    fn set_pulse(&mut self, value: f64) {
        if self.triggered {
            self.slots[0] = value;
            self.slots[1] = value;
        }
    }

    fn fault(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);
        self.shared.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Render one block into `left` and `right`.
    ///
    /// Never allocates, locks or blocks. Mismatched buffer lengths, a block
    /// longer than `ctx.block_size()`, or non-finite output silence the
    /// block and count a fault.
    pub fn process(&mut self, ctx: &AudioContext, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len();
        if frames != right.len() || frames > ctx.block_size() {
            self.fault(left, right);
            return;
        }

        self.drain_control();

        if !self.shared.active.load(Ordering::Acquire) {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }

        let mut finite = true;
        for i in 0..frames {
            let pulse = i == 0 && self.trigger_pending;
            if pulse {
                self.set_pulse(1.0);
                self.program.retrigger();
            }

            let out = self.program.tick(&self.slots);
            let l = out.first().copied().unwrap_or(0.0);
            let r = if self.channels == 2 {
                out.get(1).copied().unwrap_or(0.0)
            } else {
                l
            };
            let (l, r) = (l as f32, r as f32);
            finite &= l.is_finite() && r.is_finite();
            left[i] = l;
            right[i] = r;

            if pulse {
                self.set_pulse(0.0);
                self.trigger_pending = false;
            }
        }

        if !finite {
            self.program.reset();
            self.fault(left, right);
        }
    }
}

// ── Handle (control thread) ─────────────────────────────────

/// Control-side counterpart of an [`OperationGenerator`].
pub struct GeneratorHandle {
    control: Producer<ControlMessage>,
    changes: Consumer<ParameterChange>,
    shared: Arc<Shared>,
    /// User values the graph reads, when known statically.
    expected: Option<usize>,
    free_slots: usize,
    reported_faults: u64,
}

impl GeneratorHandle {
    fn validate(&self, values: &[f64]) -> Result<ParamVector, InvalidParameter> {
        match self.expected {
            Some(expected) if values.len() != expected => {
                return Err(InvalidParameter::new(
                    "parameters",
                    values.len() as f64,
                    "length differs from the parameters the graph reads",
                ));
            }
            None if values.len() > self.free_slots => {
                return Err(InvalidParameter::new(
                    "parameters",
                    values.len() as f64,
                    "more values than free parameter slots",
                ));
            }
            _ => {}
        }
        ParamVector::from_slice(values)
    }

    fn send(&mut self, message: ControlMessage) -> Result<(), SporthError> {
        self.control.push(message).map_err(|_| {
            tracing::warn!("control queue full, message dropped");
            SporthError::QueueFull
        })
    }

    /// Replace the parameter vector from the next processed block on.
    pub fn set_parameters(&mut self, values: &[f64]) -> Result<(), SporthError> {
        let values = self.validate(values).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected parameter update");
        })?;
        self.send(ControlMessage::Parameters(values))
    }

    /// Fire the trigger on the first tick of the next processed block,
    /// optionally replacing the parameters at the same time.
    pub fn trigger(&mut self, values: &[f64]) -> Result<(), SporthError> {
        let snapshot = if values.is_empty() {
            None
        } else {
            Some(self.validate(values)?)
        };
        self.send(ControlMessage::Trigger(snapshot))
    }

    pub fn start(&self) {
        self.shared.active.store(true, Ordering::Release);
    }

    /// Silence output. The generator's state is frozen until `start`.
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Number of blocks silenced because of a fault.
    pub fn faults(&self) -> u64 {
        self.shared.faults.load(Ordering::Relaxed)
    }

    /// Log faults counted since the last call. Returns how many were new.
    pub fn report_faults(&mut self) -> u64 {
        let total = self.faults();
        let new = total - self.reported_faults;
        if new > 0 {
            tracing::warn!(new, total, "generator silenced faulted blocks");
        }
        self.reported_faults = total;
        new
    }

    /// Next parameter change published by the audio thread.
    pub fn poll_change(&mut self) -> Option<ParameterChange> {
        self.changes.pop().ok()
    }

    /// Number of user values `set_parameters` expects, if fixed.
    pub fn expected_parameters(&self) -> Option<usize> {
        self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ArityError;

    fn ctx() -> AudioContext {
        AudioContext::with_sample_rate(44100.0).unwrap()
    }

    fn block(
        generator: &mut OperationGenerator,
        ctx: &AudioContext,
        frames: usize,
    ) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        generator.process(ctx, &mut left, &mut right);
        (left, right)
    }

    #[test]
    fn constant_dup_fills_both_channels() {
        let ctx = ctx();
        let (mut generator, _handle) = OperationGenerator::from_sporth(&ctx, "440 dup", false).unwrap();
        let (left, right) = block(&mut generator, &ctx, 512);
        assert!(left.iter().all(|&s| s == 440.0));
        assert!(right.iter().all(|&s| s == 440.0));
    }

    #[test]
    fn mono_channel_count_mismatch() {
        let ctx = ctx();
        let err = OperationGenerator::from_sporth(&ctx, "440", false).err().unwrap();
        assert!(matches!(
            err,
            SporthError::Arity(ArityError::OutputMismatch { expected: 2, found: 1 })
        ));
        assert!(OperationGenerator::with_channels(&ctx, "440", false, 1).is_ok());
    }

    #[test]
    fn unknown_word_fails_at_construction() {
        let ctx = ctx();
        assert!(matches!(
            OperationGenerator::from_sporth(&ctx, "440 0.5 sinx dup", false),
            Err(SporthError::Parse(_))
        ));
    }

    #[test]
    fn dual_mono_channels_are_independent() {
        let ctx = ctx();
        let (mut generator, mut handle) = OperationGenerator::dual_mono(
            &ctx,
            Operation::new("440 0 p sine"),
            Operation::new("660 1 p sine"),
            false,
        )
        .unwrap();
        handle.set_parameters(&[0.0, 0.5]).unwrap();
        let (left, right) = block(&mut generator, &ctx, 512);
        assert!(left.iter().all(|&s| s == 0.0));
        assert!(right.iter().any(|&s| s.abs() > 0.1));
    }

    #[test]
    fn trigger_pulses_for_one_tick() {
        let ctx = ctx();
        let (mut generator, mut handle) =
            OperationGenerator::mono(&ctx, Operation::new("1 *"), true).unwrap();
        let (left, _) = block(&mut generator, &ctx, 8);
        assert!(left.iter().all(|&s| s == 0.0));

        handle.trigger(&[]).unwrap();
        let (left, right) = block(&mut generator, &ctx, 8);
        assert_eq!(left, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(left, right);

        let (left, _) = block(&mut generator, &ctx, 8);
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn triggered_user_parameters_start_after_pulse() {
        let ctx = ctx();
        let (mut generator, mut handle) =
            OperationGenerator::mono(&ctx, Operation::new("drop 2 p 3 p +"), true).unwrap();
        assert_eq!(handle.expected_parameters(), Some(2));
        handle.trigger(&[0.25, 0.5]).unwrap();
        let (left, _) = block(&mut generator, &ctx, 4);
        assert!(left.iter().all(|&s| s == 0.75));
        assert_eq!(&generator.parameters()[..2], &[0.25, 0.5]);
    }

    #[test]
    fn wrong_parameter_count_fails_fast() {
        let ctx = ctx();
        let (mut generator, mut handle) =
            OperationGenerator::from_sporth(&ctx, "0 p 1 p", false).unwrap();
        handle.set_parameters(&[1.0, 2.0]).unwrap();
        block(&mut generator, &ctx, 4);
        let err = handle.set_parameters(&[1.0]).unwrap_err();
        assert!(matches!(err, SporthError::InvalidParameter(_)));
        assert!(handle.set_parameters(&[1.0, f64::NAN]).is_err());
        let (left, right) = block(&mut generator, &ctx, 4);
        assert_eq!((left[0], right[0]), (1.0, 2.0));
    }

    #[test]
    fn parameter_changes_are_published() {
        let ctx = ctx();
        let (mut generator, mut handle) =
            OperationGenerator::from_sporth(&ctx, "0 p 1 p", false).unwrap();
        handle.set_parameters(&[1.0, 0.0]).unwrap();
        assert_eq!(handle.poll_change(), None);
        block(&mut generator, &ctx, 4);
        assert_eq!(handle.poll_change(), Some(ParameterChange { index: 0, value: 1.0 }));
        assert_eq!(handle.poll_change(), None);
    }

    #[test]
    fn stop_silences_and_freezes() {
        let ctx = ctx();
        let (mut generator, handle) =
            OperationGenerator::mono(&ctx, Operation::new("100 1 blsaw"), false).unwrap();
        let (reference, _) = block(&mut generator, &ctx, 64);

        let (mut generator, handle2) =
            OperationGenerator::mono(&ctx, Operation::new("100 1 blsaw"), false).unwrap();
        handle2.stop();
        assert!(!handle2.is_active());
        let (silent, _) = block(&mut generator, &ctx, 64);
        assert!(silent.iter().all(|&s| s == 0.0));
        handle2.start();
        let (resumed, _) = block(&mut generator, &ctx, 64);
        assert_eq!(resumed, reference);
        assert!(handle.is_active());
    }

    #[test]
    fn repeated_stop_start_matches_uninterrupted_render() {
        let ctx = ctx();
        let op = || Operation::new("100 1 blsaw 0.5 0.003 delay");
        let (mut reference, _handle) = OperationGenerator::mono(&ctx, op(), false).unwrap();
        let expected: Vec<f32> = (0..6).flat_map(|_| block(&mut reference, &ctx, 96).0).collect();

        let (mut generator, handle) = OperationGenerator::mono(&ctx, op(), false).unwrap();
        let mut resumed = Vec::new();
        for cycle in 0..6 {
            resumed.extend(block(&mut generator, &ctx, 96).0);
            handle.stop();
            for frames in [96, 17 + cycle] {
                let (left, right) = block(&mut generator, &ctx, frames);
                assert!(left.iter().chain(&right).all(|&s| s == 0.0));
            }
            handle.start();
        }
        assert_eq!(resumed, expected);
        assert_eq!(handle.faults(), 0);
    }

    #[test]
    fn pending_trigger_waits_while_stopped() {
        let ctx = ctx();
        let (mut generator, mut handle) =
            OperationGenerator::mono(&ctx, Operation::new("1 *"), true).unwrap();
        handle.stop();
        handle.trigger(&[]).unwrap();
        block(&mut generator, &ctx, 8);
        handle.start();
        let (left, _) = block(&mut generator, &ctx, 8);
        assert_eq!(left[0], 1.0);
    }

    #[test]
    fn oversized_block_faults() {
        let ctx = AudioContext::new(EngineConfig {
            block_size: 16,
            ..Default::default()
        })
        .unwrap();
        let (mut generator, mut handle) = OperationGenerator::from_sporth(&ctx, "1 dup", false).unwrap();
        let (left, _) = block(&mut generator, &ctx, 32);
        assert!(left.iter().all(|&s| s == 0.0));
        let mut l = vec![0.0; 8];
        let mut r = vec![0.0; 4];
        generator.process(&ctx, &mut l, &mut r);
        assert_eq!(handle.faults(), 2);
        assert_eq!(handle.report_faults(), 2);
        assert_eq!(handle.report_faults(), 0);
    }

    #[test]
    fn non_finite_output_faults() {
        let ctx = ctx();
        let (mut generator, handle) =
            OperationGenerator::from_sporth(&ctx, "1e308 0 p * dup", false).unwrap();
        let (left, _) = block(&mut generator, &ctx, 16);
        assert!(left.iter().all(|&s| s == 0.0));
        assert_eq!(handle.faults(), 0);

        let (mut generator, mut handle) =
            OperationGenerator::from_sporth(&ctx, "1e308 0 p * dup", false).unwrap();
        handle.set_parameters(&[10.0]).unwrap();
        let (left, right) = block(&mut generator, &ctx, 16);
        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
        assert_eq!(handle.faults(), 1);
    }

    #[test]
    fn queue_full_is_reported() {
        let ctx = AudioContext::new(EngineConfig {
            control_queue_capacity: 2,
            ..Default::default()
        })
        .unwrap();
        let (_generator, mut handle) = OperationGenerator::from_sporth(&ctx, "0 p dup", false).unwrap();
        handle.set_parameters(&[1.0]).unwrap();
        handle.set_parameters(&[2.0]).unwrap();
        assert!(matches!(handle.set_parameters(&[3.0]), Err(SporthError::QueueFull)));
    }

    #[test]
    fn process_does_not_grow_program_stack() {
        let ctx = ctx();
        let (mut generator, _handle) = OperationGenerator::stereo(
            &ctx,
            StereoOperation::new("440 0.5 sine jcrev swap"),
            false,
        )
        .unwrap();
        for _ in 0..32 {
            let (left, right) = block(&mut generator, &ctx, 512);
            assert!(left.iter().chain(&right).all(|s| s.is_finite()));
        }
    }
}
