//! Graph compiler: turns a validated [`OpGraph`] into an executable [`Program`].
//!
//! Every unit generator gets its DSP state allocated here, once. Running a
//! compiled program never allocates: the working stack is reserved to the
//! graph's maximum depth and cleared (not freed) at the start of each tick.

use crate::dsp::delay::DelayLine;
use crate::dsp::engine::AudioContext;
use crate::dsp::envelope::TriggerEnvelope;
use crate::dsp::filter::{AllpassFilter, CombFilter, gain_for_decay};
use crate::dsp::metro::Metro;
use crate::dsp::oscillator::{Oscillator, Waveform, clamp_pulse_width};
use crate::dsp::reverb::Reverb;
use crate::error::{InvalidParameter, SporthError};
use crate::graph::{OpGraph, OpNode, ParamUsage, StackOp};
use crate::params::MAX_PARAMETERS;
use crate::units::UnitKind;

// ── Unit State ──────────────────────────────────────────────

/// Loop-time filter whose gain follows a per-sample decay time.
#[derive(Debug, Clone)]
struct Decaying<F> {
    filter: F,
    loop_time: f64,
    /// Decay time the current gain was computed for.
    decay_time: f64,
}

impl<F> Decaying<F> {
    fn new(filter: F, loop_time: f64) -> Self {
        Decaying {
            filter,
            loop_time,
            decay_time: f64::NAN,
        }
    }

    /// New gain when `decay_time` changed since the last sample.
    #[inline]
    fn retune(&mut self, decay_time: f64) -> Option<f64> {
        if decay_time == self.decay_time {
            return None;
        }
        self.decay_time = decay_time;
        Some(gain_for_decay(self.loop_time, decay_time))
    }
}

/// DSP state owned by one unit generator occurrence.
#[derive(Debug, Clone)]
enum UnitState {
    Arith(UnitKind),
    Param,
    Oscillator(Oscillator),
    Delay(DelayLine),
    Allpass(Decaying<AllpassFilter>),
    Comb(Decaying<CombFilter>),
    JcRev(Box<Reverb>),
    Tenv(TriggerEnvelope),
    Metro(Metro),
}

#[derive(Debug, Clone)]
enum Instr {
    Push(f64),
    Stack(StackOp),
    Unit(UnitState),
}

// ── Program ─────────────────────────────────────────────────

/// Executable form of an [`OpGraph`].
#[derive(Debug, Clone)]
pub struct Program {
    instrs: Vec<Instr>,
    stack: Vec<f64>,
    outputs: usize,
    params: ParamUsage,
}

#[inline]
fn pop(stack: &mut Vec<f64>) -> f64 {
    stack.pop().unwrap_or(0.0)
}

fn init_time(
    ctx: &AudioContext,
    word: &'static str,
    value: Option<f64>,
) -> Result<f64, InvalidParameter> {
    let value = value.unwrap_or(f64::NAN);
    let max = ctx.config().max_delay_seconds;
    if !value.is_finite() || value <= 0.0 {
        return Err(InvalidParameter::new(word, value, "time must be > 0 seconds"));
    }
    if value > max {
        return Err(InvalidParameter::new(word, value, "time exceeds maxDelaySeconds"));
    }
    Ok(value)
}

fn samples(seconds: f64, sample_rate: f64) -> usize {
    ((seconds * sample_rate).round() as usize).max(1)
}

fn compile_unit(
    ctx: &AudioContext,
    kind: UnitKind,
    init: Option<f64>,
) -> Result<UnitState, InvalidParameter> {
    let sr = ctx.sample_rate();
    let state = match kind {
        UnitKind::Add | UnitKind::Sub | UnitKind::Mul | UnitKind::Div => UnitState::Arith(kind),
        UnitKind::Param => UnitState::Param,
        UnitKind::Sine => UnitState::Oscillator(Oscillator::new(Waveform::Sine, sr)),
        UnitKind::BlSaw => UnitState::Oscillator(Oscillator::new(Waveform::Sawtooth, sr)),
        UnitKind::BlSquare => UnitState::Oscillator(Oscillator::new(Waveform::Pulse, sr)),
        UnitKind::Delay => {
            let time = init_time(ctx, "delay", init)?;
            UnitState::Delay(DelayLine::new(sr, time, 0.0)?)
        }
        UnitKind::Allpass => {
            let loop_time = init_time(ctx, "allpass", init)?;
            let filter = AllpassFilter::new(samples(loop_time, sr), 0.0)?;
            UnitState::Allpass(Decaying::new(filter, loop_time))
        }
        UnitKind::Comb => {
            let loop_time = init_time(ctx, "comb", init)?;
            let filter = CombFilter::new(samples(loop_time, sr), 0.0)?;
            UnitState::Comb(Decaying::new(filter, loop_time))
        }
        UnitKind::JcRev => {
            let mut reverb = Reverb::new(sr)?;
            reverb.set_mix(1.0, 0)?;
            UnitState::JcRev(Box::new(reverb))
        }
        UnitKind::Tenv => UnitState::Tenv(TriggerEnvelope::new(sr)),
        UnitKind::Metro => UnitState::Metro(Metro::new(sr)),
    };
    Ok(state)
}

/// Compile a graph against an audio context.
///
/// Fails with `InvalidParameter` when an init-time argument is out of range
/// (a delay or loop time that is not positive or exceeds the configured
/// maximum).
pub fn compile(graph: &OpGraph, ctx: &AudioContext) -> Result<Program, SporthError> {
    let mut instrs = Vec::with_capacity(graph.nodes().len());
    for node in graph.nodes() {
        let instr = match *node {
            OpNode::Literal(n) => Instr::Push(n),
            OpNode::Stack(op) => Instr::Stack(op),
            OpNode::Unit(unit) => Instr::Unit(compile_unit(ctx, unit.kind, unit.init)?),
        };
        instrs.push(instr);
    }

    tracing::debug!(
        nodes = instrs.len(),
        outputs = graph.outputs(),
        max_depth = graph.max_depth(),
        "compiled operation graph"
    );

    Ok(Program {
        instrs,
        stack: Vec::with_capacity(graph.max_depth()),
        outputs: graph.outputs(),
        params: graph.params(),
    })
}

impl Program {
    /// Values left on the stack after each tick.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn params(&self) -> ParamUsage {
        self.params
    }

    /// Run every instruction once and return the final stack.
    ///
    /// `params` is the parameter vector read by `p`; indices outside it read 0.
    #[inline]
    pub fn tick(&mut self, params: &[f64; MAX_PARAMETERS]) -> &[f64] {
        let stack = &mut self.stack;
        stack.clear();

        for instr in &mut self.instrs {
            match instr {
                Instr::Push(n) => stack.push(*n),
                Instr::Stack(StackOp::Dup) => {
                    let top = stack.last().copied().unwrap_or(0.0);
                    stack.push(top);
                }
                Instr::Stack(StackOp::Swap) => {
                    let n = stack.len();
                    if n >= 2 {
                        stack.swap(n - 1, n - 2);
                    }
                }
                Instr::Stack(StackOp::Drop) => {
                    stack.pop();
                }
                Instr::Unit(unit) => run_unit(unit, stack, params),
            }
        }

        &self.stack
    }

    /// Restart periodic units from phase zero. Filter and delay memory is kept.
    pub fn retrigger(&mut self) {
        for instr in &mut self.instrs {
            match instr {
                Instr::Unit(UnitState::Oscillator(osc)) => osc.reset(),
                Instr::Unit(UnitState::Metro(metro)) => metro.reset(),
                _ => {}
            }
        }
    }

    /// Clear all unit state, as if freshly compiled.
    pub fn reset(&mut self) {
        for instr in &mut self.instrs {
            if let Instr::Unit(unit) = instr {
                match unit {
                    UnitState::Oscillator(osc) => osc.reset(),
                    UnitState::Delay(line) => line.reset(),
                    UnitState::Allpass(ap) => ap.filter.reset(),
                    UnitState::Comb(comb) => comb.filter.reset(),
                    UnitState::JcRev(reverb) => reverb.reset(),
                    UnitState::Tenv(env) => env.reset(),
                    UnitState::Metro(metro) => metro.reset(),
                    UnitState::Arith(_) | UnitState::Param => {}
                }
            }
        }
    }
}

#[inline]
fn run_unit(unit: &mut UnitState, stack: &mut Vec<f64>, params: &[f64; MAX_PARAMETERS]) {
    match unit {
        UnitState::Arith(kind) => {
            let b = pop(stack);
            let a = pop(stack);
            stack.push(kind.apply_arithmetic(a, b));
        }
        UnitState::Param => {
            let index = pop(stack);
            let value = if index >= 0.0 && (index as usize) < MAX_PARAMETERS {
                params[index as usize]
            } else {
                0.0
            };
            stack.push(value);
        }
        UnitState::Oscillator(osc) => {
            if osc.waveform == Waveform::Pulse {
                osc.pulse_width = clamp_pulse_width(pop(stack));
            }
            let amp = pop(stack);
            osc.frequency = pop(stack);
            stack.push(osc.step() * amp);
        }
        UnitState::Delay(line) => {
            pop(stack); // time, fixed at compile time
            line.set_feedback_clamped(pop(stack));
            let input = pop(stack);
            stack.push(line.step(input));
        }
        UnitState::Allpass(ap) => {
            pop(stack);
            let decay = pop(stack);
            if let Some(gain) = ap.retune(decay) {
                ap.filter.set_gain_clamped(gain);
            }
            let input = pop(stack);
            stack.push(ap.filter.step(input));
        }
        UnitState::Comb(comb) => {
            pop(stack);
            let decay = pop(stack);
            if let Some(gain) = comb.retune(decay) {
                comb.filter.set_gain_clamped(gain);
            }
            let input = pop(stack);
            stack.push(comb.filter.step(input));
        }
        UnitState::JcRev(reverb) => {
            let input = pop(stack);
            let (left, right) = reverb.process_mono(input);
            stack.push(left);
            stack.push(right);
        }
        UnitState::Tenv(env) => {
            env.release = pop(stack);
            env.hold = pop(stack);
            env.attack = pop(stack);
            let trigger = pop(stack);
            stack.push(env.step(trigger));
        }
        UnitState::Metro(metro) => {
            let freq = pop(stack);
            stack.push(metro.step(freq));
        }
    }
}
