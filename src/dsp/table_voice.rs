//! Wavetable voice: a table-lookup oscillator with rampable frequency,
//! amplitude and detuning.
//!
//! The waveform is fixed when the voice is built. Shape it on the control
//! side with [`TableOscillator::setup_waveform`] and
//! [`TableOscillator::set_waveform_value`], then hand the oscillator over.

use crate::dsp::engine::AudioContext;
use crate::dsp::oscillator::TableOscillator;
use crate::dsp::voice::{AMPLITUDE_SPEC, DETUNING_SPEC, FREQUENCY_SPEC, VoiceCore, VoiceHandle};
use crate::error::SporthError;
use crate::params::{ParamId, ParamSpec, ParameterTable};

const WAVETABLE_SPECS: &[ParamSpec] = &[FREQUENCY_SPEC, AMPLITUDE_SPEC, DETUNING_SPEC];

/// Name→index table for the wavetable voice. Ids match the square voice's
/// `FREQUENCY`, `AMPLITUDE` and `DETUNING`.
pub const WAVETABLE_PARAMETERS: ParameterTable = ParameterTable::new(WAVETABLE_SPECS);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavetableSettings {
    pub frequency: f64,
    pub amplitude: f64,
    pub detuning: f64,
}

impl Default for WavetableSettings {
    fn default() -> Self {
        WavetableSettings {
            frequency: FREQUENCY_SPEC.default,
            amplitude: AMPLITUDE_SPEC.default,
            detuning: DETUNING_SPEC.default,
        }
    }
}

/// Audio-thread side of the wavetable voice.
pub struct WavetableVoice {
    osc: TableOscillator,
    core: VoiceCore<3>,
}

impl WavetableVoice {
    /// Build a voice that plays `osc`'s table. The oscillator's own
    /// frequency, amplitude and detuning are replaced by `settings`.
    pub fn new(
        ctx: &AudioContext,
        mut osc: TableOscillator,
        settings: WavetableSettings,
    ) -> Result<(Self, VoiceHandle), SporthError> {
        let values = [settings.frequency, settings.amplitude, settings.detuning];
        let (core, handle, [frequency, amplitude, detuning]) =
            VoiceCore::new(ctx, WAVETABLE_PARAMETERS, values)?;
        osc.configure(frequency, amplitude, detuning)?;
        osc.reset();

        tracing::info!(
            frequency,
            amplitude,
            table_size = osc.table().len(),
            "created wavetable voice"
        );

        Ok((WavetableVoice { osc, core }, handle))
    }

    /// A voice over a copy of `waveform`, one cycle long.
    pub fn from_waveform(
        ctx: &AudioContext,
        waveform: &[f64],
        settings: WavetableSettings,
    ) -> Result<(Self, VoiceHandle), SporthError> {
        let osc = TableOscillator::from_table(ctx.sample_rate(), waveform)?;
        Self::new(ctx, osc, settings)
    }

    pub fn value(&self, id: ParamId) -> Option<f64> {
        self.core.value(id)
    }

    pub fn table(&self) -> &[f64] {
        self.osc.table()
    }

    pub fn process(&mut self, ctx: &AudioContext, left: &mut [f32], right: &mut [f32]) {
        if !self.core.begin_block(ctx, left, right) {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let [frequency, amplitude, detuning] = self.core.next_values();
            self.osc.set_unchecked(frequency, amplitude, detuning);
            let sample = self.osc.step() as f32;
            *l = sample;
            *r = sample;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::voice::{AMPLITUDE, DETUNING, FREQUENCY};
    use crate::params::ParameterChange;

    fn ctx(sample_rate: f64) -> AudioContext {
        AudioContext::with_sample_rate(sample_rate).unwrap()
    }

    fn block(voice: &mut WavetableVoice, ctx: &AudioContext, frames: usize) -> Vec<f32> {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        voice.process(ctx, &mut left, &mut right);
        assert_eq!(left, right);
        left
    }

    #[test]
    fn plays_the_table() {
        let ctx = ctx(8.0);
        let settings = WavetableSettings {
            frequency: 1.0,
            ..Default::default()
        };
        let (mut voice, _handle) =
            WavetableVoice::from_waveform(&ctx, &[0.0, 1.0, 0.0, -1.0], settings).unwrap();
        assert_eq!(
            block(&mut voice, &ctx, 8),
            vec![0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0, -0.5]
        );
    }

    #[test]
    fn table_shaped_before_construction() {
        let ctx = ctx(44100.0);
        let mut osc = TableOscillator::new(ctx.sample_rate(), 2).unwrap();
        osc.setup_waveform(4).unwrap();
        for (index, value) in [1.0, 1.0, -1.0, -1.0].into_iter().enumerate() {
            osc.set_waveform_value(value, index).unwrap();
        }
        let (voice, handle) = WavetableVoice::new(&ctx, osc, WavetableSettings::default()).unwrap();
        assert_eq!(voice.table(), &[1.0, 1.0, -1.0, -1.0]);
        assert_eq!(handle.resolve("detuning").unwrap(), DETUNING);
        assert!(handle.resolve("pulseWidth").is_err());
    }

    #[test]
    fn bad_waveform_or_settings_rejected() {
        let ctx = ctx(44100.0);
        assert!(matches!(
            WavetableVoice::from_waveform(&ctx, &[1.0], WavetableSettings::default()),
            Err(SporthError::InvalidParameter(_))
        ));
        assert!(WavetableVoice::from_waveform(&ctx, &[0.0, f64::NAN], WavetableSettings::default()).is_err());
        let settings = WavetableSettings {
            amplitude: -1.0,
            ..Default::default()
        };
        assert!(WavetableVoice::from_waveform(&ctx, &[0.0, 1.0], settings).is_err());
    }

    #[test]
    fn set_and_ramp_through_handle() {
        let ctx = ctx(44100.0);
        let (mut voice, mut handle) =
            WavetableVoice::new(&ctx, TableOscillator::sine(44100.0), WavetableSettings::default()).unwrap();
        handle.set(FREQUENCY, 220.0).unwrap();
        assert!(handle.set(FREQUENCY, 0.0).is_err());
        block(&mut voice, &ctx, 1);
        assert_eq!(voice.value(FREQUENCY), Some(220.0));
        assert_eq!(
            handle.poll_change(),
            Some(ParameterChange {
                index: 0,
                value: 220.0
            })
        );

        handle.ramp(AMPLITUDE, 0.0).unwrap();
        let ramp = ctx.ramp_samples();
        let mut rendered = 0;
        while rendered < ramp {
            let frames = (ramp - rendered).min(ctx.block_size());
            block(&mut voice, &ctx, frames);
            rendered += frames;
        }
        assert_eq!(voice.value(AMPLITUDE), Some(0.0));
        assert!(block(&mut voice, &ctx, 64).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn repeated_stop_start_resumes_where_it_left_off() {
        let ctx = ctx(44100.0);
        let settings = WavetableSettings {
            frequency: 523.25,
            detuning: 3.0,
            ..Default::default()
        };
        let (mut reference, _handle) =
            WavetableVoice::new(&ctx, TableOscillator::sine(44100.0), settings).unwrap();
        let expected: Vec<f32> = (0..4).flat_map(|_| block(&mut reference, &ctx, 128)).collect();

        let (mut voice, handle) =
            WavetableVoice::new(&ctx, TableOscillator::sine(44100.0), settings).unwrap();
        let mut resumed = Vec::new();
        for _ in 0..4 {
            handle.stop();
            assert!(block(&mut voice, &ctx, 64).iter().all(|&s| s == 0.0));
            handle.start();
            resumed.extend(block(&mut voice, &ctx, 128));
        }
        assert_eq!(resumed, expected);
    }
}
