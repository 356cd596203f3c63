//! Audio context: the sample rate, block size and clock every node shares.
//!
//! Nothing in the crate reads a global sample rate; generators and voices
//! take an `AudioContext` at construction and again on every `process`.

use crate::config::EngineConfig;
use crate::dsp::ramp::Ramp;
use crate::error::InvalidParameter;

#[derive(Debug, Clone)]
pub struct AudioContext {
    config: EngineConfig,
    /// Frames rendered since creation.
    frame: u64,
}

impl AudioContext {
    pub fn new(config: EngineConfig) -> Result<Self, InvalidParameter> {
        config.validate()?;
        Ok(AudioContext { config, frame: 0 })
    }

    /// A context with default settings at `sample_rate`.
    pub fn with_sample_rate(sample_rate: f64) -> Result<Self, InvalidParameter> {
        Self::new(EngineConfig::with_sample_rate(sample_rate))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Ramp duration in samples (0 when ramps are disabled).
    pub fn ramp_samples(&self) -> usize {
        if self.config.ramp_ms == 0.0 {
            0
        } else {
            Ramp::samples_for(self.config.ramp_ms, self.config.sample_rate)
        }
    }

    /// Current position of the clock in frames.
    pub fn now(&self) -> u64 {
        self.frame
    }

    /// Current position of the clock in seconds.
    pub fn time(&self) -> f64 {
        self.frame as f64 / self.config.sample_rate
    }

    /// Move the clock forward after a block has been rendered.
    pub fn advance(&mut self, frames: usize) {
        self.frame += frames as u64;
    }
}
