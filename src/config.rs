//! Engine configuration, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::dsp::ramp::DEFAULT_RAMP_MS;
use crate::error::{InvalidParameter, SporthError};

/// Settings shared by every generator running in one audio context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Largest block the host will ask for in one `process` call.
    pub block_size: usize,
    /// Parameter ramp duration in milliseconds.
    pub ramp_ms: f64,
    /// Slots in each control→audio ring buffer.
    pub control_queue_capacity: usize,
    /// Longest delay a `delay` unit may allocate, in seconds.
    pub max_delay_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            block_size: 512,
            ramp_ms: DEFAULT_RAMP_MS,
            control_queue_capacity: 64,
            max_delay_seconds: 10.0,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SporthError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_sample_rate(sample_rate: f64) -> Self {
        EngineConfig {
            sample_rate,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(InvalidParameter::new("sampleRate", self.sample_rate, "must be > 0 Hz"));
        }
        if self.block_size == 0 {
            return Err(InvalidParameter::new("blockSize", 0.0, "must be at least 1"));
        }
        if !self.ramp_ms.is_finite() || self.ramp_ms < 0.0 {
            return Err(InvalidParameter::new("rampMs", self.ramp_ms, "must be >= 0"));
        }
        if self.control_queue_capacity == 0 {
            return Err(InvalidParameter::new("controlQueueCapacity", 0.0, "must be at least 1"));
        }
        if !self.max_delay_seconds.is_finite() || self.max_delay_seconds <= 0.0 {
            return Err(InvalidParameter::new(
                "maxDelaySeconds",
                self.max_delay_seconds,
                "must be > 0 seconds",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.ramp_ms, 20.0);
    }

    #[test]
    fn camel_case_fields() {
        let config =
            EngineConfig::from_json(r#"{"sampleRate": 48000, "blockSize": 128, "rampMs": 5}"#)
                .unwrap();
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.block_size, 128);
        assert_eq!(config.ramp_ms, 5.0);
        assert_eq!(config.control_queue_capacity, 64);
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            EngineConfig::from_json("{ sampleRate: }"),
            Err(SporthError::Config(_))
        ));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"sampleRate": 0}"#),
            Err(SporthError::InvalidParameter(_))
        ));
        assert!(EngineConfig::from_json(r#"{"blockSize": 0}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"rampMs": -1}"#).is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        assert!(json.contains("\"controlQueueCapacity\":64"));
        assert!(json.contains("\"maxDelaySeconds\":10.0"));
    }
}
