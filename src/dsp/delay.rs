//! Delay line with feedback.

use crate::error::InvalidParameter;

/// A mono delay line: `y[n] = x[n - D] + feedback * y[n - D]`.
///
/// The buffer holds exactly `D` samples. Each step reads the oldest sample
/// and writes the new one at the same index, so the write position always
/// trails the read position by the configured delay.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f64>,
    write_pos: usize,
    /// `None` for lines built directly in samples.
    sample_rate: Option<f64>,
    delay_time: f64,
    feedback: f64,
}

impl DelayLine {
    /// Create a delay line.
    ///
    /// # Arguments
    /// - `sample_rate`: Audio sample rate in Hz.
    /// - `delay_time`: Delay time in seconds (> 0).
    /// - `feedback`: Feedback gain in [0, 1).
    pub fn new(sample_rate: f64, delay_time: f64, feedback: f64) -> Result<Self, InvalidParameter> {
        validate_delay_time(delay_time)?;
        validate_feedback(feedback)?;
        Ok(Self {
            buffer: vec![0.0; samples_for(delay_time, sample_rate)],
            write_pos: 0,
            sample_rate: Some(sample_rate),
            delay_time,
            feedback,
        })
    }

    /// Create a delay line measured in samples (at least 1). Such a line
    /// has no sample rate, so it cannot be reconfigured in seconds.
    pub fn with_samples(delay_samples: usize, feedback: f64) -> Result<Self, InvalidParameter> {
        validate_feedback(feedback)?;
        let len = delay_samples.max(1);
        Ok(Self {
            buffer: vec![0.0; len],
            write_pos: 0,
            sample_rate: None,
            delay_time: 0.0,
            feedback,
        })
    }

    /// Change delay time and feedback.
    ///
    /// A different delay length reallocates the buffer and clears it, which
    /// is audible as a short dropout. On error nothing changes, including
    /// for a line built with [`DelayLine::with_samples`].
    pub fn configure(&mut self, delay_time: f64, feedback: f64) -> Result<(), InvalidParameter> {
        validate_delay_time(delay_time)?;
        validate_feedback(feedback)?;
        let sample_rate = self.sample_rate.ok_or_else(|| {
            InvalidParameter::new("delayTime", delay_time, "line is measured in samples")
        })?;
        let len = samples_for(delay_time, sample_rate);
        if len != self.buffer.len() {
            self.buffer = vec![0.0; len];
            self.write_pos = 0;
        }
        self.delay_time = delay_time;
        self.feedback = feedback;
        Ok(())
    }

    /// Set the feedback gain, keeping the previous value on error.
    pub fn set_feedback(&mut self, feedback: f64) -> Result<(), InvalidParameter> {
        validate_feedback(feedback)?;
        self.feedback = feedback;
        Ok(())
    }

    /// Set the feedback from a signal, clamping into [0, 1).
    #[inline]
    pub fn set_feedback_clamped(&mut self, feedback: f64) {
        self.feedback = if feedback.is_finite() {
            feedback.clamp(0.0, MAX_FEEDBACK)
        } else {
            0.0
        };
    }

    /// Process one sample.
    #[inline]
    pub fn step(&mut self, input: f64) -> f64 {
        let delayed = self.buffer[self.write_pos];
        self.buffer[self.write_pos] = input + delayed * self.feedback;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
        delayed
    }

    /// Process a block of audio in-place.
    pub fn process_block(&mut self, samples: &mut [f64]) {
        for s in samples.iter_mut() {
            *s = self.step(*s);
        }
    }

    /// Clear the delay buffer.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    pub fn delay_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn delay_time(&self) -> f64 {
        self.delay_time
    }

    pub fn feedback(&self) -> f64 {
        self.feedback
    }
}

/// Largest feedback a signal-driven delay is allowed to reach.
const MAX_FEEDBACK: f64 = 0.9999;

fn samples_for(delay_time: f64, sample_rate: f64) -> usize {
    ((delay_time * sample_rate).round() as usize).max(1)
}

fn validate_delay_time(delay_time: f64) -> Result<(), InvalidParameter> {
    if !delay_time.is_finite() || delay_time <= 0.0 {
        return Err(InvalidParameter::new("delayTime", delay_time, "must be > 0 seconds"));
    }
    Ok(())
}

fn validate_feedback(feedback: f64) -> Result<(), InvalidParameter> {
    if !feedback.is_finite() || !(0.0..1.0).contains(&feedback) {
        return Err(InvalidParameter::new("feedback", feedback, "must be in [0, 1)"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(delay: &mut DelayLine, len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| delay.step(if n == 0 { 1.0 } else { 0.0 }))
            .collect()
    }

    #[test]
    fn test_delay_length_is_rounded() {
        let delay = DelayLine::new(44100.0, 0.01, 0.0).unwrap();
        assert_eq!(delay.delay_samples(), 441);
        let delay = DelayLine::new(1000.0, 0.0104, 0.0).unwrap();
        assert_eq!(delay.delay_samples(), 10);
    }

    #[test]
    fn test_impulse_echoes_decay_geometrically() {
        let period = 10;
        for feedback in [0.0, 0.3, 0.5, 0.9] {
            let mut delay = DelayLine::new(1000.0, 0.01, feedback).unwrap();
            let out = impulse_response(&mut delay, period * 6);
            for (n, &y) in out.iter().enumerate() {
                if n > 0 && n % period == 0 {
                    let k = (n / period) as i32;
                    let expected = feedback.powi(k - 1);
                    assert!((y - expected).abs() < 1e-12, "n={n} y={y} expected={expected}");
                } else {
                    assert_eq!(y, 0.0, "n={n}");
                }
            }
        }
    }

    #[test]
    fn test_feedback_of_one_rejected() {
        assert!(DelayLine::new(44100.0, 0.5, 1.0).is_err());
        assert!(DelayLine::new(44100.0, 0.5, -0.1).is_err());
        assert!(DelayLine::new(44100.0, 0.0, 0.5).is_err());
        assert!(DelayLine::new(44100.0, -1.0, 0.5).is_err());
    }

    #[test]
    fn test_rejected_setter_keeps_previous_value() {
        let mut delay = DelayLine::new(1000.0, 0.01, 0.4).unwrap();
        let err = delay.set_feedback(1.5).unwrap_err();
        assert_eq!(err.name, "feedback");
        assert_eq!(delay.feedback(), 0.4);

        delay.set_feedback_clamped(3.0);
        assert!(delay.feedback() < 1.0);
        delay.set_feedback_clamped(f64::NAN);
        assert_eq!(delay.feedback(), 0.0);
        delay.set_feedback(0.4).unwrap();

        assert!(delay.configure(-1.0, 0.2).is_err());
        assert_eq!(delay.delay_samples(), 10);
        assert_eq!(delay.feedback(), 0.4);
    }

    #[test]
    fn test_resize_resets_state() {
        let mut delay = DelayLine::new(1000.0, 0.01, 0.5).unwrap();
        delay.step(1.0);
        delay.configure(0.02, 0.5).unwrap();
        assert_eq!(delay.delay_samples(), 20);
        let out = impulse_response(&mut delay, 21);
        assert_eq!(out[20], 1.0);
        assert!(out[..20].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_same_length_keeps_state() {
        let mut delay = DelayLine::new(1000.0, 0.01, 0.0).unwrap();
        delay.step(1.0);
        delay.configure(0.0101, 0.5).unwrap();
        let out: Vec<f64> = (0..10).map(|_| delay.step(0.0)).collect();
        assert_eq!(out[9], 1.0);
    }

    #[test]
    fn test_process_block_matches_step() {
        let mut a = DelayLine::with_samples(3, 0.5).unwrap();
        let mut b = a.clone();
        let mut block = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        a.process_block(&mut block);
        let stepped: Vec<f64> = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|&x| b.step(x))
            .collect();
        assert_eq!(block.to_vec(), stepped);
        assert_eq!(block[3], 1.0);
        assert_eq!(block[6], 0.5);
    }

    #[test]
    fn test_sample_measured_line_rejects_seconds() {
        let mut delay = DelayLine::with_samples(100, 0.0).unwrap();
        let err = delay.configure(0.5, 0.2).unwrap_err();
        assert_eq!(err.name, "delayTime");
        assert_eq!(delay.delay_samples(), 100);
        assert_eq!(delay.feedback(), 0.0);
    }
}
