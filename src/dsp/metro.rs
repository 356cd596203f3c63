//! Metronome: a periodic trigger source.

/// Emits 1.0 on every tick where its phase wraps, 0.0 otherwise.
/// The very first tick after creation or reset always fires.
#[derive(Debug, Clone)]
pub struct Metro {
    phase: f64,
    sample_rate: f64,
}

impl Metro {
    pub fn new(sample_rate: f64) -> Self {
        Metro {
            phase: 1.0,
            sample_rate,
        }
    }

    /// Advance one tick at `frequency` Hz.
    #[inline]
    pub fn step(&mut self, frequency: f64) -> f64 {
        let fired = self.phase >= 1.0;
        if fired {
            self.phase = self.phase.fract();
        }
        if frequency.is_finite() && frequency > 0.0 {
            self.phase += frequency / self.sample_rate;
        }
        if fired { 1.0 } else { 0.0 }
    }

    pub fn reset(&mut self) {
        self.phase = 1.0;
    }
}
