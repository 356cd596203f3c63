//! Triggered attack/hold/release envelope.

/// Envelope stages.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Hold,
    Release,
}

/// Attack/hold/release envelope started by a trigger signal.
///
/// A trigger is a rising edge: the input goes above zero after having been
/// at or below zero. Each trigger restarts the envelope from zero.
#[derive(Debug, Clone)]
pub struct TriggerEnvelope {
    /// Attack time in seconds.
    pub attack: f64,
    /// Hold time in seconds.
    pub hold: f64,
    /// Release time in seconds.
    pub release: f64,

    stage: Stage,
    level: f64,
    sample_rate: f64,
    stage_samples: usize,
    stage_counter: usize,
    last_trigger: f64,
}

impl TriggerEnvelope {
    pub fn new(sample_rate: f64) -> Self {
        TriggerEnvelope {
            attack: 0.01,
            hold: 0.1,
            release: 0.2,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            stage_samples: 0,
            stage_counter: 0,
            last_trigger: 0.0,
        }
    }

    fn samples(&self, seconds: f64) -> usize {
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.sample_rate) as usize
        } else {
            0
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.stage_counter = 0;
        self.stage_samples = match stage {
            Stage::Idle => 0,
            Stage::Attack => self.samples(self.attack),
            Stage::Hold => self.samples(self.hold),
            Stage::Release => self.samples(self.release),
        };
    }

    /// Restart from zero.
    pub fn trigger(&mut self) {
        self.level = 0.0;
        self.enter(Stage::Attack);
    }

    /// Advance one sample, watching `trigger` for rising edges.
    #[inline]
    pub fn step(&mut self, trigger: f64) -> f64 {
        if trigger > 0.0 && self.last_trigger <= 0.0 {
            self.trigger();
        }
        self.last_trigger = trigger;

        // Zero-length stages fall through within the same sample.
        loop {
            match self.stage {
                Stage::Idle => {
                    self.level = 0.0;
                    return 0.0;
                }
                Stage::Attack | Stage::Hold | Stage::Release
                    if self.stage_counter >= self.stage_samples =>
                {
                    let next = match self.stage {
                        Stage::Attack => {
                            self.level = 1.0;
                            Stage::Hold
                        }
                        Stage::Hold => Stage::Release,
                        _ => Stage::Idle,
                    };
                    self.enter(next);
                }
                Stage::Attack => {
                    self.level = self.stage_counter as f64 / self.stage_samples as f64;
                    break;
                }
                Stage::Hold => {
                    self.level = 1.0;
                    break;
                }
                Stage::Release => {
                    self.level = 1.0 - self.stage_counter as f64 / self.stage_samples as f64;
                    break;
                }
            }
        }
        self.stage_counter += 1;
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.last_trigger = 0.0;
    }
}
