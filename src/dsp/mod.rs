//! DSP primitives and runtime nodes.
//!
//! Everything here runs in `f64` and is driven one sample at a time by the
//! compiled program, the square-wave voice or the offline renderer.

pub mod delay;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod metro;
pub mod oscillator;
pub mod ramp;
pub mod renderer;
pub mod reverb;
pub mod table_voice;
pub mod voice;
