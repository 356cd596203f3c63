//! Offline renderer: runs a generator block by block into a stereo buffer.

use crate::config::EngineConfig;
use crate::dsp::engine::AudioContext;
use crate::error::SporthError;
use crate::generator::OperationGenerator;

/// Rendered stereo audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    pub fn with_frames(frames: usize) -> Self {
        StereoBuffer {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    /// Interleave as `L R L R ...`.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.left.len() * 2);
        for (&l, &r) in self.left.iter().zip(&self.right) {
            out.push(l);
            out.push(r);
        }
        out
    }
}

/// Render `frames` frames, advancing the context clock one block at a time.
pub fn render(generator: &mut OperationGenerator, ctx: &mut AudioContext, frames: usize) -> StereoBuffer {
    let mut buffer = StereoBuffer::with_frames(frames);
    let block = ctx.block_size();
    let mut start = 0;
    while start < frames {
        let end = (start + block).min(frames);
        generator.process(ctx, &mut buffer.left[start..end], &mut buffer.right[start..end]);
        ctx.advance(end - start);
        start = end;
    }
    buffer
}

/// Parse, compile and render a two-channel token string in one go.
pub fn render_sporth(source: &str, config: EngineConfig, frames: usize) -> Result<StereoBuffer, SporthError> {
    let mut ctx = AudioContext::new(config)?;
    let (mut generator, _handle) = OperationGenerator::from_sporth(&ctx, source, false)?;
    Ok(render(&mut generator, &mut ctx, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_requested_length() {
        let config = EngineConfig {
            block_size: 64,
            ..Default::default()
        };
        let buffer = render_sporth("0.25 -0.25", config, 1000).unwrap();
        assert_eq!(buffer.frames(), 1000);
        assert!(buffer.left.iter().all(|&s| s == 0.25));
        assert!(buffer.right.iter().all(|&s| s == -0.25));
    }

    #[test]
    fn interleaves_left_first() {
        let buffer = StereoBuffer {
            left: vec![1.0, 2.0],
            right: vec![-1.0, -2.0],
        };
        assert_eq!(buffer.interleaved(), vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn clock_tracks_rendered_frames() {
        let mut ctx = AudioContext::with_sample_rate(48000.0).unwrap();
        let (mut generator, _handle) = OperationGenerator::from_sporth(&ctx, "0 dup", false).unwrap();
        render(&mut generator, &mut ctx, 1500);
        assert_eq!(ctx.now(), 1500);
    }

    #[test]
    fn rendering_is_deterministic() {
        let source = "4 metro 0.01 0.1 0.3 tenv 220 0.4 0.3 blsquare * jcrev";
        let a = render_sporth(source, EngineConfig::default(), 4096).unwrap();
        let b = render_sporth(source, EngineConfig::default(), 4096).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_errors_surface() {
        assert!(matches!(
            render_sporth("1 nope", EngineConfig::default(), 16),
            Err(SporthError::Parse(_))
        ));
    }
}
