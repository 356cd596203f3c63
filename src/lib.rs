pub mod compiler;
pub mod config;
pub mod dsp;
pub mod error;
pub mod generator;
pub mod graph;
pub mod lexer;
pub mod operation;
pub mod params;
pub mod parser;
pub mod token;
pub mod units;

use crate::config::EngineConfig;
use crate::error::SporthError;
use crate::graph::OpGraph;
use crate::lexer::Lexer;
use crate::parser::Parser;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the sporth-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a token string into an `OpGraph`.
pub fn parse(input: &str) -> Result<OpGraph, SporthError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    parser.parse_graph()
}

/// Parse a token string and check that it leaves `channels` values on the stack.
pub fn parse_with_outputs(input: &str, channels: usize) -> Result<OpGraph, SporthError> {
    let graph = parse(input)?;
    graph.expect_outputs(channels)?;
    Ok(graph)
}

/// WASM-exposed: render a two-channel token string to interleaved stereo f32 samples.
#[wasm_bindgen]
pub fn render_sporth_samples(source: &str, sample_rate: u32, frames: usize) -> Result<Vec<f32>, JsValue> {
    let config = EngineConfig::with_sample_rate(sample_rate as f64);
    let buffer = dsp::renderer::render_sporth(source, config, frames)
        .map_err(|e| JsValue::from_str(&error::report("input", source, &e)))?;
    Ok(buffer.interleaved())
}

/// WASM-exposed: parse a token string and describe the resulting graph.
#[wasm_bindgen]
pub fn describe_sporth(source: &str) -> Result<JsValue, JsValue> {
    let graph = parse(source).map_err(|e| JsValue::from_str(&error::report("input", source, &e)))?;
    serde_wasm_bindgen::to_value(&graph.summary()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_outputs_checks_depth() {
        assert!(parse_with_outputs("440 dup", 2).is_ok());
        assert!(matches!(
            parse_with_outputs("440 dup", 1),
            Err(SporthError::Arity(_))
        ));
    }

    #[test]
    fn render_samples_interleaves() {
        let samples = render_sporth_samples("1 -1", 44100, 4).unwrap();
        assert_eq!(samples, vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
    }
}
