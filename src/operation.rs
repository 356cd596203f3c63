//! Operation composition: wraps user token strings into a complete stereo
//! program, optionally behind a trigger.
//!
//! A triggered program starts with [`TRIGGER_PREFIX`], which pushes the
//! trigger pulse twice (parameter slots 0 and 1). Each composed form then
//! hands one copy of the pulse to every user operation, so a triggered
//! operation is expected to consume one value from the stack.

use std::fmt;

/// Pushes the trigger pulse from slots 0 and 1.
pub const TRIGGER_PREFIX: &str = "0 p 1 p ";

/// Parameter slots taken by the trigger in triggered mode.
pub const TRIGGER_SLOTS: usize = 2;

/// A token string that leaves one signal on the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation(String);

/// A token string that leaves two signals on the stack, right channel
/// first and left channel on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StereoOperation(String);

impl Operation {
    pub fn new(source: impl Into<String>) -> Self {
        Operation(source.into())
    }

    pub fn source(&self) -> &str {
        &self.0
    }
}

impl StereoOperation {
    pub fn new(source: impl Into<String>) -> Self {
        StereoOperation(source.into())
    }

    pub fn source(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StereoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three ways an operation becomes a stereo program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationForm {
    /// One signal copied to both channels.
    Mono(Operation),
    Stereo(StereoOperation),
    /// Independent left and right signals.
    DualMono { left: Operation, right: Operation },
}

impl OperationForm {
    /// Build the token string for this form, without the trigger prefix.
    pub fn compose(&self, triggered: bool) -> String {
        match (self, triggered) {
            (OperationForm::Mono(op), false) => format!("{op} dup"),
            (OperationForm::Mono(op), true) => format!("{op} swap drop dup"),
            (OperationForm::Stereo(op), false) => format!("{op} swap"),
            (OperationForm::Stereo(op), true) => format!("drop {op} swap"),
            (OperationForm::DualMono { left, right }, false) => format!("{left} {right}"),
            (OperationForm::DualMono { left, right }, true) => format!("{left} swap {right}"),
        }
    }
}

/// Full program text for a user string, with the trigger prefix when needed.
pub fn program_source(sporth: &str, triggered: bool) -> String {
    if triggered {
        format!("{TRIGGER_PREFIX}{sporth}")
    } else {
        sporth.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(form: &OperationForm, triggered: bool) -> crate::graph::OpGraph {
        crate::parse(&program_source(&form.compose(triggered), triggered)).unwrap()
    }

    #[test]
    fn compose_strings() {
        let mono = OperationForm::Mono(Operation::new("440 0.5 sine"));
        assert_eq!(mono.compose(false), "440 0.5 sine dup");
        assert_eq!(mono.compose(true), "440 0.5 sine swap drop dup");

        let stereo = OperationForm::Stereo(StereoOperation::new("x"));
        assert_eq!(stereo.compose(false), "x swap");
        assert_eq!(stereo.compose(true), "drop x swap");

        let dual = OperationForm::DualMono {
            left: Operation::new("a"),
            right: Operation::new("b"),
        };
        assert_eq!(dual.compose(false), "a b");
        assert_eq!(dual.compose(true), "a swap b");
        assert_eq!(program_source("a", true), "0 p 1 p a");
    }

    #[test]
    fn every_form_yields_two_channels() {
        let forms = [
            (
                OperationForm::Mono(Operation::new("440 0.5 sine")),
                OperationForm::Mono(Operation::new("0.01 0.1 0.2 tenv 440 0.5 sine *")),
            ),
            (
                OperationForm::Stereo(StereoOperation::new("440 0.5 sine jcrev swap")),
                OperationForm::Stereo(StereoOperation::new("0.01 0.1 0.2 tenv jcrev swap")),
            ),
            (
                OperationForm::DualMono {
                    left: Operation::new("440 0.5 sine"),
                    right: Operation::new("660 0.5 sine"),
                },
                OperationForm::DualMono {
                    left: Operation::new("0.01 0.1 0.2 tenv"),
                    right: Operation::new("0.01 0.1 0.5 tenv"),
                },
            ),
        ];
        for (plain, triggered) in &forms {
            assert_eq!(graph(plain, false).outputs(), 2, "{plain:?}");
            assert_eq!(graph(triggered, true).outputs(), 2, "{triggered:?}");
        }
    }

    #[test]
    fn composed_source_round_trips() {
        let form = OperationForm::DualMono {
            left: Operation::new("0.01 0.1 0.2 tenv 2 p 0.5 0.25 blsquare *"),
            right: Operation::new("0.01 0.1 0.2 tenv 0.3 1.5e-1 delay"),
        };
        let first = graph(&form, true);
        let again = crate::parse(&first.to_source()).unwrap();
        assert_eq!(first, again);
        assert_eq!(again.outputs(), 2);
    }
}
