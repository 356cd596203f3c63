//! Parsed operation graph: the validated, host-independent form of a token string.

use serde::Serialize;

use crate::error::ArityError;
use crate::token::number_to_string;
use crate::units::UnitKind;

/// Reserved stack operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackOp {
    /// `a -> a a`
    Dup,
    /// `a b -> b a`
    Swap,
    /// `a ->`
    Drop,
}

impl StackOp {
    pub fn lookup(word: &str) -> Option<StackOp> {
        match word {
            "dup" => Some(StackOp::Dup),
            "swap" => Some(StackOp::Swap),
            "drop" => Some(StackOp::Drop),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StackOp::Dup => "dup",
            StackOp::Swap => "swap",
            StackOp::Drop => "drop",
        }
    }

    pub fn inputs(self) -> usize {
        match self {
            StackOp::Dup | StackOp::Drop => 1,
            StackOp::Swap => 2,
        }
    }

    pub fn outputs(self) -> usize {
        match self {
            StackOp::Dup | StackOp::Swap => 2,
            StackOp::Drop => 0,
        }
    }
}

/// A unit generator occurrence in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitNode {
    pub kind: UnitKind,
    /// Value of the init-time input, resolved while parsing.
    pub init: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OpNode {
    Literal(f64),
    Stack(StackOp),
    Unit(UnitNode),
}

impl OpNode {
    pub fn inputs(&self) -> usize {
        match self {
            OpNode::Literal(_) => 0,
            OpNode::Stack(op) => op.inputs(),
            OpNode::Unit(unit) => unit.kind.inputs(),
        }
    }

    pub fn outputs(&self) -> usize {
        match self {
            OpNode::Literal(_) => 1,
            OpNode::Stack(op) => op.outputs(),
            OpNode::Unit(unit) => unit.kind.outputs(),
        }
    }

    pub fn to_source(&self) -> String {
        match self {
            OpNode::Literal(n) => number_to_string(*n),
            OpNode::Stack(op) => op.name().to_string(),
            OpNode::Unit(unit) => unit.kind.name().to_string(),
        }
    }
}

/// How a graph addresses the parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ParamUsage {
    /// Highest slot read through a constant `p` index.
    pub highest: Option<usize>,
    /// Some `p` reads a computed index.
    pub dynamic: bool,
}

impl ParamUsage {
    /// Number of parameter slots the graph needs, when it can be known statically.
    pub fn expected_count(&self) -> Option<usize> {
        if self.dynamic {
            None
        } else {
            Some(self.highest.map_or(0, |h| h + 1))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpGraph {
    pub(crate) nodes: Vec<OpNode>,
    /// Stack depth after a full tick.
    pub(crate) outputs: usize,
    /// Deepest the working stack gets during a tick.
    pub(crate) max_depth: usize,
    pub(crate) params: ParamUsage,
}

impl PartialEq for OpGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl OpGraph {
    pub fn nodes(&self) -> &[OpNode] {
        &self.nodes
    }

    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn params(&self) -> ParamUsage {
        self.params
    }

    /// Check that a tick leaves exactly `channels` values on the stack.
    pub fn expect_outputs(&self, channels: usize) -> Result<(), ArityError> {
        if self.outputs != channels {
            return Err(ArityError::OutputMismatch {
                expected: channels,
                found: self.outputs,
            });
        }
        Ok(())
    }

    /// `(inputs, outputs)` for every node, in execution order.
    pub fn arity_sequence(&self) -> Vec<(usize, usize)> {
        self.nodes.iter().map(|n| (n.inputs(), n.outputs())).collect()
    }

    /// Render the graph back to a token string that parses to an equal graph.
    pub fn to_source(&self) -> String {
        self.nodes
            .iter()
            .map(OpNode::to_source)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            source: self.to_source(),
            nodes: self.nodes.len(),
            outputs: self.outputs,
            max_depth: self.max_depth,
            parameters: self.params.expected_count(),
        }
    }
}

/// Compact description of a graph for tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub source: String,
    pub nodes: usize,
    pub outputs: usize,
    pub max_depth: usize,
    pub parameters: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_op_arities() {
        assert_eq!((StackOp::Dup.inputs(), StackOp::Dup.outputs()), (1, 2));
        assert_eq!((StackOp::Swap.inputs(), StackOp::Swap.outputs()), (2, 2));
        assert_eq!((StackOp::Drop.inputs(), StackOp::Drop.outputs()), (1, 0));
    }

    #[test]
    fn expected_parameter_count() {
        let none = ParamUsage::default();
        assert_eq!(none.expected_count(), Some(0));
        let fixed = ParamUsage {
            highest: Some(2),
            dynamic: false,
        };
        assert_eq!(fixed.expected_count(), Some(3));
        let dynamic = ParamUsage {
            highest: Some(2),
            dynamic: true,
        };
        assert_eq!(dynamic.expected_count(), None);
    }

    #[test]
    fn source_joins_nodes() {
        let graph = OpGraph {
            nodes: vec![
                OpNode::Literal(440.0),
                OpNode::Literal(0.5),
                OpNode::Unit(UnitNode {
                    kind: UnitKind::Sine,
                    init: None,
                }),
                OpNode::Stack(StackOp::Dup),
            ],
            outputs: 2,
            max_depth: 2,
            params: ParamUsage::default(),
        };
        assert_eq!(graph.to_source(), "440 0.5 sine dup");
        assert_eq!(graph.arity_sequence(), vec![(0, 1), (0, 1), (2, 1), (1, 2)]);
        assert!(graph.expect_outputs(2).is_ok());
        assert_eq!(
            graph.expect_outputs(1),
            Err(ArityError::OutputMismatch {
                expected: 1,
                found: 2
            })
        );
    }
}
