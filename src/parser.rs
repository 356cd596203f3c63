use crate::error::{ArityError, InvalidParameter, ParseError, SporthError};
use crate::graph::{OpGraph, OpNode, ParamUsage, StackOp, UnitNode};
use crate::params::MAX_PARAMETERS;
use crate::token::{Span, Spanned, Token};
use crate::units::UnitKind;

/// Turns a token stream into a validated [`OpGraph`].
///
/// Parsing simulates the working stack once: every node's input arity is
/// checked against the current depth, constant values are tracked so
/// init-time arguments and `p` indices can be resolved, and the deepest
/// point is recorded so the executable stack can be preallocated.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Simulated stack; `Some` where the value is a compile-time constant.
    stack: Vec<Option<f64>>,
    max_depth: usize,
    params: ParamUsage,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            stack: Vec::new(),
            max_depth: 0,
            params: ParamUsage::default(),
        }
    }

    // ── Helpers ──────────────────────────────────────────────

    fn is_at_end(&self) -> bool {
        self.tokens
            .get(self.pos)
            .is_none_or(|s| matches!(s.token, Token::EOF))
    }

    fn advance(&mut self) -> Spanned {
        let s = self.tokens[self.pos].clone();
        self.pos += 1;
        s
    }

    fn require(&self, word: &str, span: Span, needed: usize) -> Result<(), ArityError> {
        if self.stack.len() < needed {
            return Err(ArityError::StackUnderflow {
                word: word.to_string(),
                span,
                needed,
                available: self.stack.len(),
            });
        }
        Ok(())
    }

    fn pop(&mut self) -> Option<f64> {
        self.stack.pop().flatten()
    }

    fn top(&self) -> Option<f64> {
        self.stack.last().copied().flatten()
    }

    // ── Graph ────────────────────────────────────────────────

    pub fn parse_graph(&mut self) -> Result<OpGraph, SporthError> {
        let mut nodes = Vec::new();

        while !self.is_at_end() {
            let Spanned { token, span } = self.advance();
            let node = match token {
                Token::Number(n) => {
                    self.stack.push(Some(n));
                    OpNode::Literal(n)
                }
                Token::Word(word) => self.parse_word(&word, span)?,
                Token::EOF => break,
            };
            nodes.push(node);
            self.max_depth = self.max_depth.max(self.stack.len());
        }

        Ok(OpGraph {
            nodes,
            outputs: self.stack.len(),
            max_depth: self.max_depth,
            params: self.params,
        })
    }

    fn parse_word(&mut self, word: &str, span: Span) -> Result<OpNode, SporthError> {
        if let Some(op) = StackOp::lookup(word) {
            self.require(word, span, op.inputs())?;
            self.apply_stack_op(op);
            return Ok(OpNode::Stack(op));
        }

        let Some(kind) = UnitKind::lookup(word) else {
            return Err(ParseError::UnknownWord {
                word: word.to_string(),
                span,
            }
            .into());
        };
        self.require(word, span, kind.inputs())?;

        let init = match kind.info().init_input {
            Some(_) => match self.top() {
                Some(value) => Some(value),
                None => {
                    return Err(ParseError::NonConstantArgument {
                        word: word.to_string(),
                        span,
                    }
                    .into());
                }
            },
            None => None,
        };

        if kind == UnitKind::Param {
            self.record_param(self.top())?;
        }

        if kind.is_arithmetic() {
            let b = self.pop();
            let a = self.pop();
            let folded = match (a, b) {
                (Some(a), Some(b)) => Some(kind.apply_arithmetic(a, b)),
                _ => None,
            };
            self.stack.push(folded);
        } else {
            for _ in 0..kind.inputs() {
                self.stack.pop();
            }
            for _ in 0..kind.outputs() {
                self.stack.push(None);
            }
        }

        Ok(OpNode::Unit(UnitNode { kind, init }))
    }

    fn apply_stack_op(&mut self, op: StackOp) {
        match op {
            StackOp::Dup => {
                let top = self.stack.last().copied().flatten();
                self.stack.push(top);
            }
            StackOp::Swap => {
                let n = self.stack.len();
                self.stack.swap(n - 1, n - 2);
            }
            StackOp::Drop => {
                self.stack.pop();
            }
        }
    }

    fn record_param(&mut self, index: Option<f64>) -> Result<(), InvalidParameter> {
        match index {
            Some(i) if i >= 0.0 && i.fract() == 0.0 && (i as usize) < MAX_PARAMETERS => {
                let i = i as usize;
                self.params.highest = Some(self.params.highest.map_or(i, |h| h.max(i)));
                Ok(())
            }
            Some(i) => Err(InvalidParameter::new("p", i, "parameter index out of range")),
            None => {
                self.params.dynamic = true;
                Ok(())
            }
        }
    }
}
