use crate::token::Span;
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::fmt;

#[derive(Debug)]
pub enum SporthError {
    Parse(ParseError),
    Arity(ArityError),
    InvalidParameter(InvalidParameter),
    Config(serde_json::Error),
    /// The control queue to the audio thread is full; the call was dropped.
    QueueFull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedChar { ch: char, span: Span },
    InvalidNumber { text: String, span: Span },
    UnknownWord { word: String, span: Span },
    /// An init-time argument (delay time, loop time) is not a constant.
    NonConstantArgument { word: String, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArityError {
    StackUnderflow {
        word: String,
        span: Span,
        needed: usize,
        available: usize,
    },
    OutputMismatch {
        expected: usize,
        found: usize,
    },
}

/// A parameter value rejected at its setter. The previous value is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidParameter {
    pub name: String,
    pub value: f64,
    pub reason: &'static str,
}

impl InvalidParameter {
    pub fn new(name: impl Into<String>, value: f64, reason: &'static str) -> Self {
        InvalidParameter {
            name: name.into(),
            value,
            reason,
        }
    }
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedChar { span, .. }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::UnknownWord { span, .. }
            | ParseError::NonConstantArgument { span, .. } => *span,
        }
    }
}

impl SporthError {
    /// Source location of the error, when it points into a token string.
    pub fn span(&self) -> Option<Span> {
        match self {
            SporthError::Parse(e) => Some(e.span()),
            SporthError::Arity(ArityError::StackUnderflow { span, .. }) => Some(*span),
            _ => None,
        }
    }
}

impl fmt::Display for SporthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SporthError::Parse(e) => write!(f, "Parse error: {e}"),
            SporthError::Arity(e) => write!(f, "Arity error: {e}"),
            SporthError::InvalidParameter(e) => write!(f, "Invalid parameter: {e}"),
            SporthError::Config(e) => write!(f, "Config error: {e}"),
            SporthError::QueueFull => write!(f, "Control queue is full"),
        }
    }
}

impl std::error::Error for SporthError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedChar { ch, span } => {
                write!(f, "Unexpected char '{ch}' at pos {}", span.start)
            }
            ParseError::InvalidNumber { text, span } => {
                write!(f, "Invalid number '{text}' at pos {}", span.start)
            }
            ParseError::UnknownWord { word, span } => {
                write!(f, "Unknown word '{word}' at pos {}", span.start)
            }
            ParseError::NonConstantArgument { word, span } => {
                write!(f, "'{word}' at pos {} needs a constant init-time argument", span.start)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for ArityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityError::StackUnderflow {
                word,
                span,
                needed,
                available,
            } => write!(
                f,
                "'{word}' at pos {} needs {needed} values, stack has {available}",
                span.start
            ),
            ArityError::OutputMismatch { expected, found } => {
                write!(f, "expected {expected} output channels, stack holds {found}")
            }
        }
    }
}

impl std::error::Error for ArityError {}

impl fmt::Display for InvalidParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}: {}", self.name, self.value, self.reason)
    }
}

impl std::error::Error for InvalidParameter {}

impl From<ParseError> for SporthError {
    fn from(e: ParseError) -> Self {
        SporthError::Parse(e)
    }
}

impl From<ArityError> for SporthError {
    fn from(e: ArityError) -> Self {
        SporthError::Arity(e)
    }
}

impl From<InvalidParameter> for SporthError {
    fn from(e: InvalidParameter) -> Self {
        SporthError::InvalidParameter(e)
    }
}

impl From<serde_json::Error> for SporthError {
    fn from(e: serde_json::Error) -> Self {
        SporthError::Config(e)
    }
}

/// Render a human-readable diagnostic for `err` against the source it came from.
///
/// Errors without a location (config, parameter, output mismatch) are
/// labelled over the whole source.
pub fn report(name: &str, source: &str, err: &SporthError) -> String {
    let range = match err.span() {
        Some(span) => span.start..span.end,
        None => 0..source.len(),
    };
    let label = match err {
        SporthError::Parse(ParseError::UnknownWord { .. }) => "not a number, stack operator or unit",
        SporthError::Parse(ParseError::NonConstantArgument { .. }) => "argument is computed at run time",
        SporthError::Arity(ArityError::StackUnderflow { .. }) => "not enough values on the stack",
        _ => "here",
    };

    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, (name, range.clone()))
        .with_config(Config::default().with_color(false))
        .with_message(err.to_string())
        .with_label(Label::new((name, range)).with_message(label))
        .finish()
        .write((name, Source::from(source)), &mut out);

    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => err.to_string(),
    }
}
