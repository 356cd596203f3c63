#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal.
    Number(f64),
    /// Any other whitespace-delimited word: stack operators and unit names.
    Word(String),
    EOF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

/// Format a literal so that lexing the text yields the same `f64`.
pub fn number_to_string(n: f64) -> String {
    if n == (n as i64) as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Convert a token back to its source representation.
pub fn token_to_string(token: &Token) -> String {
    match token {
        Token::Number(n) => number_to_string(*n),
        Token::Word(s) => s.clone(),
        Token::EOF => "".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_print_without_fraction() {
        assert_eq!(token_to_string(&Token::Number(440.0)), "440");
        assert_eq!(token_to_string(&Token::Number(-3.0)), "-3");
    }

    #[test]
    fn fractions_round_trip() {
        for n in [0.1, 0.25, -0.001, 1.0e-7, 123.456] {
            let text = number_to_string(n);
            assert_eq!(text.parse::<f64>().unwrap(), n, "{text}");
        }
    }
}
