use crate::error::ParseError;
use crate::token::{Span, Spanned, Token};

pub struct Lexer {
    chars: Vec<char>,
    /// Precomputed byte offset for each char index.
    /// `byte_offsets[i]` = byte offset of `chars[i]` in the original `&str`.
    /// `byte_offsets[chars.len()]` = total byte length (sentinel for EOF).
    byte_offsets: Vec<usize>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let mut byte_offsets = Vec::with_capacity(chars.len() + 1);
        let mut offset = 0;
        for ch in &chars {
            byte_offsets.push(offset);
            offset += ch.len_utf8();
        }
        byte_offsets.push(offset);
        Lexer {
            chars,
            byte_offsets,
            pos: 0,
        }
    }

    /// Split the input into tokens. The last token is always `Token::EOF`.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let is_eof = spanned.token == Token::EOF;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Skip whitespace and `#` comments.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek_at(0) {
            if ch.is_whitespace() {
                self.pos += 1;
            } else if ch == '#' {
                while self.peek_at(0).is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn byte_pos_of(&self, char_idx: usize) -> usize {
        self.byte_offsets[char_idx.min(self.chars.len())]
    }

    fn span_from(&self, start: usize) -> Span {
        Span {
            start: self.byte_pos_of(start),
            end: self.byte_pos_of(self.pos),
        }
    }

    fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_trivia();

        let start = self.pos;
        let Some(ch) = self.peek_at(0) else {
            return Ok(Spanned {
                token: Token::EOF,
                span: self.span_from(start),
            });
        };

        if ch == '"' || ch == '\'' {
            self.pos += 1;
            return Err(ParseError::UnexpectedChar {
                ch,
                span: self.span_from(start),
            });
        }

        while self.peek_at(0).is_some_and(|c| !c.is_whitespace()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let span = self.span_from(start);

        if looks_numeric(&text) {
            let num = text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| ParseError::InvalidNumber { text: text.clone(), span })?;
            Ok(Spanned {
                token: Token::Number(num),
                span,
            })
        } else {
            Ok(Spanned {
                token: Token::Word(text),
                span,
            })
        }
    }
}

/// A word is numeric if it starts like a number: `4`, `.5`, `-2`, `+.5`.
fn looks_numeric(text: &str) -> bool {
    let rest = text.strip_prefix(['-', '+']).unwrap_or(text);
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}
