use std::fmt;

use miette::Result;

use crate::error;
use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Span};

pub mod cursor;

/// A 'light' token that only carries basic and easily derivable info
#[derive(Debug)]
pub struct LToken {
    pub kind: LTokenKind,
    pub len: u32,
}

impl LToken {
    pub fn new(kind: LTokenKind, len: u32) -> Self {
        LToken { kind, len }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    Num,
    /// Quoted with `'` or `"`
    Str { terminated: bool },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LTokenKind {
    Ident,
    Lit(LiteralKind),
    Colon,
    Comma,
    Comment,
    Whitespace,
    Newline,
    Unknown,
    Eof,
}

/// Token handed to the parser. Numbers are already converted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-based source line
    pub line: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Ident,
    Num(u32),
    /// Quoted text; the span includes the quotes
    Str,
    Colon,
    Comma,
    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Num(_) => "number",
            TokenKind::Str => "string",
            TokenKind::Colon => "colon",
            TokenKind::Comma => "comma",
            TokenKind::Newline => "end of line",
            TokenKind::Eof => "end of file",
        };
        f.write_str(name)
    }
}

/// Not used in parsing, handy when debugging the lexer.
#[cfg(test)]
pub fn tokenize(input: &str) -> impl Iterator<Item = LToken> + '_ {
    let mut cursor = Cursor::new(input);
    std::iter::from_fn(move || {
        let token = cursor.advance_token();
        if token.kind != LTokenKind::Eof {
            Some(token)
        } else {
            None
        }
    })
}

/// Newlines are significant, so they are not whitespace here.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

pub(crate) fn is_id_start(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_' | '.' | '?' | '@')
}

pub(crate) fn is_id(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

/// Why a numeric literal could not be converted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum NumError {
    Invalid,
    TooLarge,
}

/// Convert the text of a numeric literal.
///
/// Accepts decimal, `0x` and/or trailing `h` for hex, trailing `b` for binary and
/// trailing `o`/`q` for octal. Case does not matter.
pub(crate) fn parse_num(text: &str) -> Result<u32, NumError> {
    let lower = text.to_ascii_lowercase();
    let (body, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest.strip_suffix('h').unwrap_or(rest), 16)
    } else if let Some(rest) = lower.strip_suffix('h') {
        (rest, 16)
    } else if let Some(rest) = lower.strip_suffix('b') {
        (rest, 2)
    } else if let Some(rest) = lower.strip_suffix(['o', 'q']) {
        (rest, 8)
    } else {
        (lower.as_str(), 10)
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return Err(NumError::Invalid);
    }
    u32::from_str_radix(body, radix).map_err(|_| NumError::TooLarge)
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> LToken {
        let first_char = match self.bump() {
            Some(c) => c,
            None => return LToken::new(LTokenKind::Eof, 0),
        };
        let token_kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                LTokenKind::Comment
            }
            '\n' => LTokenKind::Newline,
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                LTokenKind::Whitespace
            }
            ',' => LTokenKind::Comma,
            ':' => LTokenKind::Colon,
            // Hex literals like `0FFh` start with a digit, so anything alphanumeric
            // following a digit is part of the literal.
            c if c.is_ascii_digit() => {
                self.take_while(|c| c.is_ascii_alphanumeric());
                LTokenKind::Lit(LiteralKind::Num)
            }
            c if is_id_start(c) => {
                self.take_while(is_id);
                LTokenKind::Ident
            }
            quote @ ('\'' | '"') => {
                self.take_while(|c| c != quote && c != '\n');
                let terminated = self.first() == quote;
                if terminated {
                    self.bump();
                }
                LTokenKind::Lit(LiteralKind::Str { terminated })
            }
            _ => LTokenKind::Unknown,
        };
        let res = LToken::new(token_kind, self.pos_in_token());
        self.reset_pos();
        res
    }

    /// Next token that matters to the parser, skipping whitespace and comments.
    pub fn advance_real(&mut self) -> Result<Token> {
        loop {
            let start = self.abs_pos();
            let line = self.line;
            let token = self.advance_token();
            let len = token.len.min(u16::MAX as u32) as u16;
            let span = Span::new(Idx(start as u32), len);

            let kind = match token.kind {
                LTokenKind::Whitespace | LTokenKind::Comment => continue,
                LTokenKind::Newline => {
                    self.line += 1;
                    TokenKind::Newline
                }
                LTokenKind::Ident => TokenKind::Ident,
                LTokenKind::Colon => TokenKind::Colon,
                LTokenKind::Comma => TokenKind::Comma,
                LTokenKind::Lit(LiteralKind::Num) => {
                    let text = self.get_range(span.as_range());
                    match parse_num(text) {
                        Ok(val) => TokenKind::Num(val),
                        // Wider than any operand
                        Err(NumError::TooLarge) => {
                            return Err(error::asm_literal_range(span, self.src(), line, text, 16))
                        }
                        Err(NumError::Invalid) => {
                            return Err(error::lex_invalid_lit(span, self.src(), line))
                        }
                    }
                }
                LTokenKind::Lit(LiteralKind::Str { terminated }) => {
                    if !terminated {
                        return Err(error::lex_unclosed_str(span, self.src(), line));
                    }
                    TokenKind::Str
                }
                LTokenKind::Unknown => return Err(error::lex_unknown(span, self.src(), line)),
                LTokenKind::Eof => TokenKind::Eof,
            };
            return Ok(Token { kind, span, line });
        }
    }
}
