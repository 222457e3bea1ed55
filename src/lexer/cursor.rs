// Modelled on `rustc_lexer` and cut down to what a line-oriented assembler needs.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

pub(crate) const EOF_CHAR: char = '\0';

/// Peekable iterator over a char sequence.
#[derive(Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    len_remaining: usize,
    chars: Chars<'a>,
    /// 1-based line of the next char
    pub(crate) line: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            src: input,
            len_remaining: input.len(),
            chars: input.chars(),
            line: 1,
        }
    }

    /// Peek the next char without consuming it, `EOF_CHAR` at the end.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Eats chars while `predicate` holds or until the end of input.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }

    /// Bytes consumed since the last `reset_pos`.
    pub fn pos_in_token(&self) -> u32 {
        (self.len_remaining - self.chars.as_str().len()) as u32
    }

    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
    }

    /// Offset of the cursor into the source.
    pub fn abs_pos(&self) -> usize {
        self.src.len() - self.chars.as_str().len()
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    pub fn get_range(&self, range: std::ops::Range<usize>) -> &'a str {
        &self.src[range]
    }
}
