use std::iter::Peekable;
use std::vec::IntoIter;

use miette::Result;

use crate::air::{Air, AirStmt, AsmLine, Operand};
use crate::error;
use crate::lexer::{cursor::Cursor, Token, TokenKind};
use crate::opcodes::{LookupError, OPCODE_TABLE};
use crate::span::Span;
use crate::symbol::LabelDef;

/// One past the last addressable byte.
const ADDR_LIMIT: u32 = 0x10000;

/// Split the source into parser tokens. The last token is always `Eof`.
pub fn lex(src: &str) -> Result<Vec<Token>> {
    let mut res = Vec::new();
    let mut cur = Cursor::new(src);
    loop {
        let tok = cur.advance_real()?;
        res.push(tok);
        if tok.kind == TokenKind::Eof {
            break;
        }
    }
    Ok(res)
}

/// First pass: lays out the token stream as AIR and fills the label table.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    toks: Peekable<IntoIter<Token>>,
    /// Returned once the stream is exhausted
    eof: Token,
    air: Air<'a>,
    /// Address the next statement is placed at
    addr: u32,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        let toks = lex(src)?;
        // `lex` always ends in `Eof`
        let eof = toks[toks.len() - 1];
        Ok(AsmParser {
            src,
            toks: toks.into_iter().peekable(),
            eof,
            air: Air::new(src),
            addr: 0,
        })
    }

    fn get_span(&self, span: Span) -> &'a str {
        &self.src[span.as_range()]
    }

    fn next(&mut self) -> Token {
        self.toks.next().unwrap_or(self.eof)
    }

    /// Create AIR out of token stream
    pub fn parse(mut self) -> Result<Air<'a>> {
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => continue,
                TokenKind::Ident => self.parse_line(tok)?,
                other => {
                    return Err(error::asm_unexpected(
                        tok.span,
                        self.src,
                        tok.line,
                        "label, instruction or directive",
                        other,
                    ))
                }
            }
        }
        Ok(self.air)
    }

    /// Parse a line starting with `head`, which is a label or a mnemonic.
    fn parse_line(&mut self, mut head: Token) -> Result<()> {
        while self.toks.peek().map(|tok| tok.kind) == Some(TokenKind::Colon) {
            self.next();
            self.define_label(head)?;
            let tok = self.next();
            match tok.kind {
                TokenKind::Ident => head = tok,
                TokenKind::Newline | TokenKind::Eof => return Ok(()),
                other => {
                    return Err(error::asm_unexpected(
                        tok.span,
                        self.src,
                        tok.line,
                        "instruction or directive",
                        other,
                    ))
                }
            }
        }
        let operands = self.parse_operands()?;
        self.parse_stmt(head, operands)
    }

    fn define_label(&mut self, tok: Token) -> Result<()> {
        let name = self.get_span(tok.span);
        // A label after the last byte of memory has no address
        if self.addr >= ADDR_LIMIT {
            return Err(error::asm_overflow(tok.span, self.src, tok.line));
        }
        let def = LabelDef {
            addr: self.addr as u16,
            line: tok.line,
            span: tok.span,
        };
        match self.air.add_label(name, def) {
            Ok(()) => Ok(()),
            Err(first) => Err(error::asm_duplicate_label(
                tok.span, first.span, self.src, tok.line, first.line,
            )),
        }
    }

    /// Comma separated operands up to the end of the line.
    fn parse_operands(&mut self) -> Result<Vec<Operand>> {
        let mut operands = Vec::new();
        let tok = self.next();
        if matches!(tok.kind, TokenKind::Newline | TokenKind::Eof) {
            return Ok(operands);
        }
        operands.push(self.parse_operand(tok)?);
        loop {
            let tok = self.next();
            match tok.kind {
                TokenKind::Newline | TokenKind::Eof => break,
                TokenKind::Comma => {
                    let tok = self.next();
                    operands.push(self.parse_operand(tok)?);
                }
                other => {
                    return Err(error::asm_unexpected(
                        tok.span,
                        self.src,
                        tok.line,
                        "comma or end of line",
                        other,
                    ))
                }
            }
        }
        Ok(operands)
    }

    fn parse_operand(&self, tok: Token) -> Result<Operand> {
        match tok.kind {
            TokenKind::Ident => Ok(Operand::Ident(
                self.get_span(tok.span).to_string(),
                tok.span,
            )),
            TokenKind::Num(val) => Ok(Operand::Num(val, tok.span)),
            TokenKind::Str => {
                let raw = self.get_span(tok.span);
                // Strip quotes
                let bytes = raw.as_bytes()[1..raw.len() - 1].to_vec();
                match bytes.as_slice() {
                    [ch] => Ok(Operand::Char(*ch, tok.span)),
                    _ => Ok(Operand::Str(bytes, tok.span)),
                }
            }
            other => Err(error::asm_unexpected(
                tok.span,
                self.src,
                tok.line,
                "operand",
                other,
            )),
        }
    }

    fn parse_stmt(&mut self, head: Token, operands: Vec<Operand>) -> Result<()> {
        let name = self.get_span(head.span);
        let line = head.line;
        let span = operands
            .last()
            .map_or(head.span, |last| head.span.join(last.span()));
        let bad_operands = || error::asm_bad_operands(span, self.src, line, name);

        let (stmt, len) = match name.to_ascii_uppercase().as_str() {
            "ORG" => {
                let (target, target_span) = match operands.as_slice() {
                    [Operand::Num(val, span)] => (*val, *span),
                    _ => return Err(bad_operands()),
                };
                if target >= ADDR_LIMIT {
                    return Err(error::asm_literal_range(target_span, self.src, line, target, 16));
                }
                if target < self.addr {
                    return Err(error::asm_orig_backwards(span, self.src, line, target, self.addr));
                }
                self.addr = target;
                return Ok(());
            }
            "DS" => match operands.as_slice() {
                [Operand::Num(len, len_span)] => {
                    if *len >= ADDR_LIMIT {
                        return Err(error::asm_literal_range(*len_span, self.src, line, *len, 16));
                    }
                    (AirStmt::Space(*len as u16), *len)
                }
                _ => return Err(bad_operands()),
            },
            "DB" => {
                if operands.is_empty() {
                    return Err(bad_operands());
                }
                let len = operands
                    .iter()
                    .map(|operand| match operand {
                        Operand::Str(bytes, _) => bytes.len() as u32,
                        _ => 1,
                    })
                    .sum();
                (AirStmt::Bytes(operands), len)
            }
            "DW" => {
                if operands.is_empty() || operands.iter().any(|op| matches!(op, Operand::Str(..))) {
                    return Err(bad_operands());
                }
                let len = 2 * operands.len() as u32;
                (AirStmt::Words(operands), len)
            }
            _ => {
                let info = match OPCODE_TABLE.lookup(name, &operands) {
                    Ok(info) => info,
                    Err(LookupError::UnknownMnemonic) => {
                        return Err(error::asm_unknown_mnemonic(head.span, self.src, line, name))
                    }
                    Err(LookupError::BadOperands) => return Err(bad_operands()),
                };
                // At most one operand is encoded after the opcode
                let operand = operands
                    .into_iter()
                    .zip(&info.args)
                    .find(|(_, arg)| arg.width() > 0)
                    .map(|(operand, _)| operand);
                let stmt = AirStmt::Instr {
                    opcode: info.opcode,
                    operand,
                };
                (stmt, info.len as u32)
            }
        };

        if self.addr + len > ADDR_LIMIT {
            return Err(error::asm_overflow(span, self.src, line));
        }
        self.air.add_stmt(AsmLine {
            line,
            addr: self.addr as u16,
            span,
            stmt,
        });
        self.addr += len;
        Ok(())
    }
}
