use std::fmt;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::lexer::TokenKind;
use crate::span::Span;

// Lexer errors

pub fn lex_unclosed_str(span: Span, src: &str, line: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::unclosed_str",
        help = "close the literal with the same quote it was opened with, on the same line.",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an unterminated string literal on line {line}.",
    )
    .with_source_code(src.to_string())
}

pub fn lex_invalid_lit(span: Span, src: &str, line: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_lit",
        help = "numbers are decimal, hex with `0x` or a trailing `h`, or binary with a trailing `b`.",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid numeric literal on line {line}.",
    )
    .with_source_code(src.to_string())
}

pub fn lex_unknown(span: Span, src: &str, line: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::unknown",
        help = "expressions are not supported; operands are registers, labels or literals.",
        labels = vec![LabeledSpan::at(span, "unknown token")],
        "Encountered an unknown token on line {line}.",
    )
    .with_source_code(src.to_string())
}

// Parser errors

pub fn asm_unexpected(span: Span, src: &str, line: usize, expected: &str, found: TokenKind) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::unexpected_token",
        help = "lines hold an optional label, then an instruction or directive and its operands.",
        labels = vec![LabeledSpan::at(span, "unexpected token")],
        "Expected {expected} on line {line}, found {found}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_unknown_mnemonic(span: Span, src: &str, line: usize, mnemonic: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::unknown_mnemonic",
        help = "only documented Intel 8080 mnemonics and the ORG, DB, DW, DS directives are accepted.",
        labels = vec![LabeledSpan::at(span, "unknown mnemonic")],
        "Unknown mnemonic `{mnemonic}` on line {line}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_bad_operands(span: Span, src: &str, line: usize, mnemonic: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::bad_operands",
        help = "check the number and kind of operands; pairs are B, D, H, SP or PSW.",
        labels = vec![LabeledSpan::at(span, "invalid operands")],
        "Invalid operands for `{mnemonic}` on line {line}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_duplicate_label(span: Span, first: Span, src: &str, line: usize, first_line: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::duplicate_label",
        help = "labels may only be defined once per source file.",
        labels = vec![
            LabeledSpan::at(span, "duplicate label"),
            LabeledSpan::at(first, "first defined here"),
        ],
        "Label on line {line} was already defined on line {first_line}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_undefined_label(span: Span, src: &str, line: usize, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::undefined_label",
        help = format!("labels are case-sensitive; define it with `{name}:`."),
        labels = vec![LabeledSpan::at(span, "not defined")],
        "Reference to undefined label `{name}` on line {line}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_literal_range(
    span: Span,
    src: &str,
    line: usize,
    value: impl fmt::Display,
    bits: u32,
) -> Report {
    let max = (1u32 << bits) - 1;
    miette!(
        severity = Severity::Error,
        code = "asm::literal_range",
        help = format!("this operand is {bits} bits wide, so values range from 0 to {max}."),
        labels = vec![LabeledSpan::at(span, "out of range")],
        "Value {value} does not fit in {bits} bits on line {line}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_orig_backwards(span: Span, src: &str, line: usize, target: u32, current: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::orig_backwards",
        help = "ORG can only move forward; the image is flat and already holds bytes up to here.",
        labels = vec![LabeledSpan::at(span, "moves backwards")],
        "ORG to {target:#06X} on line {line} is below the current address {current:#06X}.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_overflow(span: Span, src: &str, line: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::overflow",
        help = "the 8080 addresses 64KB; the program must end at or before 0xFFFF.",
        labels = vec![LabeledSpan::at(span, "past end of memory")],
        "Program does not fit in memory at line {line}.",
    )
    .with_source_code(src.to_string())
}

// Runtime errors

/// Fatal condition raised while running an image. Carries the address of the faulting
/// instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExecutionError {
    InvalidOpcode { opcode: u8, addr: u16 },
    InvalidReadPort { port: u8, addr: u16 },
    InvalidWritePort { port: u8, addr: u16 },
}

impl ExecutionError {
    pub fn addr(&self) -> u16 {
        match self {
            ExecutionError::InvalidOpcode { addr, .. }
            | ExecutionError::InvalidReadPort { addr, .. }
            | ExecutionError::InvalidWritePort { addr, .. } => *addr,
        }
    }
}

impl std::error::Error for ExecutionError {}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::InvalidOpcode { opcode, addr } => {
                write!(f, "invalid opcode 0x{opcode:02X} at 0x{addr:04X}")
            }
            ExecutionError::InvalidReadPort { port, addr } => {
                write!(f, "no device answers on input port 0x{port:02X} (IN at 0x{addr:04X})")
            }
            ExecutionError::InvalidWritePort { port, addr } => {
                write!(f, "no device listens on output port 0x{port:02X} (OUT at 0x{addr:04X})")
            }
        }
    }
}
