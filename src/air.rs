use miette::Result;

use crate::error;
use crate::opcodes::OPCODE_TABLE;
use crate::span::Span;
use crate::symbol::{LabelDef, LabelTable};

/// Operand as written in source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    /// Register, pair or label name
    Ident(String, Span),
    Num(u32, Span),
    /// Single quoted character
    Char(u8, Span),
    /// Quoted text, only valid for `DB`
    Str(Vec<u8>, Span),
}

impl Operand {
    pub fn span(&self) -> Span {
        match self {
            Operand::Ident(_, span)
            | Operand::Num(_, span)
            | Operand::Char(_, span)
            | Operand::Str(_, span) => *span,
        }
    }
}

/// Assembly intermediate representation. Statements are already laid out at their final
/// address; only label references remain to be filled in.
#[derive(Debug)]
pub struct Air<'a> {
    src: &'a str,
    ast: Vec<AsmLine>,
    labels: LabelTable,
}

/// Statement with the position it was assembled at.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmLine {
    pub line: usize,
    pub addr: u16,
    pub span: Span,
    pub stmt: AirStmt,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AirStmt {
    /// Opcode followed by the operand filling its immediate slot, if any.
    Instr {
        opcode: u8,
        operand: Option<Operand>,
    },
    /// `DB`
    Bytes(Vec<Operand>),
    /// `DW`
    Words(Vec<Operand>),
    /// `DS`, a run of zero bytes
    Space(u16),
}

/// Result of assembling a source unit.
#[derive(Debug)]
pub struct Assembly {
    /// Flat image, to be loaded at address 0.
    pub image: Vec<u8>,
    /// Address of the first emitted byte, past any leading `ORG` padding.
    pub start: u16,
    pub labels: LabelTable,
}

impl<'a> Air<'a> {
    pub fn new(src: &'a str) -> Self {
        Air {
            src,
            ast: Vec::new(),
            labels: LabelTable::new(),
        }
    }

    pub fn add_stmt(&mut self, stmt: AsmLine) {
        self.ast.push(stmt)
    }

    /// Returns the earlier definition if `name` is taken.
    pub fn add_label(&mut self, name: &str, def: LabelDef) -> Result<(), LabelDef> {
        self.labels.insert(name, def)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn get(&self, idx: usize) -> &AsmLine {
        &self.ast[idx]
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    /// Second pass: encode every statement, substituting label addresses.
    pub fn backpatch(self) -> Result<Assembly> {
        let mut image: Vec<u8> = Vec::new();
        for stmt in &self.ast {
            // Gaps left by ORG are zero-filled
            image.resize(stmt.addr as usize, 0);
            match &stmt.stmt {
                AirStmt::Instr { opcode, operand } => {
                    image.push(*opcode);
                    if let Some(operand) = operand {
                        let width = OPCODE_TABLE.decode(*opcode).map_or(1, |info| info.len - 1);
                        let val = self.resolve(operand, width as u32 * 8, stmt.line)?;
                        image.extend_from_slice(&val.to_le_bytes()[..width as usize]);
                    }
                }
                AirStmt::Bytes(operands) => {
                    for operand in operands {
                        match operand {
                            Operand::Str(bytes, _) => image.extend_from_slice(bytes),
                            _ => image.push(self.resolve(operand, 8, stmt.line)? as u8),
                        }
                    }
                }
                AirStmt::Words(operands) => {
                    for operand in operands {
                        let val = self.resolve(operand, 16, stmt.line)?;
                        image.extend_from_slice(&val.to_le_bytes());
                    }
                }
                AirStmt::Space(len) => image.resize(image.len() + *len as usize, 0),
            }
        }
        Ok(Assembly {
            image,
            start: self.ast.first().map_or(0, |stmt| stmt.addr),
            labels: self.labels,
        })
    }

    /// Value of `operand`, checked against a slot `bits` wide.
    fn resolve(&self, operand: &Operand, bits: u32, line: usize) -> Result<u16> {
        let (val, span) = match operand {
            Operand::Num(val, span) => (*val, *span),
            Operand::Char(ch, span) => (*ch as u32, *span),
            Operand::Ident(name, span) => match self.labels.get(name) {
                Some(addr) => (addr as u32, *span),
                None => return Err(error::asm_undefined_label(*span, self.src, line, name)),
            },
            Operand::Str(..) => unreachable!("strings are only accepted by DB"),
        };
        if val >= 1 << bits {
            return Err(error::asm_literal_range(span, self.src, line, val, bits));
        }
        Ok(val as u16)
    }
}
