//! The 8080 instruction table.
//!
//! Both the assembler and the runtime read instruction shapes and lengths from here, so
//! the two can never disagree on how many bytes an instruction occupies.

use std::fmt;

use fxhash::FxHashMap;
use lazy_static::lazy_static;

use crate::air::Operand;
use crate::state::Flags;
use crate::symbol::{Condition, Pair, Register};

/// Accumulator operation selected by bits 3-5 of `ADD`..`CMP` and `ADI`..`CPI`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbb,
    Ana,
    Xra,
    Ora,
    Cmp,
}

impl AluOp {
    const ALL: [AluOp; 8] = [
        AluOp::Add,
        AluOp::Adc,
        AluOp::Sub,
        AluOp::Sbb,
        AluOp::Ana,
        AluOp::Xra,
        AluOp::Ora,
        AluOp::Cmp,
    ];
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RotateOp {
    Rlc,
    Rrc,
    Ral,
    Rar,
}

/// What an instruction does once decoded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Op {
    Nop,
    Hlt,
    Mov { dest: Register, src: Register },
    Mvi(Register),
    Lxi(Pair),
    Lda,
    Sta,
    Lhld,
    Shld,
    Ldax(Pair),
    Stax(Pair),
    Xchg,
    Inr(Register),
    Dcr(Register),
    Inx(Pair),
    Dcx(Pair),
    Dad(Pair),
    Alu(AluOp, Register),
    AluImm(AluOp),
    Rotate(RotateOp),
    Daa,
    Cma,
    Stc,
    Cmc,
    Jmp,
    Jcc(Condition),
    Call,
    Ccc(Condition),
    Ret,
    Rcc(Condition),
    Rst(u8),
    Pchl,
    Sphl,
    Xthl,
    Push(Pair),
    Pop(Pair),
    In,
    Out,
    Ei,
    Di,
}

/// Operand slot of an instruction, as written in source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arg {
    /// Register encoded into the opcode.
    Reg(Register),
    /// Register pair encoded into the opcode.
    Pair(Pair),
    /// Restart vector encoded into the opcode.
    Vector(u8),
    /// 8-bit immediate or port number, one trailing byte.
    Byte,
    /// 16-bit immediate or address, two trailing bytes (little-endian).
    Word,
}

impl Arg {
    /// Bytes this slot adds after the opcode.
    pub fn width(self) -> u8 {
        match self {
            Arg::Byte => 1,
            Arg::Word => 2,
            Arg::Reg(_) | Arg::Pair(_) | Arg::Vector(_) => 0,
        }
    }

    /// Whether a source operand fits this slot.
    pub fn accepts(self, operand: &Operand) -> bool {
        match (self, operand) {
            (Arg::Reg(reg), Operand::Ident(name, _)) => name.parse() == Ok(reg),
            (Arg::Pair(pair), Operand::Ident(name, _)) => name.parse() == Ok(pair),
            (Arg::Vector(n), Operand::Num(val, _)) => *val == n as u32,
            (Arg::Byte | Arg::Word, Operand::Num(..)) => true,
            (Arg::Byte, Operand::Char(..)) => true,
            // Labels, as long as they do not spell a register
            (Arg::Byte | Arg::Word, Operand::Ident(name, _)) => {
                name.parse::<Register>().is_err() && name.parse::<Pair>().is_err()
            }
            _ => false,
        }
    }
}

/// Addressing mode, derived from the operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressingMode {
    Implied,
    Register,
    RegisterPair,
    /// Memory at `HL` (`M`), or at `BC`/`DE` for `LDAX`/`STAX`.
    RegisterIndirect,
    Immediate8,
    Immediate16,
    Direct,
}

/// One row of the table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OpcodeInfo {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub args: Vec<Arg>,
    /// Total length including the opcode byte.
    pub len: u8,
    pub op: Op,
    pub mode: AddressingMode,
    /// Flags the instruction may change. All others are left untouched.
    pub flags: Flags,
}

impl OpcodeInfo {
    fn new(opcode: u8, mnemonic: &'static str, args: Vec<Arg>, op: Op) -> Self {
        let len = 1 + args.iter().map(|arg| arg.width()).sum::<u8>();
        OpcodeInfo {
            opcode,
            mnemonic,
            args,
            len,
            op,
            mode: addressing_mode(op),
            flags: affected_flags(op),
        }
    }

    /// Render with its immediate operand, e.g. `MVI A,0x2A`. The result assembles back to
    /// the same bytes.
    pub fn format(&self, operand: u16) -> String {
        let mut text = self.mnemonic.to_string();
        for (i, arg) in self.args.iter().enumerate() {
            text.push(if i == 0 { ' ' } else { ',' });
            match arg {
                Arg::Reg(reg) => text.push_str(&reg.to_string()),
                Arg::Pair(pair) => text.push_str(&pair.to_string()),
                Arg::Vector(n) => text.push_str(&n.to_string()),
                Arg::Byte => text.push_str(&format!("0x{:02X}", operand as u8)),
                Arg::Word => text.push_str(&format!("0x{:04X}", operand)),
            }
        }
        text
    }
}

impl fmt::Display for OpcodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { " " } else { "," })?;
            match arg {
                Arg::Reg(reg) => write!(f, "{reg}")?,
                Arg::Pair(pair) => write!(f, "{pair}")?,
                Arg::Vector(n) => write!(f, "{n}")?,
                Arg::Byte => f.write_str("d8")?,
                Arg::Word => f.write_str("d16")?,
            }
        }
        Ok(())
    }
}

fn addressing_mode(op: Op) -> AddressingMode {
    use AddressingMode as Mode;
    match op {
        Op::Mov { dest, src } if dest == Register::M || src == Register::M => {
            Mode::RegisterIndirect
        }
        Op::Inr(Register::M) | Op::Dcr(Register::M) | Op::Alu(_, Register::M) => {
            Mode::RegisterIndirect
        }
        Op::Ldax(_) | Op::Stax(_) => Mode::RegisterIndirect,
        Op::Mov { .. } | Op::Inr(_) | Op::Dcr(_) | Op::Alu(..) => Mode::Register,
        Op::Inx(_) | Op::Dcx(_) | Op::Dad(_) | Op::Push(_) | Op::Pop(_) => Mode::RegisterPair,
        Op::Mvi(_) | Op::AluImm(_) | Op::In | Op::Out => Mode::Immediate8,
        Op::Lxi(_) => Mode::Immediate16,
        Op::Lda | Op::Sta | Op::Lhld | Op::Shld => Mode::Direct,
        Op::Jmp | Op::Jcc(_) | Op::Call | Op::Ccc(_) => Mode::Direct,
        _ => Mode::Implied,
    }
}

fn affected_flags(op: Op) -> Flags {
    match op {
        Op::Inr(_) | Op::Dcr(_) => Flags::ZSP | Flags::AC,
        Op::Alu(..) | Op::AluImm(_) | Op::Daa | Op::Pop(Pair::Psw) => Flags::all(),
        Op::Dad(_) | Op::Rotate(_) | Op::Stc | Op::Cmc => Flags::CY,
        _ => Flags::empty(),
    }
}

const REG_ALU: [&str; 8] = ["ADD", "ADC", "SUB", "SBB", "ANA", "XRA", "ORA", "CMP"];
const IMM_ALU: [&str; 8] = ["ADI", "ACI", "SUI", "SBI", "ANI", "XRI", "ORI", "CPI"];
const JUMPS: [&str; 8] = ["JNZ", "JZ", "JNC", "JC", "JPO", "JPE", "JP", "JM"];
const CALLS: [&str; 8] = ["CNZ", "CZ", "CNC", "CC", "CPO", "CPE", "CP", "CM"];
const RETURNS: [&str; 8] = ["RNZ", "RZ", "RNC", "RC", "RPO", "RPE", "RP", "RM"];

/// Describe `opcode`, or `None` for the undocumented encodings.
fn describe(opcode: u8) -> Option<OpcodeInfo> {
    use Arg::{Byte, Word};

    let z = opcode & 0b111;
    let y = (opcode >> 3) & 0b111;
    let p = y >> 1;
    let q = y & 1;
    let reg_y = Register::from_bits(y);
    let reg_z = Register::from_bits(z);
    let pair = Pair::from_bits(p);
    let stack_pair = if p == 3 { Pair::Psw } else { pair };
    let cond = Condition::ALL[y as usize];

    let info = |mnemonic, args, op| Some(OpcodeInfo::new(opcode, mnemonic, args, op));

    match opcode {
        0x00 => info("NOP", vec![], Op::Nop),
        0x76 => info("HLT", vec![], Op::Hlt),
        0x40..=0x7F => info(
            "MOV",
            vec![Arg::Reg(reg_y), Arg::Reg(reg_z)],
            Op::Mov {
                dest: reg_y,
                src: reg_z,
            },
        ),
        0x80..=0xBF => {
            let alu = AluOp::ALL[y as usize];
            info(REG_ALU[y as usize], vec![Arg::Reg(reg_z)], Op::Alu(alu, reg_z))
        }
        0x00..=0x3F => match z {
            0 => None,
            1 if q == 0 => info("LXI", vec![Arg::Pair(pair), Word], Op::Lxi(pair)),
            1 => info("DAD", vec![Arg::Pair(pair)], Op::Dad(pair)),
            2 => match (q, p) {
                (0, 0 | 1) => info("STAX", vec![Arg::Pair(pair)], Op::Stax(pair)),
                (0, 2) => info("SHLD", vec![Word], Op::Shld),
                (0, _) => info("STA", vec![Word], Op::Sta),
                (_, 0 | 1) => info("LDAX", vec![Arg::Pair(pair)], Op::Ldax(pair)),
                (_, 2) => info("LHLD", vec![Word], Op::Lhld),
                _ => info("LDA", vec![Word], Op::Lda),
            },
            3 if q == 0 => info("INX", vec![Arg::Pair(pair)], Op::Inx(pair)),
            3 => info("DCX", vec![Arg::Pair(pair)], Op::Dcx(pair)),
            4 => info("INR", vec![Arg::Reg(reg_y)], Op::Inr(reg_y)),
            5 => info("DCR", vec![Arg::Reg(reg_y)], Op::Dcr(reg_y)),
            6 => info("MVI", vec![Arg::Reg(reg_y), Byte], Op::Mvi(reg_y)),
            _ => match y {
                0 => info("RLC", vec![], Op::Rotate(RotateOp::Rlc)),
                1 => info("RRC", vec![], Op::Rotate(RotateOp::Rrc)),
                2 => info("RAL", vec![], Op::Rotate(RotateOp::Ral)),
                3 => info("RAR", vec![], Op::Rotate(RotateOp::Rar)),
                4 => info("DAA", vec![], Op::Daa),
                5 => info("CMA", vec![], Op::Cma),
                6 => info("STC", vec![], Op::Stc),
                _ => info("CMC", vec![], Op::Cmc),
            },
        },
        0xC0..=0xFF => match z {
            0 => info(RETURNS[y as usize], vec![], Op::Rcc(cond)),
            1 if q == 0 => info("POP", vec![Arg::Pair(stack_pair)], Op::Pop(stack_pair)),
            1 => match p {
                0 => info("RET", vec![], Op::Ret),
                1 => None,
                2 => info("PCHL", vec![], Op::Pchl),
                _ => info("SPHL", vec![], Op::Sphl),
            },
            2 => info(JUMPS[y as usize], vec![Word], Op::Jcc(cond)),
            3 => match y {
                0 => info("JMP", vec![Word], Op::Jmp),
                1 => None,
                2 => info("OUT", vec![Byte], Op::Out),
                3 => info("IN", vec![Byte], Op::In),
                4 => info("XTHL", vec![], Op::Xthl),
                5 => info("XCHG", vec![], Op::Xchg),
                6 => info("DI", vec![], Op::Di),
                _ => info("EI", vec![], Op::Ei),
            },
            4 => info(CALLS[y as usize], vec![Word], Op::Ccc(cond)),
            5 if q == 0 => info("PUSH", vec![Arg::Pair(stack_pair)], Op::Push(stack_pair)),
            5 if p == 0 => info("CALL", vec![Word], Op::Call),
            5 => None,
            6 => {
                let alu = AluOp::ALL[y as usize];
                info(IMM_ALU[y as usize], vec![Byte], Op::AluImm(alu))
            }
            _ => info("RST", vec![Arg::Vector(y)], Op::Rst(y)),
        },
    }
}

/// Why an instruction could not be matched against the table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LookupError {
    UnknownMnemonic,
    BadOperands,
}

/// Decode index by opcode byte, and encode index by mnemonic.
pub struct OpcodeTable {
    by_opcode: Vec<Option<OpcodeInfo>>,
    by_mnemonic: FxHashMap<&'static str, Vec<u8>>,
}

impl OpcodeTable {
    fn build() -> Self {
        let by_opcode: Vec<Option<OpcodeInfo>> = (0..=u8::MAX).map(describe).collect();
        let mut by_mnemonic: FxHashMap<&'static str, Vec<u8>> = FxHashMap::default();
        for info in by_opcode.iter().flatten() {
            by_mnemonic.entry(info.mnemonic).or_default().push(info.opcode);
        }
        OpcodeTable {
            by_opcode,
            by_mnemonic,
        }
    }

    pub fn decode(&self, opcode: u8) -> Option<&OpcodeInfo> {
        self.by_opcode[opcode as usize].as_ref()
    }

    pub fn is_mnemonic(&self, mnemonic: &str) -> bool {
        self.by_mnemonic
            .contains_key(mnemonic.to_ascii_uppercase().as_str())
    }

    /// Find the entry for `mnemonic` whose operand slots accept `operands`.
    ///
    /// Mnemonics are matched case-insensitively.
    pub fn lookup(&self, mnemonic: &str, operands: &[Operand]) -> Result<&OpcodeInfo, LookupError> {
        let candidates = self
            .by_mnemonic
            .get(mnemonic.to_ascii_uppercase().as_str())
            .ok_or(LookupError::UnknownMnemonic)?;
        candidates
            .iter()
            .filter_map(|opcode| self.decode(*opcode))
            .find(|info| {
                info.args.len() == operands.len()
                    && info
                        .args
                        .iter()
                        .zip(operands)
                        .all(|(arg, operand)| arg.accepts(operand))
            })
            .ok_or(LookupError::BadOperands)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpcodeInfo> {
        self.by_opcode.iter().flatten()
    }
}

lazy_static! {
    pub static ref OPCODE_TABLE: OpcodeTable = OpcodeTable::build();
}
