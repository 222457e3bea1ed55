use std::fmt;
use std::str::FromStr;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::span::Span;

// Label table of symbol -> memory address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// 8-bit register operand, ordered by its 3-bit encoding inside opcodes.
///
/// `M` is not a register: it addresses the byte in memory pointed to by `HL`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    B = 0,
    C,
    D,
    E,
    H,
    L,
    M,
    A,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::B,
        Register::C,
        Register::D,
        Register::E,
        Register::H,
        Register::L,
        Register::M,
        Register::A,
    ];

    /// Decode the 3-bit register field of an opcode.
    pub fn from_bits(bits: u8) -> Register {
        Self::ALL[(bits & 0b111) as usize]
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" => Ok(Register::B),
            "C" => Ok(Register::C),
            "D" => Ok(Register::D),
            "E" => Ok(Register::E),
            "H" => Ok(Register::H),
            "L" => Ok(Register::L),
            "M" => Ok(Register::M),
            "A" => Ok(Register::A),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::B => "B",
            Register::C => "C",
            Register::D => "D",
            Register::E => "E",
            Register::H => "H",
            Register::L => "L",
            Register::M => "M",
            Register::A => "A",
        };
        f.write_str(name)
    }
}

/// 16-bit register pair operand.
///
/// `Sp` and `Psw` share the same encoding slot; which one an opcode means depends on the
/// instruction (`PUSH`/`POP` use `Psw`, everything else uses `Sp`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Pair {
    Bc,
    De,
    Hl,
    Sp,
    /// Accumulator and flags, as stored by `PUSH PSW`.
    Psw,
}

impl Pair {
    /// Decode the 2-bit pair field of an opcode, where slot 3 means `SP`.
    pub fn from_bits(bits: u8) -> Pair {
        match bits & 0b11 {
            0 => Pair::Bc,
            1 => Pair::De,
            2 => Pair::Hl,
            _ => Pair::Sp,
        }
    }

    /// High and low halves of the pair, for the three pairs built from registers.
    pub fn halves(self) -> Option<(Register, Register)> {
        match self {
            Pair::Bc => Some((Register::B, Register::C)),
            Pair::De => Some((Register::D, Register::E)),
            Pair::Hl => Some((Register::H, Register::L)),
            Pair::Sp | Pair::Psw => None,
        }
    }
}

impl FromStr for Pair {
    type Err = ();

    // Both the Intel spelling (`B`) and the explicit one (`BC`) are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" | "BC" => Ok(Pair::Bc),
            "D" | "DE" => Ok(Pair::De),
            "H" | "HL" => Ok(Pair::Hl),
            "SP" => Ok(Pair::Sp),
            "PSW" => Ok(Pair::Psw),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pair::Bc => "B",
            Pair::De => "D",
            Pair::Hl => "H",
            Pair::Sp => "SP",
            Pair::Psw => "PSW",
        };
        f.write_str(name)
    }
}

/// Branch condition used by `Jcc`, `Ccc` and `Rcc`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Condition {
    /// Not zero
    Nz = 0,
    /// Zero
    Z,
    /// No carry
    Nc,
    /// Carry
    C,
    /// Parity odd
    Po,
    /// Parity even
    Pe,
    /// Plus
    P,
    /// Minus
    M,
}

impl Condition {
    pub const ALL: [Condition; 8] = [
        Condition::Nz,
        Condition::Z,
        Condition::Nc,
        Condition::C,
        Condition::Po,
        Condition::Pe,
        Condition::P,
        Condition::M,
    ];
}

/// A label definition, remembered for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LabelDef {
    pub addr: u16,
    /// 1-based source line of the definition.
    pub line: usize,
    pub span: Span,
}

/// Label name -> resolved address.
///
/// Names are case-sensitive and kept in definition order.
#[derive(Default, Debug)]
pub struct LabelTable {
    labels: FxMap<String, LabelDef>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable {
            labels: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Record a definition. Returns the earlier definition if the name is already taken.
    pub fn insert(&mut self, name: &str, def: LabelDef) -> Result<(), LabelDef> {
        if let Some(existing) = self.labels.get(name) {
            return Err(*existing);
        }
        self.labels.insert(name.to_string(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.labels.get(name).map(|def| def.addr)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.labels.iter().map(|(name, def)| (name.as_str(), def.addr))
    }
}
