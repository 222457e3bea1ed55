use std::fmt;

use bitflags::bitflags;

use crate::symbol::{Pair, Register};

bitflags! {
    /// Condition flags, laid out as in the low byte of `PSW`.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
    pub struct Flags: u8 {
        /// Carry
        const CY = 0b0000_0001;
        /// Parity (even)
        const P  = 0b0000_0100;
        /// Auxiliary carry, out of bit 3
        const AC = 0b0001_0000;
        /// Zero
        const Z  = 0b0100_0000;
        /// Sign
        const S  = 0b1000_0000;
    }
}

impl Flags {
    /// Bit 1 of the flag byte always reads as set.
    const PSW_FIXED: u8 = 0b0000_0010;

    /// Flags that can be derived from the result byte alone.
    pub const ZSP: Flags = Flags::Z.union(Flags::S).union(Flags::P);

    /// Flag byte as pushed by `PUSH PSW`.
    pub fn to_psw(self) -> u8 {
        self.bits() | Self::PSW_FIXED
    }

    /// Flag byte as popped by `POP PSW`; unused bits are dropped.
    pub fn from_psw(byte: u8) -> Flags {
        Flags::from_bits_truncate(byte)
    }
}

/// Register and flag file.
///
/// Pairs `BC`, `DE` and `HL` have no storage of their own; they are always composed from
/// their two halves, so writes through a half are visible through the pair and the other
/// way around.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Registers {
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    sp: u16,
    pc: u16,
    flags: Flags,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics on `M`, which must be resolved through memory by the caller.
    pub fn get(&self, reg: Register) -> u8 {
        match reg {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
            Register::E => self.e,
            Register::H => self.h,
            Register::L => self.l,
            Register::M => unreachable!("`M` is not backed by a register"),
        }
    }

    /// Panics on `M`, which must be resolved through memory by the caller.
    pub fn set(&mut self, reg: Register, value: u8) {
        let slot = match reg {
            Register::A => &mut self.a,
            Register::B => &mut self.b,
            Register::C => &mut self.c,
            Register::D => &mut self.d,
            Register::E => &mut self.e,
            Register::H => &mut self.h,
            Register::L => &mut self.l,
            Register::M => unreachable!("`M` is not backed by a register"),
        };
        *slot = value;
    }

    pub fn pair(&self, pair: Pair) -> u16 {
        match pair.halves() {
            Some((hi, lo)) => u16::from_be_bytes([self.get(hi), self.get(lo)]),
            None if pair == Pair::Sp => self.sp,
            None => u16::from_be_bytes([self.a, self.flags.to_psw()]),
        }
    }

    pub fn set_pair(&mut self, pair: Pair, value: u16) {
        let [hi_val, lo_val] = value.to_be_bytes();
        match pair.halves() {
            Some((hi, lo)) => {
                self.set(hi, hi_val);
                self.set(lo, lo_val);
            }
            None if pair == Pair::Sp => self.sp = value,
            None => {
                self.a = hi_val;
                self.flags = Flags::from_psw(lo_val);
            }
        }
    }

    pub fn sp(&self) -> u16 {
        self.sp
    }

    pub fn set_sp(&mut self, value: u16) {
        self.sp = value;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    pub fn flag(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: Flags, value: bool) {
        self.flags.set(flag, value);
    }

    /// Recompute the result-derived flags (`Z`, `S`, `P`) named in `affected` from `result`.
    ///
    /// Flags outside `affected` keep their value.
    pub fn set_result_flags(&mut self, result: u8, affected: Flags) {
        let affected = affected & Flags::ZSP;
        if affected.contains(Flags::Z) {
            self.flags.set(Flags::Z, result == 0);
        }
        if affected.contains(Flags::S) {
            self.flags.set(Flags::S, result & 0x80 != 0);
        }
        if affected.contains(Flags::P) {
            self.flags.set(Flags::P, result.count_ones() % 2 == 0);
        }
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A={:02X} B={:02X} C={:02X} D={:02X} E={:02X} H={:02X} L={:02X} SP={:04X} PC={:04X} ",
            self.a, self.b, self.c, self.d, self.e, self.h, self.l, self.sp, self.pc
        )?;
        let names = [
            (Flags::S, 'S'),
            (Flags::Z, 'Z'),
            (Flags::AC, 'A'),
            (Flags::P, 'P'),
            (Flags::CY, 'C'),
        ];
        for (flag, name) in names {
            let ch = if self.flags.contains(flag) { name } else { '.' };
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}
