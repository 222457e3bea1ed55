use std::cell::RefCell;
use std::path::Path;

use colored::{ColoredString, Colorize};

use crate::opcodes::OpcodeInfo;
use crate::runtime::RunState;
use crate::state::{Flags, Registers};
use crate::symbol::Register;

thread_local! {
    static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
}

/// Suppress status lines and decoration, for blackbox tests. Returns the old value.
pub fn set_minimal(new_value: bool) -> bool {
    IS_MINIMAL.with(|value| value.replace(new_value))
}

pub fn is_minimal() -> bool {
    IS_MINIMAL.with(|value| *value.borrow())
}

#[allow(unused)]
#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Red,
}

/// Right-aligned coloured status line, e.g. `  Assembling target foo.asm`.
pub fn message(color: MsgColor, left: &str, right: &str) {
    if is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

pub fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

/// One line per executed instruction, written to stderr before it executes.
pub fn trace(pc: u16, info: &OpcodeInfo, operand: u16, regs: &Registers) {
    let text = format!("{:<14}", info.format(operand));
    let text = if is_minimal() {
        ColoredString::from(text.as_str())
    } else {
        text.cyan()
    };
    eprintln!("{pc:04X}  {:02X}  {text} {regs}", info.opcode);
}

/// Final register and flag state after a run.
pub fn print_registers(state: &RunState) {
    let regs = state.regs();
    if is_minimal() {
        println!("{regs}");
        return;
    }

    println!("\x1b[2m┌──────────────────────────────┐\x1b[0m");
    println!("\x1b[2m│\x1b[0m     \x1b[3mhex   uint   char\x1b[0m          \x1b[2m│\x1b[0m");
    for reg in [
        Register::A,
        Register::B,
        Register::C,
        Register::D,
        Register::E,
        Register::H,
        Register::L,
    ] {
        let val = regs.get(reg);
        println!(
            "\x1b[2m│\x1b[0m \x1b[1m{reg}\x1b[0m   0x{val:02x}  {val:>4}   {}          \x1b[2m│\x1b[0m",
            char_display(val)
        );
    }
    println!(
        "\x1b[2m│\x1b[0m \x1b[1mSP\x1b[0m 0x{:04x}   \x1b[1mPC\x1b[0m 0x{:04x}       \x1b[2m│\x1b[0m",
        regs.sp(),
        regs.pc()
    );
    let mut flags = String::new();
    for (flag, name) in [
        (Flags::S, "S"),
        (Flags::Z, "Z"),
        (Flags::AC, "AC"),
        (Flags::P, "P"),
        (Flags::CY, "CY"),
    ] {
        let name = if regs.flag(flag) {
            name.bold()
        } else {
            name.dimmed()
        };
        flags.push_str(&format!("{name} "));
    }
    println!("\x1b[2m│\x1b[0m \x1b[1mFL\x1b[0m {flags:<25}\x1b[2m│\x1b[0m");
    println!("\x1b[2m└──────────────────────────────┘\x1b[0m");
}

/// Three column wide rendering of a byte as a character.
fn char_display(value: u8) -> String {
    match value {
        0x00 => "NUL".into(),
        0x09 => "HT ".into(),
        0x0a => "LF ".into(),
        0x0d => "CR ".into(),
        0x1b => "ESC".into(),
        0x20 => "[_]".into(),
        0x21..=0x7e => format!("{:<3}", value as char),
        _ => "\x1b[2m───\x1b[0m".into(),
    }
}
