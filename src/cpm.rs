//! Just enough of CP/M to run `.com` programs such as the 8080 CPU exercisers.
//!
//! Only the console output calls of BDOS are provided. Jumping to the warm boot vector
//! at address 0 halts the processor.

use std::io::Write;

use miette::{IntoDiagnostic, Result};

use crate::memory::{Memory, MEMORY_SIZE};
use crate::runtime::{RunState, Status};
use crate::symbol::{Pair, Register};

/// Address `.com` images are loaded at and started from.
pub const LOAD_ADDR: u16 = 0x0100;

const WARM_BOOT: u16 = 0x0000;
const BDOS_ENTRY: u16 = 0x0005;

const HLT: u8 = 0x76;
const RET: u8 = 0xC9;

// BDOS function numbers, passed in C
const C_WRITE: u8 = 2;
const C_WRITESTR: u8 = 9;

/// Load `image` at `addr` with the system vectors in place, ready to start at `LOAD_ADDR`.
///
/// `.com` files are loaded at `LOAD_ADDR`. Assembled sources are flat images from address
/// 0 (starting with `ORG 100h`), so they are loaded at 0 and the vectors overwrite the
/// padding.
pub fn load(image: &[u8], addr: u16) -> RunState {
    let mut mem = Memory::new();
    mem.load(addr, image);
    mem.write_byte(WARM_BOOT, HLT);
    mem.write_byte(BDOS_ENTRY, RET);
    let mut state = RunState::new(mem);
    state.regs_mut().set_pc(LOAD_ADDR);
    state
}

/// Run `state`, serving BDOS calls, until it halts, is stopped, or `max_steps` runs out.
pub fn run(state: &mut RunState, out: &mut impl Write, max_steps: Option<u64>) -> Result<Status> {
    let stop = state.stop_handle();
    let mut steps = 0;
    while !state.is_halted() && !stop.is_stopped() {
        if max_steps.is_some_and(|max| steps >= max) {
            break;
        }
        if state.regs().pc() == BDOS_ENTRY {
            bdos(state, out).into_diagnostic()?;
        }
        state.step().into_diagnostic()?;
        steps += 1;
    }
    out.flush().into_diagnostic()?;
    Ok(state.status())
}

fn bdos(state: &RunState, out: &mut impl Write) -> std::io::Result<()> {
    let regs = state.regs();
    match regs.get(Register::C) {
        C_WRITE => out.write_all(&[regs.get(Register::E)]),
        C_WRITESTR => {
            let mut addr = regs.pair(Pair::De);
            let mut text = Vec::new();
            for _ in 0..MEMORY_SIZE {
                let byte = state.memory().read_byte(addr);
                if byte == b'$' {
                    break;
                }
                text.push(byte);
                addr = addr.wrapping_add(1);
            }
            out.write_all(&text)
        }
        // Everything else returns without effect
        _ => Ok(()),
    }
}
