use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bus::IoBus;
use crate::error::ExecutionError;
use crate::memory::Memory;
use crate::opcodes::{AluOp, Op, RotateOp, OPCODE_TABLE};
use crate::output;
use crate::state::{Flags, Registers};
use crate::symbol::{Condition, Pair, Register};

/// Whether the processor is still fetching instructions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    Halted,
}

/// Shared flag used to stop a run from outside the run loop.
///
/// Checked between instructions, never in the middle of one.
#[derive(Clone, Default, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Allow runs to proceed again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Represents complete processor state during runtime.
pub struct RunState {
    regs: Registers,
    mem: Memory,
    io: IoBus,
    status: Status,
    /// Set by `EI`, cleared by `DI` and by accepting an interrupt
    interrupts_enabled: bool,
    /// Instructions executed so far
    steps: u64,
    trace: bool,
    stop: StopHandle,
}

impl RunState {
    /// Registers, flags, SP and PC all start at zero.
    pub fn new(mem: Memory) -> Self {
        RunState {
            regs: Registers::new(),
            mem,
            io: IoBus::new(),
            status: Status::Running,
            interrupts_enabled: false,
            steps: 0,
            trace: false,
            stop: StopHandle::default(),
        }
    }

    /// Load `image` at address 0 and start from there.
    pub fn from_image(image: &[u8]) -> Self {
        RunState::new(Memory::with_image(image))
    }

    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn io_mut(&mut self) -> &mut IoBus {
        &mut self.io
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Print every executed instruction to stderr.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until `HLT`, an error, or a stop request.
    pub fn run(&mut self) -> Result<Status, ExecutionError> {
        while !self.is_halted() && !self.stop.is_stopped() {
            self.step()?;
        }
        Ok(self.status)
    }

    /// Like `run`, but gives up after `max_steps` instructions.
    pub fn run_for(&mut self, max_steps: u64) -> Result<Status, ExecutionError> {
        for _ in 0..max_steps {
            if self.is_halted() || self.stop.is_stopped() {
                break;
            }
            self.step()?;
        }
        Ok(self.status)
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// PC is advanced past the instruction before it executes, so jumps and calls
    /// overwrite the advanced value. On error PC still points at the faulting instruction.
    pub fn step(&mut self) -> Result<Status, ExecutionError> {
        if self.is_halted() {
            return Ok(Status::Halted);
        }
        let pc = self.regs.pc();
        let opcode = self.mem.read_byte(pc);
        let info = OPCODE_TABLE
            .decode(opcode)
            .ok_or(ExecutionError::InvalidOpcode { opcode, addr: pc })?;
        let operand = match info.len {
            2 => self.mem.read_byte(pc.wrapping_add(1)) as u16,
            3 => self.mem.read_word(pc.wrapping_add(1)),
            _ => 0,
        };
        if self.trace {
            output::trace(pc, info, operand, &self.regs);
        }
        self.regs.set_pc(pc.wrapping_add(info.len as u16));
        if let Err(err) = self.execute(info.op, operand, pc) {
            self.regs.set_pc(pc);
            return Err(err);
        }
        self.steps += 1;
        Ok(self.status)
    }

    /// Raise the interrupt line with `opcode` on the data bus.
    ///
    /// Ignored unless interrupts are enabled; otherwise interrupts are disabled, a halted
    /// processor resumes, and the instruction runs without a fetch. Only single byte
    /// instructions (normally `RST n`) can be supplied. Returns whether it was accepted.
    pub fn interrupt(&mut self, opcode: u8) -> Result<bool, ExecutionError> {
        if !self.interrupts_enabled {
            return Ok(false);
        }
        let pc = self.regs.pc();
        let info = OPCODE_TABLE
            .decode(opcode)
            .filter(|info| info.len == 1)
            .ok_or(ExecutionError::InvalidOpcode { opcode, addr: pc })?;
        self.interrupts_enabled = false;
        self.status = Status::Running;
        self.execute(info.op, 0, pc)?;
        self.steps += 1;
        Ok(true)
    }

    fn execute(&mut self, op: Op, operand: u16, addr: u16) -> Result<(), ExecutionError> {
        let byte = operand as u8;
        match op {
            Op::Nop => {}
            Op::Hlt => self.status = Status::Halted,
            Op::Mov { dest, src } => {
                let val = self.read_reg(src);
                self.write_reg(dest, val);
            }
            Op::Mvi(reg) => self.write_reg(reg, byte),
            Op::Lxi(pair) => self.regs.set_pair(pair, operand),
            Op::Lda => {
                let val = self.mem.read_byte(operand);
                self.regs.set(Register::A, val);
            }
            Op::Sta => self.mem.write_byte(operand, self.regs.get(Register::A)),
            Op::Lhld => {
                let val = self.mem.read_word(operand);
                self.regs.set_pair(Pair::Hl, val);
            }
            Op::Shld => self.mem.write_word(operand, self.regs.pair(Pair::Hl)),
            Op::Ldax(pair) => {
                let val = self.mem.read_byte(self.regs.pair(pair));
                self.regs.set(Register::A, val);
            }
            Op::Stax(pair) => {
                let addr = self.regs.pair(pair);
                self.mem.write_byte(addr, self.regs.get(Register::A));
            }
            Op::Xchg => {
                let de = self.regs.pair(Pair::De);
                let hl = self.regs.pair(Pair::Hl);
                self.regs.set_pair(Pair::De, hl);
                self.regs.set_pair(Pair::Hl, de);
            }
            Op::Inr(reg) => {
                let res = self.read_reg(reg).wrapping_add(1);
                self.regs.set_result_flags(res, Flags::ZSP);
                self.regs.set_flag(Flags::AC, res & 0x0F == 0x00);
                self.write_reg(reg, res);
            }
            Op::Dcr(reg) => {
                let res = self.read_reg(reg).wrapping_sub(1);
                self.regs.set_result_flags(res, Flags::ZSP);
                self.regs.set_flag(Flags::AC, res & 0x0F != 0x0F);
                self.write_reg(reg, res);
            }
            Op::Inx(pair) => {
                let val = self.regs.pair(pair).wrapping_add(1);
                self.regs.set_pair(pair, val);
            }
            Op::Dcx(pair) => {
                let val = self.regs.pair(pair).wrapping_sub(1);
                self.regs.set_pair(pair, val);
            }
            Op::Dad(pair) => {
                let (res, carry) = self.regs.pair(Pair::Hl).overflowing_add(self.regs.pair(pair));
                self.regs.set_pair(Pair::Hl, res);
                self.regs.set_flag(Flags::CY, carry);
            }
            Op::Alu(alu, reg) => {
                let val = self.read_reg(reg);
                self.alu(alu, val);
            }
            Op::AluImm(alu) => self.alu(alu, byte),
            Op::Rotate(rot) => self.rotate(rot),
            Op::Daa => self.daa(),
            Op::Cma => {
                let a = self.regs.get(Register::A);
                self.regs.set(Register::A, !a);
            }
            Op::Stc => self.regs.set_flag(Flags::CY, true),
            Op::Cmc => {
                let carry = self.regs.flag(Flags::CY);
                self.regs.set_flag(Flags::CY, !carry);
            }
            Op::Jmp => self.regs.set_pc(operand),
            Op::Jcc(cond) => {
                if self.condition(cond) {
                    self.regs.set_pc(operand);
                }
            }
            Op::Call => self.call(operand),
            Op::Ccc(cond) => {
                if self.condition(cond) {
                    self.call(operand);
                }
            }
            Op::Ret => {
                let ret = self.pop_val();
                self.regs.set_pc(ret);
            }
            Op::Rcc(cond) => {
                if self.condition(cond) {
                    let ret = self.pop_val();
                    self.regs.set_pc(ret);
                }
            }
            Op::Rst(vector) => self.call(vector as u16 * 8),
            Op::Pchl => self.regs.set_pc(self.regs.pair(Pair::Hl)),
            Op::Sphl => self.regs.set_sp(self.regs.pair(Pair::Hl)),
            Op::Xthl => {
                let sp = self.regs.sp();
                let top = self.mem.read_word(sp);
                self.mem.write_word(sp, self.regs.pair(Pair::Hl));
                self.regs.set_pair(Pair::Hl, top);
            }
            Op::Push(pair) => self.push_val(self.regs.pair(pair)),
            Op::Pop(pair) => {
                let val = self.pop_val();
                self.regs.set_pair(pair, val);
            }
            Op::In => {
                let val = self
                    .io
                    .read(byte)
                    .ok_or(ExecutionError::InvalidReadPort { port: byte, addr })?;
                self.regs.set(Register::A, val);
            }
            Op::Out => {
                if !self.io.write(byte, self.regs.get(Register::A)) {
                    return Err(ExecutionError::InvalidWritePort { port: byte, addr });
                }
            }
            Op::Ei => self.interrupts_enabled = true,
            Op::Di => self.interrupts_enabled = false,
        }
        Ok(())
    }

    /// Value of an 8-bit operand, where `M` is the byte at `HL`.
    fn read_reg(&self, reg: Register) -> u8 {
        match reg {
            Register::M => self.mem.read_byte(self.regs.pair(Pair::Hl)),
            reg => self.regs.get(reg),
        }
    }

    fn write_reg(&mut self, reg: Register, val: u8) {
        match reg {
            Register::M => self.mem.write_byte(self.regs.pair(Pair::Hl), val),
            reg => self.regs.set(reg, val),
        }
    }

    fn push_val(&mut self, val: u16) {
        let sp = self.regs.sp().wrapping_sub(2);
        self.regs.set_sp(sp);
        self.mem.write_word(sp, val);
    }

    fn pop_val(&mut self) -> u16 {
        let sp = self.regs.sp();
        let val = self.mem.read_word(sp);
        self.regs.set_sp(sp.wrapping_add(2));
        val
    }

    fn call(&mut self, target: u16) {
        self.push_val(self.regs.pc());
        self.regs.set_pc(target);
    }

    fn condition(&self, cond: Condition) -> bool {
        let flag = |flag| self.regs.flag(flag);
        match cond {
            Condition::Nz => !flag(Flags::Z),
            Condition::Z => flag(Flags::Z),
            Condition::Nc => !flag(Flags::CY),
            Condition::C => flag(Flags::CY),
            Condition::Po => !flag(Flags::P),
            Condition::Pe => flag(Flags::P),
            Condition::P => !flag(Flags::S),
            Condition::M => flag(Flags::S),
        }
    }

    fn alu(&mut self, alu: AluOp, val: u8) {
        let a = self.regs.get(Register::A);
        let carry = self.regs.flag(Flags::CY) as u8;
        let (res, cy, ac) = match alu {
            AluOp::Add => add(a, val, 0),
            AluOp::Adc => add(a, val, carry),
            AluOp::Sub | AluOp::Cmp => sub(a, val, 0),
            AluOp::Sbb => sub(a, val, carry),
            AluOp::Ana => (a & val, false, (a | val) & 0x08 != 0),
            AluOp::Xra => (a ^ val, false, false),
            AluOp::Ora => (a | val, false, false),
        };
        self.regs.set_result_flags(res, Flags::ZSP);
        self.regs.set_flag(Flags::CY, cy);
        self.regs.set_flag(Flags::AC, ac);
        // Compare only sets flags
        if alu != AluOp::Cmp {
            self.regs.set(Register::A, res);
        }
    }

    fn rotate(&mut self, rot: RotateOp) {
        let a = self.regs.get(Register::A);
        let carry = self.regs.flag(Flags::CY) as u8;
        let (res, cy) = match rot {
            RotateOp::Rlc => (a.rotate_left(1), a & 0x80 != 0),
            RotateOp::Rrc => (a.rotate_right(1), a & 0x01 != 0),
            RotateOp::Ral => ((a << 1) | carry, a & 0x80 != 0),
            RotateOp::Rar => ((a >> 1) | (carry << 7), a & 0x01 != 0),
        };
        self.regs.set(Register::A, res);
        self.regs.set_flag(Flags::CY, cy);
    }

    fn daa(&mut self) {
        let a = self.regs.get(Register::A);
        let lsb = a & 0x0F;
        let msb = a >> 4;
        let mut cy = self.regs.flag(Flags::CY);
        let mut correction = 0;
        if self.regs.flag(Flags::AC) || lsb > 9 {
            correction += 0x06;
        }
        if cy || msb > 9 || (msb >= 9 && lsb > 9) {
            correction += 0x60;
            cy = true;
        }
        let (res, _, ac) = add(a, correction, 0);
        self.regs.set(Register::A, res);
        self.regs.set_result_flags(res, Flags::ZSP);
        self.regs.set_flag(Flags::AC, ac);
        self.regs.set_flag(Flags::CY, cy);
    }
}

/// `a + val + carry`, returning the result, carry out of bit 7 and carry out of bit 3.
fn add(a: u8, val: u8, carry: u8) -> (u8, bool, bool) {
    let sum = a as u16 + val as u16 + carry as u16;
    let ac = (a & 0x0F) + (val & 0x0F) + carry > 0x0F;
    (sum as u8, sum > 0xFF, ac)
}

/// `a - val - borrow`, returning the result, borrow and auxiliary carry.
///
/// The 8080 subtracts by adding the complement, so AC is the carry out of bit 3 of
/// `a + !val + !borrow` rather than a nibble borrow.
fn sub(a: u8, val: u8, borrow: u8) -> (u8, bool, bool) {
    let (res, _, ac) = add(a, !val, 1 - borrow);
    let cy = (a as u16) < val as u16 + borrow as u16;
    (res, cy, ac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(image: &[u8]) -> RunState {
        let mut state = RunState::from_image(image);
        state.run().unwrap();
        state
    }

    #[test]
    fn mvi_loads_registers() {
        let state = run(&[0x3E, 0x01, 0x06, 0x02, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x01);
        assert_eq!(state.regs().get(Register::B), 0x02);
        assert!(state.is_halted());
    }

    #[test]
    fn inr_every_register() {
        // INR A, B, C, D, E, H, L
        let state = run(&[0x3C, 0x04, 0x0C, 0x14, 0x1C, 0x24, 0x2C, 0x76]);
        for reg in [
            Register::A,
            Register::B,
            Register::C,
            Register::D,
            Register::E,
            Register::H,
            Register::L,
        ] {
            assert_eq!(state.regs().get(reg), 0x01, "{reg}");
        }
    }

    #[test]
    fn lxi_loads_pairs() {
        let state = run(&[
            0x01, 0x34, 0x12, // LXI B,1234h
            0x11, 0x78, 0x56, // LXI D,5678h
            0x21, 0x12, 0x90, // LXI H,9012h
            0x76,
        ]);
        assert_eq!(state.regs().pair(Pair::Bc), 0x1234);
        assert_eq!(state.regs().pair(Pair::De), 0x5678);
        assert_eq!(state.regs().pair(Pair::Hl), 0x9012);
    }

    #[test]
    fn sta_stores_accumulator() {
        let state = run(&[0x3E, 0x2A, 0x32, 0x88, 0x88, 0x76]);
        assert_eq!(state.memory().read_byte(0x8888), 0x2A);
    }

    #[test]
    fn hlt_stops_fetching() {
        let mut state = RunState::from_image(&[0x76, 0x3C]);
        assert_eq!(state.step().unwrap(), Status::Halted);
        assert_eq!(state.regs().pc(), 0x0001);
        assert_eq!(state.step().unwrap(), Status::Halted);
        assert_eq!(state.regs().get(Register::A), 0x00);
        assert_eq!(state.steps(), 1);
    }

    #[test]
    fn inr_dcr_leave_carry() {
        let mut state = RunState::from_image(&[0x37, 0x3C, 0x3D, 0x3D, 0x76]);
        state.run().unwrap();
        assert!(state.regs().flag(Flags::CY));
        assert_eq!(state.regs().get(Register::A), 0xFF);
        assert!(state.regs().flag(Flags::S));
    }

    #[test]
    fn inr_dcr_wrap() {
        // MVI A,FFh; INR A
        let state = run(&[0x3E, 0xFF, 0x3C, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x00);
        let flags = state.regs().flags();
        assert!(flags.contains(Flags::Z | Flags::P | Flags::AC));
        assert!(!flags.contains(Flags::S));
        assert!(!flags.contains(Flags::CY));

        // DCR B from zero
        let state = run(&[0x05, 0x76]);
        assert_eq!(state.regs().get(Register::B), 0xFF);
        assert!(!state.regs().flag(Flags::Z));
        assert!(!state.regs().flag(Flags::AC));
        assert!(state.regs().flag(Flags::S));
    }

    #[test]
    fn inx_touches_no_flags() {
        // LXI H,FFFFh; INX H
        let state = run(&[0x21, 0xFF, 0xFF, 0x23, 0x76]);
        assert_eq!(state.regs().pair(Pair::Hl), 0x0000);
        assert_eq!(state.regs().flags(), Flags::empty());
    }

    #[test]
    fn push_pop_restores() {
        let state = run(&[
            0x31, 0x00, 0x24, // LXI SP,2400h
            0x01, 0xCD, 0xAB, // LXI B,ABCDh
            0xC5, // PUSH B
            0x01, 0x00, 0x00, // LXI B,0
            0xD1, // POP D
            0x76,
        ]);
        assert_eq!(state.regs().pair(Pair::De), 0xABCD);
        assert_eq!(state.regs().sp(), 0x2400);
        assert_eq!(state.memory().read_byte(0x23FF), 0xAB);
        assert_eq!(state.memory().read_byte(0x23FE), 0xCD);
    }

    #[test]
    fn push_psw_layout() {
        let mut state = RunState::from_image(&[0xF5, 0x76]);
        state.regs_mut().set_sp(0x1000);
        state.regs_mut().set(Register::A, 0x80);
        state.regs_mut().set_flags(Flags::S | Flags::CY);
        state.run().unwrap();
        assert_eq!(state.memory().read_byte(0x0FFF), 0x80);
        assert_eq!(state.memory().read_byte(0x0FFE), 0b1000_0011);
    }

    #[test]
    fn arithmetic_flags() {
        // MVI A,3Ah; ADI C6h
        let state = run(&[0x3E, 0x3A, 0xC6, 0xC6, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x00);
        assert!(state.regs().flag(Flags::CY));
        assert!(state.regs().flag(Flags::Z));
        assert!(state.regs().flag(Flags::AC));

        // MVI A,05h; SUI 06h
        let state = run(&[0x3E, 0x05, 0xD6, 0x06, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0xFF);
        assert!(state.regs().flag(Flags::CY));
        assert!(state.regs().flag(Flags::S));
        assert!(state.regs().flag(Flags::P));

        // MVI A,10h; CPI 10h leaves A
        let state = run(&[0x3E, 0x10, 0xFE, 0x10, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x10);
        assert!(state.regs().flag(Flags::Z));
        assert!(!state.regs().flag(Flags::CY));
    }

    #[test]
    fn logic_clears_carry() {
        // STC; MVI A,F0h; ANI 0Fh
        let state = run(&[0x37, 0x3E, 0xF0, 0xE6, 0x0F, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x00);
        assert!(!state.regs().flag(Flags::CY));
        assert!(state.regs().flag(Flags::Z));
    }

    #[test]
    fn rotates() {
        // MVI A,F2h; RRC
        let state = run(&[0x3E, 0xF2, 0x0F, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x79);
        assert!(!state.regs().flag(Flags::CY));
        // MVI A,80h; RAL
        let state = run(&[0x3E, 0x80, 0x17, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x00);
        assert!(state.regs().flag(Flags::CY));
    }

    #[test]
    fn daa_adjusts() {
        // MVI A,9Bh; DAA
        let state = run(&[0x3E, 0x9B, 0x27, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x01);
        assert!(state.regs().flag(Flags::CY));
        assert!(state.regs().flag(Flags::AC));
    }

    #[test]
    fn dad_sets_only_carry() {
        // LXI H,FFFFh; LXI B,0001h; DAD B
        let state = run(&[0x21, 0xFF, 0xFF, 0x01, 0x01, 0x00, 0x09, 0x76]);
        assert_eq!(state.regs().pair(Pair::Hl), 0x0000);
        assert_eq!(state.regs().flags(), Flags::CY);
    }

    #[test]
    fn call_and_return() {
        let state = run(&[
            0x31, 0x00, 0x10, // LXI SP,1000h
            0xCD, 0x08, 0x00, // CALL 0008h
            0x76, // HLT
            0x00, //
            0x3E, 0x07, // MVI A,7
            0xC9, // RET
        ]);
        assert_eq!(state.regs().get(Register::A), 0x07);
        assert_eq!(state.regs().pc(), 0x0007);
        assert_eq!(state.regs().sp(), 0x1000);
    }

    #[test]
    fn conditional_jump() {
        // MVI A,1; DCR A; JZ 0007h; HLT; MVI B,5; HLT
        let state = run(&[0x3E, 0x01, 0x3D, 0xCA, 0x07, 0x00, 0x76, 0x06, 0x05, 0x76]);
        assert_eq!(state.regs().get(Register::B), 0x05);
    }

    #[test]
    fn memory_operand() {
        // LXI H,0100h; MVI M,42h; MOV A,M; INR M
        let state = run(&[0x21, 0x00, 0x01, 0x36, 0x42, 0x7E, 0x34, 0x76]);
        assert_eq!(state.regs().get(Register::A), 0x42);
        assert_eq!(state.memory().read_byte(0x0100), 0x43);
    }

    #[test]
    fn invalid_opcode_reports_address() {
        let mut state = RunState::from_image(&[0x00, 0x00, 0x08]);
        let err = state.run().unwrap_err();
        assert_eq!(
            err,
            ExecutionError::InvalidOpcode {
                opcode: 0x08,
                addr: 0x0002
            }
        );
        assert_eq!(state.regs().pc(), 0x0002);
    }

    #[test]
    fn ports() {
        // IN 1; OUT 2
        let mut state = RunState::from_image(&[0xDB, 0x01, 0xD3, 0x02, 0x76]);
        assert_eq!(
            state.run().unwrap_err(),
            ExecutionError::InvalidReadPort { port: 1, addr: 0 }
        );
        assert_eq!(state.regs().pc(), 0x0000);

        let mut state = RunState::from_image(&[0xDB, 0x01, 0xD3, 0x02, 0x76]);
        let out = std::rc::Rc::new(std::cell::Cell::new(0));
        let sink = out.clone();
        state.io_mut().register_reader(1, || 0x5A);
        state.io_mut().register_writer(2, move |val| sink.set(val));
        state.run().unwrap();
        assert_eq!(out.get(), 0x5A);
    }

    #[test]
    fn interrupts() {
        let mut state = RunState::from_image(&[0x76]);
        state.regs_mut().set_sp(0x1000);
        state.run().unwrap();
        assert!(!state.interrupt(0xCF).unwrap());
        assert!(state.is_halted());

        // EI; HLT
        let mut state = RunState::from_image(&[0xFB, 0x76]);
        state.regs_mut().set_sp(0x1000);
        state.run().unwrap();
        assert!(state.interrupt(0xCF).unwrap()); // RST 1
        assert!(!state.is_halted());
        assert!(!state.interrupts_enabled());
        assert_eq!(state.regs().pc(), 0x0008);
        assert_eq!(state.memory().read_word(0x0FFE), 0x0002);
    }

    #[test]
    fn bounded_and_stopped_runs() {
        // JMP 0000h
        let mut state = RunState::from_image(&[0xC3, 0x00, 0x00]);
        assert_eq!(state.run_for(10).unwrap(), Status::Running);
        assert_eq!(state.steps(), 10);

        let handle = state.stop_handle();
        handle.stop();
        assert!(handle.is_stopped());
        assert_eq!(state.run_for(5).unwrap(), Status::Running);
        assert_eq!(state.run().unwrap(), Status::Running);
        assert_eq!(state.steps(), 10);

        handle.reset();
        state.run_for(5).unwrap();
        assert_eq!(state.steps(), 15);
    }
}
