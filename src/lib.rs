// Assembling
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, AirStmt, AsmLine, Assembly, Operand};
mod lexer;

// Shared by assembler and runtime
pub mod opcodes;
pub mod span;
pub mod symbol;

// Running
mod runtime;
pub use runtime::{RunState, Status, StopHandle};
pub mod bus;
pub mod cpm;
pub mod memory;
pub mod state;

mod error;
pub use error::ExecutionError;

pub mod env;
pub mod output;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Run both assembler passes over `src`.
pub fn assemble(src: &str) -> miette::Result<Assembly> {
    let air = AsmParser::new(src)?.parse()?;
    air.backpatch()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Pair, Register};

    #[test]
    fn assemble_and_run() {
        let src = r#"
            ; count down from 3
                    mvi b, 3
            loop:   dcr b
                    jnz loop
                    lxi bc,0x1234h
                    lxi de,0x5678h
                    lxi hl,0x9012h
                    mvi a, 2Ah
                    sta 0x8888h
                    hlt
        "#;
        let asm = assemble(src).unwrap();
        assert_eq!(asm.labels.get("loop"), Some(0x0002));
        assert_eq!(&asm.image[..6], &[0x06, 0x03, 0x05, 0xC2, 0x02, 0x00]);

        let mut state = RunState::from_image(&asm.image);
        assert_eq!(state.run().unwrap(), Status::Halted);
        assert_eq!(state.regs().pair(Pair::Bc), 0x1234);
        assert_eq!(state.regs().pair(Pair::De), 0x5678);
        assert_eq!(state.regs().pair(Pair::Hl), 0x9012);
        assert_eq!(state.regs().get(Register::A), 0x2A);
        assert_eq!(state.memory().read_byte(0x8888), 0x2A);
    }

    #[test]
    fn encodes_immediates() {
        let asm = assemble("MVI a,1\nMVI b,2\n").unwrap();
        assert_eq!(asm.image, vec![0x3E, 0x01, 0x06, 0x02]);
    }

    #[test]
    fn increment_every_register() {
        let src = r#"
            mvi a, 1
            mvi b, 2
            mvi c, 3
            mvi d, 4
            mvi e, 5
            mvi h, 6
            mvi l, 7
            inr a
            inr b
            inr c
            inr d
            inr e
            inr h
            inr l
            hlt
        "#;
        let asm = assemble(src).unwrap();
        assert_eq!(
            &asm.image[..14],
            &[0x3E, 1, 0x06, 2, 0x0E, 3, 0x16, 4, 0x1E, 5, 0x26, 6, 0x2E, 7]
        );

        let mut state = RunState::from_image(&asm.image);
        assert_eq!(state.run().unwrap(), Status::Halted);
        let regs = [
            Register::A,
            Register::B,
            Register::C,
            Register::D,
            Register::E,
            Register::H,
            Register::L,
        ]
        .map(|reg| state.regs().get(reg));
        assert_eq!(regs, [2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn forward_reference() {
        let src = "jmp jump_to\nmvi a, 1\njump_to: mvi a, 2\nhlt\n";
        let asm = assemble(src).unwrap();
        assert_eq!(&asm.image[..3], &[0xC3, 0x05, 0x00]);
        let mut state = RunState::from_image(&asm.image);
        state.run().unwrap();
        assert_eq!(state.regs().get(Register::A), 0x02);
    }

    #[test]
    fn deterministic() {
        let src = "start: lxi sp, 100h\ncall sub\nhlt\nsub: ret\n";
        assert_eq!(assemble(src).unwrap().image, assemble(src).unwrap().image);
    }

    #[test]
    fn errors_carry_line() {
        let err = assemble("nop\nnop\nmvi a, 256").unwrap_err();
        assert!(err.to_string().contains("line 3"));
        let err = assemble("jmp nowhere").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
