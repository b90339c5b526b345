//! Operand kinds a pseudo-instruction's register/memory slots can hold (§3).
//!
//! `branch_target(block)` and `rel(absolute_address)` from the distilled operand
//! taxonomy are not modeled here as `Operand` variants: every pseudo-instruction that
//! needs one (`Jmp`, `Jcc`, `CallRel`) carries it as a dedicated field instead, since
//! those operations always take exactly one such operand and never combine it with
//! the register/memory/immediate forms below.

use crate::codegen::register::Register;

/// One operand slot: a register, an immediate, or one of the two addressing modes the
/// emitter can encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Immediate(i32),
    /// `[base + disp]`.
    MemBase { base: Register, disp: i32 },
    /// `[base + index * 2^shift]`.
    MemIndex { base: Register, index: Register, shift: u8 },
}

impl Operand {
    #[must_use]
    pub fn reg(register: Register) -> Operand {
        Operand::Register(register)
    }

    #[must_use]
    pub fn mem(base: Register, disp: i32) -> Operand {
        Operand::MemBase { base, disp }
    }
}
