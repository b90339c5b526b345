//! Target-level operations the selector (F) emits and the emitter (G) encodes (§3).

use crate::cfg::BlockId;
use crate::codegen::operand::Operand;
use crate::codegen::register::Register;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOp {
    /// `shl` — left shift, used for both `ishl` and the Ushr/Shr distinction's shared
    /// left-shift case.
    Shl,
    /// `sar` — arithmetic (sign-extending) right shift, Java's `>>`.
    Sar,
    /// `shr` — logical (zero-filling) right shift, Java's `>>>`.
    Shr,
}

/// A signed integer comparison condition, as tested by `jcc` after a `cmp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// One target-level operation. Every variant's operand fields match one of the
/// selector's pattern-table sequences (§4.4); the emitter (§4.5) needs no further
/// knowledge of where an instruction came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PseudoOp {
    Mov { dst: Operand, src: Operand },
    Alu { op: AluOp, dst: Register, src: Operand },
    Cmp { dst: Register, src: Operand },
    /// `cltd`/`cdq`: sign-extends `A` into the pair `(A, B)` ahead of a division.
    Cdq,
    /// `idiv src`: divides `(B:A)` by `src`, quotient in `A`, remainder in `B`.
    Idiv { src: Operand },
    Neg { dst: Register },
    /// Shifts `dst` by the count already loaded into `C` (`shl`/`sar`/`shr %cl, dst`).
    Shift { op: ShiftOp, dst: Register },
    Push { src: Operand },
    Pop { dst: Register },
    /// A call to a fixed address outside this compilation unit's own code buffer
    /// (a method's trampoline stub, or `allocate_object`); recorded as an
    /// external-call relocation rather than an intra-unit displacement.
    CallRel { target: usize },
    /// A register-indirect call (`invokevirtual`'s final dispatch through a loaded
    /// vtable slot) — resolved entirely at runtime, no relocation needed.
    CallReg { target: Register },
    Jmp { target: BlockId },
    Jcc { condition: Condition, target: BlockId },
    Leave,
    Ret,
}

/// One selected operation plus the bookkeeping the emitter and backpatcher need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PseudoInstruction {
    pub op: PseudoOp,
    /// Byte offset this instruction was emitted at; `None` until the emitter visits
    /// it.
    pub offset: Option<usize>,
    /// Set once the emitter has chosen a `0F`-escaped two-byte opcode for this
    /// instruction (only `Jcc` needs the escape, for `jcc rel32`); branch-displacement
    /// arithmetic depends on this being finalized before any backpatch runs.
    pub escaped: bool,
}

impl PseudoInstruction {
    #[must_use]
    pub fn new(op: PseudoOp) -> Self {
        PseudoInstruction { op, offset: None, escaped: false }
    }
}
