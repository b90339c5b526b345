//! The subset of JVM bytecode instructions the IR builder lowers.
//!
//! This mirrors the shape of a real bytecode decoder's output (one variant per
//! opcode, operands already decoded to native integers) without performing any
//! `.class` byte decoding itself — that step is out of scope for this crate.

/// One decoded bytecode instruction. Branch and switch operands are absolute bytecode
/// offsets, matching how a `.class` decoder would already have resolved them from the
/// relative offsets stored in the file.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    IconstM1,
    IconstN(i32),
    LconstN(i64),
    FconstN(f32),
    DconstN(f64),
    Bipush(i8),
    Sipush(i16),
    Ldc { constant_index: u16 },

    Iload(u8),
    Lload(u8),
    Fload(u8),
    Dload(u8),
    Aload(u8),
    Istore(u8),
    Lstore(u8),
    Fstore(u8),
    Dstore(u8),
    Astore(u8),
    Iinc { index: u8, constant: i32 },

    Pop,
    Dup,
    Swap,

    Iadd,
    Ladd,
    Fadd,
    Dadd,
    Isub,
    Lsub,
    Fsub,
    Dsub,
    Imul,
    Lmul,
    Fmul,
    Dmul,
    Idiv,
    Ldiv,
    Fdiv,
    Ddiv,
    Irem,
    Lrem,
    Frem,
    Drem,
    Ineg,
    Lneg,
    Fneg,
    Dneg,
    Ishl,
    Lshl,
    Ishr,
    Lshr,
    Iushr,
    Lushr,
    Iand,
    Land,
    Ior,
    Lor,
    Ixor,
    Lxor,

    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,

    Ifeq(usize),
    Ifne(usize),
    Iflt(usize),
    Ifge(usize),
    Ifgt(usize),
    Ifle(usize),
    IfIcmpeq(usize),
    IfIcmpne(usize),
    IfIcmplt(usize),
    IfIcmpge(usize),
    IfIcmpgt(usize),
    IfIcmple(usize),
    IfAcmpeq(usize),
    IfAcmpne(usize),
    Ifnull(usize),
    Ifnonnull(usize),
    Goto(usize),

    Ireturn,
    Lreturn,
    Freturn,
    Dreturn,
    Areturn,
    Return,

    Getstatic { field_ref_index: u16 },
    Putstatic { field_ref_index: u16 },
    Getfield { field_ref_index: u16 },
    Putfield { field_ref_index: u16 },

    Invokestatic { method_ref_index: u16 },
    Invokespecial { method_ref_index: u16 },
    Invokevirtual { method_ref_index: u16 },

    New { class_index: u16 },

    Monitorenter,
    Monitorexit,
}

impl Instruction {
    /// Returns true if this instruction unconditionally transfers control, meaning
    /// the instruction immediately following it in bytecode order is not reachable by
    /// fall-through.
    #[must_use]
    pub fn changes_control_flow(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_)
                | Instruction::Ireturn
                | Instruction::Lreturn
                | Instruction::Freturn
                | Instruction::Dreturn
                | Instruction::Areturn
                | Instruction::Return
        )
    }

    /// Returns the absolute bytecode offset this instruction branches to, if any.
    #[must_use]
    pub fn branch_target(&self) -> Option<usize> {
        match self {
            Instruction::Ifeq(address)
            | Instruction::Ifne(address)
            | Instruction::Iflt(address)
            | Instruction::Ifge(address)
            | Instruction::Ifgt(address)
            | Instruction::Ifle(address)
            | Instruction::IfIcmpeq(address)
            | Instruction::IfIcmpne(address)
            | Instruction::IfIcmplt(address)
            | Instruction::IfIcmpge(address)
            | Instruction::IfIcmpgt(address)
            | Instruction::IfIcmple(address)
            | Instruction::IfAcmpeq(address)
            | Instruction::IfAcmpne(address)
            | Instruction::Ifnull(address)
            | Instruction::Ifnonnull(address)
            | Instruction::Goto(address) => Some(*address),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
