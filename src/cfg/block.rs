use crate::codegen::PseudoInstruction;
use crate::ir::Statement;

/// Stable identity for a block within its compilation unit. Never reused once
/// assigned; branches reference blocks by this id, not by address.
pub type BlockId = usize;

/// What a block does when control falls off the end of its statement list.
///
/// A block ending in `Return`/`VoidReturn` needs no successor here — that statement
/// is itself the terminator and the selector emits a branch straight to the unit's
/// exit block. A block ending in an `If` carries its false-branch edge as
/// `Fallthrough`, relying on blocks being emitted in program order so no explicit
/// jump is needed; a `goto` target may be any block, so it always gets one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Successor {
    Fallthrough(BlockId),
    Goto(BlockId),
    None,
}

/// A not-yet-resolved branch, recorded on the *target* block so that when the target
/// is emitted, its backpatch list tells the emitter exactly which slots to fill in.
#[derive(Clone, Copy, Debug)]
pub struct BackpatchSite {
    /// Offset, in the compilation unit's code buffer, of the 4-byte displacement
    /// slot to overwrite.
    pub displacement_offset: usize,
    /// Offset of the branch instruction's own first byte.
    pub branch_insn_offset: usize,
    /// `5` for a one-byte opcode, `6` when a `0F` escape prefix is present.
    pub branch_insn_size: i32,
}

/// Maximal straight-line statement sequence with a single entry and (modulo `If`'s
/// two-way split) a single terminator.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub id: BlockId,
    pub statements: Vec<Statement>,
    pub successor: Successor,
    /// Populated by the selector (§4.4); empty until this block has been selected.
    pub instructions: Vec<PseudoInstruction>,
    /// Populated by the emitter (§4.5) once this block is written to the buffer.
    pub offset: Option<usize>,
    pub is_emitted: bool,
    pub backpatch: Vec<BackpatchSite>,
}

impl Default for Successor {
    fn default() -> Self {
        Successor::None
    }
}

impl BasicBlock {
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        BasicBlock { id, ..BasicBlock::default() }
    }
}
