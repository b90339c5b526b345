//! Machine-code emitter (component G, §4.5): turns a compilation unit's selected
//! pseudo-instructions into IA-32 bytes, resolving intra-unit branch displacements by
//! backpatching and handing external calls off to the code buffer's relocation list.
//!
//! Blocks are emitted in ascending [`BlockId`] order, which the builder guarantees is
//! program order ([`crate::cfg::block::Successor::Fallthrough`] relies on this same
//! ordering to need no explicit jump). A branch to a block already emitted resolves
//! immediately; a branch to a block not yet emitted queues a [`BackpatchSite`] on the
//! *target* block, which is drained the moment that block's start offset is known.

use crate::buffer::CodeBuffer;
use crate::cfg::{BackpatchSite, BlockId, CompilationUnit};
use crate::codegen::operand::Operand;
use crate::codegen::pseudo_insn::{AluOp, Condition, PseudoOp, ShiftOp};
use crate::codegen::register::Register;
use crate::{Error, Result};

fn fits_i8(value: i32) -> bool {
    i8::try_from(value).is_ok()
}

fn modrm(mode: u8, reg_field: u8, rm: u8) -> u8 {
    (mode << 6) | (reg_field << 3) | rm
}

fn sib(scale: u8, index: u8, base: u8) -> u8 {
    (scale << 6) | (index << 3) | base
}

/// Appends the ModR/M (and, when needed, SIB and displacement) bytes addressing
/// `[base + disp]`, choosing the shortest disp form and forcing the 8-bit
/// displacement whenever `base` is `Fp` — `mod=00, rm=101` is IA-32's disp32-only
/// encoding, not `[ebp]`.
fn emit_membase(buffer: &mut CodeBuffer, reg_field: u8, base: Register, disp: i32) {
    let rm = base.encoding();
    if rm == Register::Sp.encoding() {
        let mode = if base.encoding() == Register::Fp.encoding() {
            1
        } else if disp == 0 {
            0
        } else if fits_i8(disp) {
            1
        } else {
            2
        };
        buffer.push_u8(modrm(mode, reg_field, 4));
        buffer.push_u8(sib(0, 4, 4));
        emit_disp(buffer, mode, disp);
    } else if rm == Register::Fp.encoding() && disp == 0 {
        buffer.push_u8(modrm(1, reg_field, rm));
        buffer.push_u8(0);
    } else {
        let mode = if disp == 0 {
            0
        } else if fits_i8(disp) {
            1
        } else {
            2
        };
        buffer.push_u8(modrm(mode, reg_field, rm));
        emit_disp(buffer, mode, disp);
    }
}

fn emit_disp(buffer: &mut CodeBuffer, mode: u8, disp: i32) {
    match mode {
        1 => buffer.push_u8(disp as i8 as u8),
        2 => buffer.push_i32_le(disp),
        _ => {}
    }
}

/// Appends `[base + index * 2^shift]` — always through a SIB byte, since only SIB
/// encodes a scaled index. `Fp` as `base` hits the same disp32-only trap as above, so
/// it forces an explicit zero `disp8` rather than `mod=00`.
fn emit_memindex(buffer: &mut CodeBuffer, reg_field: u8, base: Register, index: Register, shift: u8) {
    if base.encoding() == Register::Fp.encoding() {
        buffer.push_u8(modrm(1, reg_field, 4));
        buffer.push_u8(sib(shift, index.encoding(), base.encoding()));
        buffer.push_u8(0);
    } else {
        buffer.push_u8(modrm(0, reg_field, 4));
        buffer.push_u8(sib(shift, index.encoding(), base.encoding()));
    }
}

fn emit_modrm_register(buffer: &mut CodeBuffer, reg_field: u8, rm: Register) {
    buffer.push_u8(modrm(3, reg_field, rm.encoding()));
}

/// Appends the ModR/M (+SIB/disp) bytes for a register/memory operand. Immediate
/// operands have no `r/m` form — callers that can see an immediate in this position
/// handle it themselves before reaching here.
fn emit_rm_operand(buffer: &mut CodeBuffer, reg_field: u8, operand: Operand) -> Result<()> {
    match operand {
        Operand::Register(register) => {
            emit_modrm_register(buffer, reg_field, register);
            Ok(())
        }
        Operand::MemBase { base, disp } => {
            emit_membase(buffer, reg_field, base, disp);
            Ok(())
        }
        Operand::MemIndex { base, index, shift } => {
            emit_memindex(buffer, reg_field, base, index, shift);
            Ok(())
        }
        Operand::Immediate(_) => {
            Err(Error::InternalError("immediate used where a register/memory operand was expected".to_string()))
        }
    }
}

fn alu_group1_digit(op: AluOp) -> u8 {
    match op {
        AluOp::Add => 0,
        AluOp::Or => 1,
        AluOp::And => 4,
        AluOp::Sub => 5,
        AluOp::Xor => 6,
    }
}

fn alu_reg_form_opcode(op: AluOp) -> u8 {
    // `r32, r/m32` form of each group-1 operator (the `/r` variant one step past the
    // operator's `r/m32, r32` opcode).
    match op {
        AluOp::Add => 0x03,
        AluOp::Or => 0x0B,
        AluOp::And => 0x23,
        AluOp::Sub => 0x2B,
        AluOp::Xor => 0x33,
    }
}

fn shift_group2_digit(op: ShiftOp) -> u8 {
    match op {
        ShiftOp::Shl => 4,
        ShiftOp::Shr => 5,
        ShiftOp::Sar => 7,
    }
}

fn jcc_opcode(condition: Condition) -> u8 {
    match condition {
        Condition::Equal => 0x84,
        Condition::NotEqual => 0x85,
        Condition::Less => 0x8C,
        Condition::LessOrEqual => 0x8E,
        Condition::Greater => 0x8F,
        Condition::GreaterOrEqual => 0x8D,
    }
}

/// Emits every block of `unit` into a fresh [`CodeBuffer`], in ascending block-id
/// (program) order, and returns that buffer ready for [`CodeBuffer::finalize`].
///
/// # Errors
///
/// Returns [`Error::InternalError`] if a pseudo-instruction's operand shape violates
/// an encoding invariant the selector is supposed to guarantee (e.g. an immediate used
/// as a memory operand), or if a branch displacement overflows a 32-bit signed
/// integer.
pub fn emit_unit(unit: &mut CompilationUnit) -> Result<CodeBuffer> {
    let mut buffer = CodeBuffer::new();
    for block_id in 0..unit.blocks.len() {
        emit_block(unit, block_id, &mut buffer)?;
    }
    Ok(buffer)
}

fn emit_block(unit: &mut CompilationUnit, block_id: BlockId, buffer: &mut CodeBuffer) -> Result<()> {
    let start_offset = buffer.offset();
    unit.blocks[block_id].offset = Some(start_offset);

    let backpatches = std::mem::take(&mut unit.blocks[block_id].backpatch);
    for site in backpatches {
        let rel32 = branch_displacement(start_offset, &site)?;
        buffer.patch_i32_le(site.displacement_offset, rel32)?;
    }
    unit.blocks[block_id].is_emitted = true;

    for idx in 0..unit.blocks[block_id].instructions.len() {
        emit_instruction(unit, block_id, idx, buffer)?;
    }
    Ok(())
}

fn branch_displacement(target_offset: usize, site: &BackpatchSite) -> Result<i32> {
    let next_instruction = site.branch_insn_offset as i64 + i64::from(site.branch_insn_size);
    let displacement = target_offset as i64 - next_instruction;
    i32::try_from(displacement)
        .map_err(|_| Error::InternalError("branch displacement overflowed i32".to_string()))
}

fn emit_instruction(unit: &mut CompilationUnit, block_id: BlockId, idx: usize, buffer: &mut CodeBuffer) -> Result<()> {
    let op = unit.blocks[block_id].instructions[idx].op;
    let insn_offset = buffer.offset();
    unit.blocks[block_id].instructions[idx].offset = Some(insn_offset);

    match op {
        PseudoOp::Jmp { target } => {
            buffer.push_u8(0xE9);
            let displacement_offset = buffer.offset();
            buffer.push_i32_le(0);
            emit_branch(unit, target, insn_offset, 5, displacement_offset, buffer)?;
        }
        PseudoOp::Jcc { condition, target } => {
            buffer.push_u8(0x0F);
            buffer.push_u8(jcc_opcode(condition));
            let displacement_offset = buffer.offset();
            buffer.push_i32_le(0);
            unit.blocks[block_id].instructions[idx].escaped = true;
            emit_branch(unit, target, insn_offset, 6, displacement_offset, buffer)?;
        }
        other => emit_non_branch(buffer, other)?,
    }
    Ok(())
}

fn emit_branch(
    unit: &mut CompilationUnit,
    target: BlockId,
    branch_insn_offset: usize,
    branch_insn_size: i32,
    displacement_offset: usize,
    buffer: &mut CodeBuffer,
) -> Result<()> {
    if unit.blocks[target].is_emitted {
        let target_offset = unit.blocks[target].offset.ok_or_else(|| {
            Error::InternalError("block marked emitted but has no offset".to_string())
        })?;
        let site = BackpatchSite { displacement_offset, branch_insn_offset, branch_insn_size };
        let rel32 = branch_displacement(target_offset, &site)?;
        buffer.patch_i32_le(displacement_offset, rel32)?;
    } else {
        unit.blocks[target].backpatch.push(BackpatchSite {
            displacement_offset,
            branch_insn_offset,
            branch_insn_size,
        });
    }
    Ok(())
}

fn emit_non_branch(buffer: &mut CodeBuffer, op: PseudoOp) -> Result<()> {
    match op {
        PseudoOp::Mov { dst, src } => emit_mov(buffer, dst, src)?,
        PseudoOp::Alu { op, dst, src } => emit_alu(buffer, op, dst, src)?,
        PseudoOp::Cmp { dst, src } => emit_cmp(buffer, dst, src)?,
        PseudoOp::Cdq => buffer.push_u8(0x99),
        PseudoOp::Idiv { src } => {
            buffer.push_u8(0xF7);
            emit_rm_operand(buffer, 7, src)?;
        }
        PseudoOp::Neg { dst } => {
            buffer.push_u8(0xF7);
            emit_modrm_register(buffer, 3, dst);
        }
        PseudoOp::Shift { op, dst } => {
            buffer.push_u8(0xD3);
            emit_modrm_register(buffer, shift_group2_digit(op), dst);
        }
        PseudoOp::Push { src } => emit_push(buffer, src)?,
        PseudoOp::Pop { dst } => buffer.push_u8(0x58 + dst.encoding()),
        PseudoOp::CallRel { target } => {
            buffer.reserve_external_call(0xE8, target);
        }
        PseudoOp::CallReg { target } => {
            buffer.push_u8(0xFF);
            emit_modrm_register(buffer, 2, target);
        }
        PseudoOp::Leave => buffer.push_u8(0xC9),
        PseudoOp::Ret => buffer.push_u8(0xC3),
        PseudoOp::Jmp { .. } | PseudoOp::Jcc { .. } => {
            return Err(Error::InternalError("branch op reached emit_non_branch".to_string()));
        }
    }
    Ok(())
}

fn emit_mov(buffer: &mut CodeBuffer, dst: Operand, src: Operand) -> Result<()> {
    match (dst, src) {
        (Operand::Register(reg), Operand::Immediate(value)) => {
            buffer.push_u8(0xB8 + reg.encoding());
            buffer.push_i32_le(value);
        }
        (Operand::Register(reg), other) => {
            buffer.push_u8(0x8B);
            emit_rm_operand(buffer, reg.encoding(), other)?;
        }
        (other, Operand::Register(reg)) => {
            buffer.push_u8(0x89);
            emit_rm_operand(buffer, reg.encoding(), other)?;
        }
        (other, Operand::Immediate(value)) => {
            buffer.push_u8(0xC7);
            emit_rm_operand(buffer, 0, other)?;
            buffer.push_i32_le(value);
        }
        _ => return Err(Error::InternalError("mov between two memory operands is not encodable".to_string())),
    }
    Ok(())
}

fn emit_alu(buffer: &mut CodeBuffer, op: AluOp, dst: Register, src: Operand) -> Result<()> {
    match src {
        Operand::Immediate(value) => {
            buffer.push_u8(0x81);
            emit_modrm_register(buffer, alu_group1_digit(op), dst);
            buffer.push_i32_le(value);
        }
        other => {
            buffer.push_u8(alu_reg_form_opcode(op));
            emit_rm_operand(buffer, dst.encoding(), other)?;
        }
    }
    Ok(())
}

fn emit_cmp(buffer: &mut CodeBuffer, dst: Register, src: Operand) -> Result<()> {
    match src {
        Operand::Immediate(value) => {
            buffer.push_u8(0x81);
            emit_modrm_register(buffer, 7, dst);
            buffer.push_i32_le(value);
        }
        other => {
            buffer.push_u8(0x3B);
            emit_rm_operand(buffer, dst.encoding(), other)?;
        }
    }
    Ok(())
}

fn emit_push(buffer: &mut CodeBuffer, src: Operand) -> Result<()> {
    match src {
        Operand::Register(reg) => buffer.push_u8(0x50 + reg.encoding()),
        Operand::Immediate(value) => {
            buffer.push_u8(0x68);
            buffer.push_i32_le(value);
        }
        other @ (Operand::MemBase { .. } | Operand::MemIndex { .. }) => {
            buffer.push_u8(0xFF);
            emit_rm_operand(buffer, 6, other)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{BasicBlock, Successor};
    use crate::runtime::VmMethod;
    use crate::trampoline::Trampoline;
    use crate::value::VmType;
    use std::sync::Arc;

    fn sample_unit(blocks: Vec<BasicBlock>, exit_block: BlockId) -> CompilationUnit {
        let method = Arc::new(VmMethod {
            declaring_class: "com/example/Adder".to_string(),
            name: "add".to_string(),
            descriptor: "(II)I".to_string(),
            parameter_types: vec![VmType::Int, VmType::Int],
            return_type: VmType::Int,
            is_static: true,
            max_locals: 2,
            code: Vec::new(),
            virtual_index: None,
            trampoline: Arc::new(Trampoline::new(0x1000)),
        });
        CompilationUnit { method, entry_block: 0, exit_block, blocks, trampoline: Arc::new(Trampoline::new(0x1000)) }
    }

    #[test]
    fn test_mov_immediate_to_register() {
        let mut buffer = CodeBuffer::new();
        emit_mov(&mut buffer, Operand::Register(Register::A), Operand::Immediate(42)).expect("encode");
        let region = buffer.finalize().expect("finalize");
        assert!(region.base() != 0);
    }

    #[test]
    fn test_forward_jump_is_backpatched() {
        let mut entry = BasicBlock::new(0);
        entry.instructions.push(pseudo_instruction(PseudoOp::Jmp { target: 1 }));
        entry.successor = Successor::None;
        let mut target = BasicBlock::new(1);
        target.instructions.push(pseudo_instruction(PseudoOp::Ret));
        target.successor = Successor::None;

        let mut unit = sample_unit(vec![entry, target], 1);
        let buffer = emit_unit(&mut unit).expect("emit");
        assert_eq!(unit.blocks[0].instructions[0].offset, Some(0));
        // jmp (5 bytes) then ret at offset 5.
        assert_eq!(unit.blocks[1].offset, Some(5));
        let region = buffer.finalize().expect("finalize");
        assert!(region.base() != 0);
    }

    #[test]
    fn test_block_and_instruction_offsets_are_monotonic() {
        let mut block0 = BasicBlock::new(0);
        block0.instructions.push(pseudo_instruction(PseudoOp::Mov {
            dst: Operand::Register(Register::A),
            src: Operand::Immediate(1),
        }));
        block0.instructions.push(pseudo_instruction(PseudoOp::Mov {
            dst: Operand::Register(Register::B),
            src: Operand::Immediate(2),
        }));
        block0.successor = Successor::Fallthrough(1);

        let mut block1 = BasicBlock::new(1);
        block1.instructions.push(pseudo_instruction(PseudoOp::Ret));
        block1.successor = Successor::None;

        let mut unit = sample_unit(vec![block0, block1], 1);
        emit_unit(&mut unit).expect("emit");

        let first_insn_offsets: Vec<usize> =
            unit.blocks[0].instructions.iter().map(|insn| insn.offset.expect("offset set")).collect();
        assert!(first_insn_offsets.windows(2).all(|pair| pair[0] < pair[1]));

        let block0_offset = unit.blocks[0].offset.expect("block 0 offset set");
        let block1_offset = unit.blocks[1].offset.expect("block 1 offset set");
        assert!(block0_offset < block1_offset);
    }

    fn pseudo_instruction(op: PseudoOp) -> crate::codegen::pseudo_insn::PseudoInstruction {
        crate::codegen::pseudo_insn::PseudoInstruction::new(op)
    }

    #[test]
    fn test_branch_displacement_is_patched_correctly() {
        // block0: an unescaped 5-byte `jmp` to block2.
        let mut block0 = BasicBlock::new(0);
        block0.instructions.push(pseudo_instruction(PseudoOp::Jmp { target: 2 }));
        block0.successor = Successor::None;

        // block1: padding, then an escaped 6-byte `jcc` to block2, then more padding —
        // so the target sits neither right after the `jmp` nor right after the `jcc`.
        let mut block1 = BasicBlock::new(1);
        block1.instructions.push(pseudo_instruction(PseudoOp::Mov {
            dst: Operand::Register(Register::A),
            src: Operand::Immediate(1),
        }));
        block1.instructions.push(pseudo_instruction(PseudoOp::Jcc { condition: Condition::Equal, target: 2 }));
        block1.instructions.push(pseudo_instruction(PseudoOp::Mov {
            dst: Operand::Register(Register::B),
            src: Operand::Immediate(2),
        }));
        block1.successor = Successor::Fallthrough(2);

        let mut block2 = BasicBlock::new(2);
        block2.instructions.push(pseudo_instruction(PseudoOp::Ret));
        block2.successor = Successor::None;

        let mut unit = sample_unit(vec![block0, block1, block2], 2);
        let buffer = emit_unit(&mut unit).expect("emit");

        let jmp_insn_offset = unit.blocks[0].instructions[0].offset.expect("jmp offset set");
        let jcc_insn_offset = unit.blocks[1].instructions[1].offset.expect("jcc offset set");
        let target_offset = unit.blocks[2].offset.expect("target block offset set");

        let jmp_displacement_offset = jmp_insn_offset + 1;
        let jmp_rel32 = buffer.read_i32_le(jmp_displacement_offset);
        assert_eq!(jmp_rel32, target_offset as i32 - (jmp_insn_offset as i32 + 5));

        let jcc_displacement_offset = jcc_insn_offset + 2;
        let jcc_rel32 = buffer.read_i32_le(jcc_displacement_offset);
        assert_eq!(jcc_rel32, target_offset as i32 - (jcc_insn_offset as i32 + 6));

        // Sanity check that the two branches actually land at different patch sites
        // with different displacements, so neither assertion above is vacuously true.
        assert_ne!(jmp_rel32, 0);
        assert_ne!(jcc_rel32, 0);
        assert_ne!(jmp_rel32, jcc_rel32);
    }
}
