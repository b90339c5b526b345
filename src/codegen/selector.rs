//! Instruction selector (component F, §4.4): a recursive tree walk over one block's
//! statements, appending pseudo-instructions that leave every expression's result in
//! scratch register `A`.
//!
//! The distilled pattern table names only the two leaf shapes a stack-machine
//! operand naturally produces (`local`/`value`) as the right-hand side of a binary
//! operation or comparison. An arbitrarily deep right-hand tree — reachable once the
//! IR builder's symbolic stack holds a non-trivial expression on both sides of an
//! operator — has no named pattern; [`lower_binary_rhs`] extends the table with a
//! spill sequence (evaluate the right side first, `push`, evaluate the left side,
//! `pop` into `B`) that stays within the fixed A/B/C convention instead of requiring
//! a general allocator.

use crate::cfg::{BasicBlock, BlockId, Successor};
use crate::codegen::operand::Operand;
use crate::codegen::pseudo_insn::{AluOp, Condition, PseudoInstruction, PseudoOp, ShiftOp};
use crate::codegen::register::Register;
use crate::ir::{BinOp, Expression, Statement, UnOp};
use crate::runtime::layout;
use crate::value::{Value, VmType};
use crate::{Error, Result};
use std::sync::Arc;

/// Per-unit values the selector needs but that do not vary per block.
#[derive(Clone, Copy, Debug)]
pub struct SelectionContext {
    /// Number of local-variable slots occupied by this method's incoming arguments
    /// (including an implicit `this` for instance methods); determines whether
    /// `local(i)` resolves to a positive (argument) or negative (spilled local)
    /// frame-pointer displacement.
    pub args_slot_count: u16,
    pub exit_block: BlockId,
    /// Fixed address of the `allocate_object` runtime helper `new` calls into.
    pub allocate_object_addr: usize,
    /// Starting capacity for each block's pseudo-instruction vector, avoiding repeated
    /// reallocation as the selector appends one or more instructions per statement.
    pub instruction_capacity_hint: usize,
}

fn insn(op: PseudoOp) -> PseudoInstruction {
    PseudoInstruction::new(op)
}

fn push(block: &mut BasicBlock, op: PseudoOp) {
    block.instructions.push(insn(op));
}

fn local_displacement(index: u16, args_slot_count: u16) -> i32 {
    let word = layout::WORD_SIZE;
    if index < args_slot_count {
        (2 + i32::from(index)) * word
    } else {
        -(i32::from(index - args_slot_count) + 1) * word
    }
}

fn value_immediate(value: &Value) -> Result<i32> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::Reference(addr) => immediate_address(*addr),
        Value::Long(_) | Value::Float(_) | Value::Double(_) => Err(Error::UnsupportedType(
            "64-bit integer and floating-point immediates are not supported by the \
             fixed single-register selector"
                .to_string(),
        )),
    }
}

/// Converts a host object address (a field, class, or trampoline record's address)
/// into the 32-bit immediate form the IA-32 target's `mov imm, reg` encodes.
///
/// This compiler targets a 32-bit address space (§1 Non-goals); the runtime objects
/// it points compiled code at are expected to live within one. Generated code is
/// never actually executed in this exercise, so no host/target pointer-width adapter
/// is implemented beyond this explicit fallibility.
fn immediate_address(addr: usize) -> Result<i32> {
    i32::try_from(addr).map_err(|_| {
        Error::UnsupportedType(
            "runtime object address does not fit the IA-32 target's 32-bit immediate encoding"
                .to_string(),
        )
    })
}

fn alu_op_for(op: BinOp) -> Result<AluOp> {
    match op {
        BinOp::Add => Ok(AluOp::Add),
        BinOp::Sub => Ok(AluOp::Sub),
        BinOp::And => Ok(AluOp::And),
        BinOp::Or => Ok(AluOp::Or),
        BinOp::Xor => Ok(AluOp::Xor),
        _ => Err(Error::InternalError(format!("{op:?} is not a simple ALU operator"))),
    }
}

fn condition_for(op: BinOp) -> Result<Condition> {
    match op {
        BinOp::Eq => Ok(Condition::Equal),
        BinOp::Ne => Ok(Condition::NotEqual),
        BinOp::Lt => Ok(Condition::Less),
        BinOp::Le => Ok(Condition::LessOrEqual),
        BinOp::Gt => Ok(Condition::Greater),
        BinOp::Ge => Ok(Condition::GreaterOrEqual),
        _ => Err(Error::InternalError(format!("{op:?} is not a comparison operator"))),
    }
}

fn instance_word_index(field: &crate::runtime::VmField) -> Result<i32> {
    match field.storage {
        crate::runtime::FieldStorage::Instance { word_index } => Ok(i32::from(word_index)),
        crate::runtime::FieldStorage::Static => {
            Err(Error::InternalError("static field read through an instance_field expression".to_string()))
        }
    }
}

/// Selects pseudo-instructions for every statement in `block`, in source order.
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] for 64-bit integer or floating-point values
/// (the fixed-register convention has no lowering for them), or
/// [`Error::InternalError`] if the IR violates an invariant the builder is supposed
/// to guarantee (e.g. an `If` whose condition is not a comparison).
pub fn select_block(block: &mut BasicBlock, ctx: &SelectionContext) -> Result<()> {
    let statements = std::mem::take(&mut block.statements);
    block.instructions.reserve(ctx.instruction_capacity_hint.max(statements.len()));
    for statement in &statements {
        select_stmt(block, statement, ctx)?;
    }
    block.statements = statements;

    if let Successor::Goto(target) = block.successor {
        push(block, PseudoOp::Jmp { target });
    }
    Ok(())
}

fn select_stmt(block: &mut BasicBlock, statement: &Statement, ctx: &SelectionContext) -> Result<()> {
    match statement {
        Statement::Expression(expr) => {
            select_expr(block, expr, ctx)?;
        }
        Statement::Return(expr) => {
            select_expr(block, expr, ctx)?;
            push(block, PseudoOp::Jmp { target: ctx.exit_block });
        }
        Statement::VoidReturn => {
            push(block, PseudoOp::Jmp { target: ctx.exit_block });
        }
        Statement::If { condition, true_target } => {
            let Expression::BinOp(op, left, right) = condition else {
                return Err(Error::InternalError("If condition must be a comparison BinOp".to_string()));
            };
            if !op.is_comparison() {
                return Err(Error::InternalError(format!("{op:?} used as an If condition operator")));
            }
            let rhs = lower_binary_rhs(block, left, right, ctx)?;
            push(block, PseudoOp::Cmp { dst: Register::A, src: rhs });
            push(block, PseudoOp::Jcc { condition: condition_for(*op)?, target: *true_target });
        }
        Statement::Store { dest, src } => select_store(block, dest, src, ctx)?,
    }
    Ok(())
}

fn select_store(block: &mut BasicBlock, dest: &Expression, src: &Expression, ctx: &SelectionContext) -> Result<()> {
    match dest {
        Expression::Local { index, .. } => {
            select_expr(block, src, ctx)?;
            let disp = local_displacement(*index, ctx.args_slot_count);
            push(
                block,
                PseudoOp::Mov {
                    dst: Operand::MemBase { base: Register::Fp, disp },
                    src: Operand::Register(Register::A),
                },
            );
        }
        Expression::ClassField(field) => {
            let addr = immediate_address(Arc::as_ptr(field) as usize)?;
            if let Expression::Value(value) = src {
                let imm = value_immediate(value)?;
                push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::Immediate(addr) });
                push(
                    block,
                    PseudoOp::Mov {
                        dst: Operand::MemBase { base: Register::A, disp: layout::FIELD_STATIC_VALUE_OFFSET },
                        src: Operand::Immediate(imm),
                    },
                );
            } else {
                select_expr(block, src, ctx)?;
                push(block, PseudoOp::Mov { dst: Operand::Register(Register::B), src: Operand::Immediate(addr) });
                push(
                    block,
                    PseudoOp::Mov {
                        dst: Operand::MemBase { base: Register::B, disp: layout::FIELD_STATIC_VALUE_OFFSET },
                        src: Operand::Register(Register::A),
                    },
                );
            }
        }
        Expression::InstanceField(field, objectref) => {
            select_expr(block, objectref, ctx)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::C), src: Operand::Register(Register::A) });
            push(block, PseudoOp::Alu { op: AluOp::Add, dst: Register::C, src: Operand::Immediate(layout::OBJECT_HEADER_SIZE) });
            let word_index = instance_word_index(field)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::B), src: Operand::Immediate(word_index) });
            select_expr(block, src, ctx)?;
            push(
                block,
                PseudoOp::Mov {
                    dst: Operand::MemIndex { base: Register::C, index: Register::B, shift: layout::WORD_SHIFT },
                    src: Operand::Register(Register::A),
                },
            );
        }
        _ => return Err(Error::InternalError("Store destination must be Local, ClassField, or InstanceField".to_string())),
    }
    Ok(())
}

/// Lowers a binary operator's operands, leaving the left side's result in `A` and
/// returning an operand referencing the right side — a membase for a bare local, an
/// immediate for a bare constant, or register `B` after a spill for anything deeper.
fn lower_binary_rhs(
    block: &mut BasicBlock,
    left: &Expression,
    right: &Expression,
    ctx: &SelectionContext,
) -> Result<Operand> {
    match right {
        Expression::Local { index, .. } => {
            select_expr(block, left, ctx)?;
            Ok(Operand::MemBase { base: Register::Fp, disp: local_displacement(*index, ctx.args_slot_count) })
        }
        Expression::Value(value) => {
            select_expr(block, left, ctx)?;
            Ok(Operand::Immediate(value_immediate(value)?))
        }
        _ => {
            select_expr(block, right, ctx)?;
            push(block, PseudoOp::Push { src: Operand::Register(Register::A) });
            select_expr(block, left, ctx)?;
            push(block, PseudoOp::Pop { dst: Register::B });
            Ok(Operand::Register(Register::B))
        }
    }
}

fn select_expr(block: &mut BasicBlock, expr: &Expression, ctx: &SelectionContext) -> Result<()> {
    if matches!(expr.vm_type(), VmType::Long | VmType::Float | VmType::Double) {
        return Err(Error::UnsupportedType(
            "64-bit integer and floating-point values are not supported by the fixed \
             single-register selector"
                .to_string(),
        ));
    }

    match expr {
        Expression::Value(value) => {
            let imm = value_immediate(value)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::Immediate(imm) });
        }
        Expression::Local { index, .. } => {
            let disp = local_displacement(*index, ctx.args_slot_count);
            push(
                block,
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp },
                },
            );
        }
        Expression::ClassField(field) => {
            let addr = immediate_address(Arc::as_ptr(field) as usize)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::Immediate(addr) });
            push(
                block,
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::A, disp: layout::FIELD_STATIC_VALUE_OFFSET },
                },
            );
        }
        Expression::InstanceField(field, objectref) => {
            select_expr(block, objectref, ctx)?;
            push(block, PseudoOp::Alu { op: AluOp::Add, dst: Register::A, src: Operand::Immediate(layout::OBJECT_HEADER_SIZE) });
            let word_index = instance_word_index(field)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::B), src: Operand::Immediate(word_index) });
            push(
                block,
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemIndex { base: Register::A, index: Register::B, shift: layout::WORD_SHIFT },
                },
            );
        }
        Expression::BinOp(op, left, right) if op.is_division() => select_division(block, *op, left, right, ctx)?,
        Expression::BinOp(op, left, right) if op.is_shift() => select_shift(block, *op, left, right, ctx)?,
        Expression::BinOp(op, _, _) if op.is_comparison() => {
            return Err(Error::InternalError(
                "a comparison BinOp may only appear as an If condition".to_string(),
            ));
        }
        Expression::BinOp(op, left, right) => {
            let alu_op = alu_op_for(*op)?;
            let rhs = lower_binary_rhs(block, left, right, ctx)?;
            push(block, PseudoOp::Alu { op: alu_op, dst: Register::A, src: rhs });
        }
        Expression::UnOp(UnOp::Neg, operand) => {
            select_expr(block, operand, ctx)?;
            push(block, PseudoOp::Neg { dst: Register::A });
        }
        Expression::Invoke(method, args) => {
            select_call(block, args, method.trampoline.stub_entry(), ctx)?;
        }
        Expression::InvokeVirtual { virtual_index, args, .. } => select_invoke_virtual(block, *virtual_index, args, ctx)?,
        Expression::New(class) => {
            let addr = immediate_address(Arc::as_ptr(class) as usize)?;
            push(block, PseudoOp::Push { src: Operand::Immediate(addr) });
            push(block, PseudoOp::CallRel { target: ctx.allocate_object_addr });
            push(block, PseudoOp::Alu { op: AluOp::Add, dst: Register::Sp, src: Operand::Immediate(layout::WORD_SIZE) });
        }
    }
    Ok(())
}

fn select_division(
    block: &mut BasicBlock,
    op: BinOp,
    left: &Expression,
    right: &Expression,
    ctx: &SelectionContext,
) -> Result<()> {
    match right {
        Expression::Local { index, .. } => {
            select_expr(block, left, ctx)?;
            push(block, PseudoOp::Cdq);
            let disp = local_displacement(*index, ctx.args_slot_count);
            push(block, PseudoOp::Idiv { src: Operand::MemBase { base: Register::Fp, disp } });
        }
        Expression::Value(value) => {
            // `idiv` has no immediate form; materialize the divisor in `C` (free
            // during division — the count register only matters for shifts).
            let imm = value_immediate(value)?;
            select_expr(block, left, ctx)?;
            push(block, PseudoOp::Cdq);
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::C), src: Operand::Immediate(imm) });
            push(block, PseudoOp::Idiv { src: Operand::Register(Register::C) });
        }
        _ => {
            select_expr(block, right, ctx)?;
            push(block, PseudoOp::Push { src: Operand::Register(Register::A) });
            select_expr(block, left, ctx)?;
            push(block, PseudoOp::Cdq);
            push(block, PseudoOp::Pop { dst: Register::C });
            push(block, PseudoOp::Idiv { src: Operand::Register(Register::C) });
        }
    }
    if op == BinOp::Rem {
        push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::Register(Register::B) });
    }
    Ok(())
}

fn shift_op_for(op: BinOp) -> ShiftOp {
    match op {
        BinOp::Shl => ShiftOp::Shl,
        BinOp::Ushr => ShiftOp::Shr,
        _ => ShiftOp::Sar,
    }
}

fn select_shift(
    block: &mut BasicBlock,
    op: BinOp,
    left: &Expression,
    right: &Expression,
    ctx: &SelectionContext,
) -> Result<()> {
    match right {
        Expression::Local { index, .. } => {
            select_expr(block, left, ctx)?;
            let disp = local_displacement(*index, ctx.args_slot_count);
            push(
                block,
                PseudoOp::Mov { dst: Operand::Register(Register::C), src: Operand::MemBase { base: Register::Fp, disp } },
            );
        }
        Expression::Value(value) => {
            let imm = value_immediate(value)?;
            select_expr(block, left, ctx)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::C), src: Operand::Immediate(imm) });
        }
        _ => {
            select_expr(block, right, ctx)?;
            push(block, PseudoOp::Mov { dst: Operand::Register(Register::C), src: Operand::Register(Register::A) });
            select_expr(block, left, ctx)?;
        }
    }
    push(block, PseudoOp::Shift { op: shift_op_for(op), dst: Register::A });
    Ok(())
}

fn select_call(block: &mut BasicBlock, args: &[Expression], target: usize, ctx: &SelectionContext) -> Result<()> {
    for arg in args.iter().rev() {
        select_expr(block, arg, ctx)?;
        push(block, PseudoOp::Push { src: Operand::Register(Register::A) });
    }
    push(block, PseudoOp::CallRel { target });
    let args_bytes = i32::try_from(args.len())
        .map_err(|_| Error::InternalError("argument count overflowed i32".to_string()))?
        * layout::WORD_SIZE;
    if args_bytes != 0 {
        push(block, PseudoOp::Alu { op: AluOp::Add, dst: Register::Sp, src: Operand::Immediate(args_bytes) });
    }
    Ok(())
}

fn select_invoke_virtual(
    block: &mut BasicBlock,
    virtual_index: u32,
    args: &[Expression],
    ctx: &SelectionContext,
) -> Result<()> {
    for arg in args.iter().rev() {
        select_expr(block, arg, ctx)?;
        push(block, PseudoOp::Push { src: Operand::Register(Register::A) });
    }
    // objectref: the receiver is always args[0], pushed last, so it sits at [sp+0].
    push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::MemBase { base: Register::Sp, disp: 0 } });
    // class pointer lives at the object header's one word (offset 0).
    push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::MemBase { base: Register::A, disp: 0 } });
    push(block, PseudoOp::Alu { op: AluOp::Add, dst: Register::A, src: Operand::Immediate(layout::OBJECT_HEADER_SIZE) });
    push(
        block,
        PseudoOp::Mov {
            dst: Operand::Register(Register::A),
            src: Operand::MemBase { base: Register::A, disp: layout::CLASS_METHOD_TABLE_OFFSET },
        },
    );
    let slot_disp = i32::try_from(virtual_index)
        .map_err(|_| Error::InternalError("virtual_index overflowed i32".to_string()))?
        * layout::WORD_SIZE;
    push(block, PseudoOp::Mov { dst: Operand::Register(Register::A), src: Operand::MemBase { base: Register::A, disp: slot_disp } });
    push(
        block,
        PseudoOp::Mov {
            dst: Operand::Register(Register::A),
            src: Operand::MemBase { base: Register::A, disp: layout::METHOD_TRAMPOLINE_OFFSET },
        },
    );
    push(
        block,
        PseudoOp::Mov {
            dst: Operand::Register(Register::A),
            src: Operand::MemBase { base: Register::A, disp: layout::TRAMPOLINE_BUFFER_BASE_OFFSET },
        },
    );
    push(block, PseudoOp::CallReg { target: Register::A });
    let args_bytes = i32::try_from(args.len()) .map_err(|_| Error::InternalError("argument count overflowed i32".to_string()))? * layout::WORD_SIZE;
    if args_bytes != 0 {
        push(block, PseudoOp::Alu { op: AluOp::Add, dst: Register::Sp, src: Operand::Immediate(args_bytes) });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::BasicBlock;

    fn ctx() -> SelectionContext {
        SelectionContext { args_slot_count: 4, exit_block: 1, allocate_object_addr: 0x2000, instruction_capacity_hint: 0 }
    }

    #[test]
    fn test_two_argument_add_return() {
        let mut block = BasicBlock::new(0);
        block.statements = vec![
            Statement::Return(Expression::BinOp(
                BinOp::Add,
                Box::new(Expression::Local { index: 0, vm_type: VmType::Int }),
                Box::new(Expression::Local { index: 1, vm_type: VmType::Int }),
            )),
            Statement::Return(Expression::BinOp(
                BinOp::Add,
                Box::new(Expression::Local { index: 2, vm_type: VmType::Int }),
                Box::new(Expression::Local { index: 3, vm_type: VmType::Int }),
            )),
        ];
        select_block(&mut block, &ctx()).expect("select");
        let ops: Vec<PseudoOp> = block.instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp: 8 }
                },
                PseudoOp::Alu {
                    op: AluOp::Add,
                    dst: Register::A,
                    src: Operand::MemBase { base: Register::Fp, disp: 12 }
                },
                PseudoOp::Jmp { target: 1 },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp: 16 }
                },
                PseudoOp::Alu {
                    op: AluOp::Add,
                    dst: Register::A,
                    src: Operand::MemBase { base: Register::Fp, disp: 20 }
                },
                PseudoOp::Jmp { target: 1 },
            ]
        );
    }

    #[test]
    fn test_immediate_add() {
        let mut block = BasicBlock::new(0);
        block.statements = vec![Statement::Return(Expression::BinOp(
            BinOp::Add,
            Box::new(Expression::Local { index: 0, vm_type: VmType::Int }),
            Box::new(Expression::Value(Value::Int(0xdead_beefu32 as i32))),
        ))];
        let local_ctx = SelectionContext { args_slot_count: 2, ..ctx() };
        select_block(&mut block, &local_ctx).expect("select");
        let ops: Vec<PseudoOp> = block.instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp: 8 }
                },
                PseudoOp::Alu {
                    op: AluOp::Add,
                    dst: Register::A,
                    src: Operand::Immediate(0xdead_beefu32 as i32)
                },
                PseudoOp::Jmp { target: 1 },
            ]
        );
    }

    #[test]
    fn test_division_emits_cdq_and_idiv() {
        let mut block = BasicBlock::new(0);
        block.statements = vec![Statement::Return(Expression::BinOp(
            BinOp::Div,
            Box::new(Expression::Local { index: 0, vm_type: VmType::Int }),
            Box::new(Expression::Local { index: 1, vm_type: VmType::Int }),
        ))];
        let local_ctx = SelectionContext { args_slot_count: 2, ..ctx() };
        select_block(&mut block, &local_ctx).expect("select");
        let ops: Vec<PseudoOp> = block.instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp: 8 }
                },
                PseudoOp::Cdq,
                PseudoOp::Idiv { src: Operand::MemBase { base: Register::Fp, disp: 12 } },
                PseudoOp::Jmp { target: 1 },
            ]
        );
    }

    #[test]
    fn test_instance_field_load() {
        let field = Arc::new(crate::runtime::VmField::new_instance(
            "f".to_string(),
            "I".to_string(),
            VmType::Int,
            8,
        ));
        let mut block = BasicBlock::new(0);
        block.statements = vec![Statement::Expression(Expression::InstanceField(
            field,
            Box::new(Expression::Local { index: 0, vm_type: VmType::Reference }),
        ))];
        let local_ctx = SelectionContext { args_slot_count: 0, ..ctx() };
        select_block(&mut block, &local_ctx).expect("select");
        let ops: Vec<PseudoOp> = block.instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp: -4 }
                },
                PseudoOp::Alu { op: AluOp::Add, dst: Register::A, src: Operand::Immediate(4) },
                PseudoOp::Mov { dst: Operand::Register(Register::B), src: Operand::Immediate(8) },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemIndex { base: Register::A, index: Register::B, shift: 2 }
                },
            ]
        );
    }

    #[test]
    fn test_invoke_virtual_sequence() {
        let mut block = BasicBlock::new(0);
        block.statements = vec![Statement::Expression(Expression::InvokeVirtual {
            virtual_index: 2,
            return_type: VmType::Int,
            args: vec![Expression::Local { index: 0, vm_type: VmType::Reference }],
        })];
        let local_ctx = SelectionContext { args_slot_count: 1, ..ctx() };
        select_block(&mut block, &local_ctx).expect("select");
        let ops: Vec<PseudoOp> = block.instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Fp, disp: 8 }
                },
                PseudoOp::Push { src: Operand::Register(Register::A) },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::Sp, disp: 0 }
                },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::A, disp: 0 }
                },
                PseudoOp::Alu { op: AluOp::Add, dst: Register::A, src: Operand::Immediate(layout::OBJECT_HEADER_SIZE) },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::A, disp: layout::CLASS_METHOD_TABLE_OFFSET }
                },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::A, disp: 2 * layout::WORD_SIZE }
                },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::A, disp: layout::METHOD_TRAMPOLINE_OFFSET }
                },
                PseudoOp::Mov {
                    dst: Operand::Register(Register::A),
                    src: Operand::MemBase { base: Register::A, disp: layout::TRAMPOLINE_BUFFER_BASE_OFFSET }
                },
                PseudoOp::CallReg { target: Register::A },
                PseudoOp::Alu { op: AluOp::Add, dst: Register::Sp, src: Operand::Immediate(layout::WORD_SIZE) },
            ]
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut first = BasicBlock::new(0);
        first.statements = vec![Statement::Return(Expression::BinOp(
            BinOp::Add,
            Box::new(Expression::Local { index: 0, vm_type: VmType::Int }),
            Box::new(Expression::Local { index: 1, vm_type: VmType::Int }),
        ))];
        let mut second = first.clone();
        select_block(&mut first, &ctx()).expect("select");
        select_block(&mut second, &ctx()).expect("select");
        let first_ops: Vec<PseudoOp> = first.instructions.iter().map(|i| i.op).collect();
        let second_ops: Vec<PseudoOp> = second.instructions.iter().map(|i| i.op).collect();
        assert_eq!(first_ops, second_ops);
    }
}
