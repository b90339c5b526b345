//! Lowers one method's bytecode into a basic-block CFG of typed IR (§4.2, component D).
//!
//! Bytecode branch/goto operands are modeled as indices into the method's `code`
//! vector (the already-decoded instruction sequence), not raw `.class` byte offsets —
//! decoding those offsets into instruction indices is itself `.class`-decoder work
//! this crate does not perform.
//!
//! The operand stack is simulated per block and assumed empty on entry to every
//! block; this holds for the straight-line, structured control flow this compiler
//! targets and avoids needing an inter-block stack-shape solver.

use crate::cfg::{BasicBlock, BlockId, Successor};
use crate::class_image::{ClassImage, FieldType, Instruction, Method};
use crate::ir::expr::{BinOp, Expression, UnOp};
use crate::ir::stmt::Statement;
use crate::runtime::ClassRegistry;
use crate::value::{Value, VmType};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// Lowers `method`'s code into blocks, returning `(blocks, entry_block, exit_block)`.
/// `current_class_name` is the declaring class, used to resolve field/method
/// references that name no class explicitly elsewhere in this design (kept for
/// symmetry with a real constant pool, where every ref is fully qualified).
///
/// # Errors
///
/// Returns [`Error::OperandStackUnderflow`] if the bytecode pops more than it has
/// pushed, [`Error::InvalidBlockAddress`] if a branch targets an address that is not
/// a block start, [`Error::UnsupportedInstruction`] for instructions this compiler
/// does not lower (the three-way long/float/double comparisons), or any resolution
/// error surfaced by `registry`.
pub fn build(
    class_image: &ClassImage,
    method: &Method,
    current_class_name: &str,
    registry: &ClassRegistry,
) -> Result<(Vec<BasicBlock>, BlockId, BlockId)> {
    let code = &method.code;
    let starts = collect_block_starts(code);
    let boundaries: Vec<usize> = starts.iter().copied().chain(std::iter::once(code.len())).collect();
    let index_to_block: HashMap<usize, BlockId> =
        starts.iter().enumerate().map(|(block_id, &start)| (start, block_id)).collect();
    let exit_block: BlockId = starts.len();

    let mut blocks = Vec::with_capacity(starts.len() + 1);
    for (block_id, window) in boundaries.windows(2).enumerate() {
        let (start, end) = (window[0], window[1]);
        let block = lower_block(
            block_id,
            start,
            &code[start..end],
            &index_to_block,
            class_image,
            current_class_name,
            registry,
            starts.len(),
            exit_block,
        )?;
        blocks.push(block);
    }
    blocks.push(BasicBlock::new(exit_block));

    Ok((blocks, 0, exit_block))
}

/// First pass over the bytecode: every branch/goto target and every fall-through
/// successor of a conditional branch becomes a block boundary, so block partitioning
/// never needs to split an already-lowered block.
fn collect_block_starts(code: &[Instruction]) -> BTreeSet<usize> {
    let mut starts = BTreeSet::new();
    starts.insert(0);
    for (index, instruction) in code.iter().enumerate() {
        if let Some(target) = instruction.branch_target() {
            starts.insert(target);
            if index + 1 < code.len() {
                starts.insert(index + 1);
            }
        } else if instruction.changes_control_flow() && index + 1 < code.len() {
            starts.insert(index + 1);
        }
    }
    starts
}

#[expect(clippy::too_many_arguments)]
fn lower_block(
    block_id: BlockId,
    block_start: usize,
    instructions: &[Instruction],
    index_to_block: &HashMap<usize, BlockId>,
    class_image: &ClassImage,
    current_class_name: &str,
    registry: &ClassRegistry,
    total_blocks: usize,
    exit_block: BlockId,
) -> Result<BasicBlock> {
    let _ = (block_start, current_class_name);
    let mut stack: Vec<Expression> = Vec::new();
    let mut statements: Vec<Statement> = Vec::new();
    let mut successor = Successor::None;

    for instruction in instructions {
        match instruction {
            Instruction::Nop => {}
            Instruction::IconstM1 => stack.push(Expression::Value(Value::Int(-1))),
            Instruction::IconstN(value) => stack.push(Expression::Value(Value::Int(*value))),
            Instruction::LconstN(value) => stack.push(Expression::Value(Value::Long(*value))),
            Instruction::FconstN(value) => stack.push(Expression::Value(Value::Float(*value))),
            Instruction::DconstN(value) => stack.push(Expression::Value(Value::Double(*value))),
            Instruction::Bipush(value) => stack.push(Expression::Value(Value::Int(i32::from(*value)))),
            Instruction::Sipush(value) => stack.push(Expression::Value(Value::Int(i32::from(*value)))),
            Instruction::Ldc { constant_index } => {
                stack.push(Expression::Value(class_image.constant_pool.try_get_ldc_value(*constant_index)?));
            }

            Instruction::Iload(index) => stack.push(local_expr(*index, VmType::Int)),
            Instruction::Lload(index) => stack.push(local_expr(*index, VmType::Long)),
            Instruction::Fload(index) => stack.push(local_expr(*index, VmType::Float)),
            Instruction::Dload(index) => stack.push(local_expr(*index, VmType::Double)),
            Instruction::Aload(index) => stack.push(local_expr(*index, VmType::Reference)),
            Instruction::Istore(index) => store_local(&mut statements, &mut stack, *index, VmType::Int)?,
            Instruction::Lstore(index) => store_local(&mut statements, &mut stack, *index, VmType::Long)?,
            Instruction::Fstore(index) => store_local(&mut statements, &mut stack, *index, VmType::Float)?,
            Instruction::Dstore(index) => store_local(&mut statements, &mut stack, *index, VmType::Double)?,
            Instruction::Astore(index) => store_local(&mut statements, &mut stack, *index, VmType::Reference)?,
            Instruction::Iinc { index, constant } => {
                let dest = local_expr(*index, VmType::Int);
                let src = Expression::BinOp(
                    BinOp::Add,
                    Box::new(dest.clone()),
                    Box::new(Expression::Value(Value::Int(*constant))),
                );
                statements.push(Statement::Store { dest, src });
            }

            Instruction::Pop => {
                stack.pop().ok_or(Error::OperandStackUnderflow)?;
            }
            Instruction::Dup => {
                let top = stack.last().cloned().ok_or(Error::OperandStackUnderflow)?;
                stack.push(top);
            }
            Instruction::Swap => {
                let top = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                let under = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                stack.push(top);
                stack.push(under);
            }

            Instruction::Iadd | Instruction::Ladd | Instruction::Fadd | Instruction::Dadd => {
                push_binop(&mut stack, BinOp::Add)?;
            }
            Instruction::Isub | Instruction::Lsub | Instruction::Fsub | Instruction::Dsub => {
                push_binop(&mut stack, BinOp::Sub)?;
            }
            Instruction::Imul | Instruction::Lmul | Instruction::Fmul | Instruction::Dmul => {
                push_binop(&mut stack, BinOp::Mul)?;
            }
            Instruction::Idiv | Instruction::Ldiv | Instruction::Fdiv | Instruction::Ddiv => {
                push_binop(&mut stack, BinOp::Div)?;
            }
            Instruction::Irem | Instruction::Lrem | Instruction::Frem | Instruction::Drem => {
                push_binop(&mut stack, BinOp::Rem)?;
            }
            Instruction::Ishl | Instruction::Lshl => push_binop(&mut stack, BinOp::Shl)?,
            Instruction::Ishr | Instruction::Lshr => push_binop(&mut stack, BinOp::Shr)?,
            Instruction::Iushr | Instruction::Lushr => push_binop(&mut stack, BinOp::Ushr)?,
            Instruction::Iand | Instruction::Land => push_binop(&mut stack, BinOp::And)?,
            Instruction::Ior | Instruction::Lor => push_binop(&mut stack, BinOp::Or)?,
            Instruction::Ixor | Instruction::Lxor => push_binop(&mut stack, BinOp::Xor)?,
            Instruction::Ineg | Instruction::Lneg | Instruction::Fneg | Instruction::Dneg => {
                let operand = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                stack.push(Expression::UnOp(UnOp::Neg, Box::new(operand)));
            }

            Instruction::Lcmp
            | Instruction::Fcmpl
            | Instruction::Fcmpg
            | Instruction::Dcmpl
            | Instruction::Dcmpg => {
                return Err(Error::UnsupportedInstruction(instruction.to_string()));
            }

            Instruction::Ifeq(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Eq, *target, index_to_block)?;
            }
            Instruction::Ifne(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Ne, *target, index_to_block)?;
            }
            Instruction::Iflt(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Lt, *target, index_to_block)?;
            }
            Instruction::Ifge(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Ge, *target, index_to_block)?;
            }
            Instruction::Ifgt(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Gt, *target, index_to_block)?;
            }
            Instruction::Ifle(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Le, *target, index_to_block)?;
            }
            Instruction::Ifnull(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Eq, *target, index_to_block)?;
            }
            Instruction::Ifnonnull(target) => {
                branch_to_zero(&mut stack, &mut statements, BinOp::Ne, *target, index_to_block)?;
            }
            Instruction::IfIcmpeq(target) | Instruction::IfAcmpeq(target) => {
                branch_cmp(&mut stack, &mut statements, BinOp::Eq, *target, index_to_block)?;
            }
            Instruction::IfIcmpne(target) | Instruction::IfAcmpne(target) => {
                branch_cmp(&mut stack, &mut statements, BinOp::Ne, *target, index_to_block)?;
            }
            Instruction::IfIcmplt(target) => {
                branch_cmp(&mut stack, &mut statements, BinOp::Lt, *target, index_to_block)?;
            }
            Instruction::IfIcmpge(target) => {
                branch_cmp(&mut stack, &mut statements, BinOp::Ge, *target, index_to_block)?;
            }
            Instruction::IfIcmpgt(target) => {
                branch_cmp(&mut stack, &mut statements, BinOp::Gt, *target, index_to_block)?;
            }
            Instruction::IfIcmple(target) => {
                branch_cmp(&mut stack, &mut statements, BinOp::Le, *target, index_to_block)?;
            }
            Instruction::Goto(target) => {
                successor = Successor::Goto(
                    *index_to_block.get(target).ok_or(Error::InvalidBlockAddress(*target))?,
                );
            }

            Instruction::Ireturn
            | Instruction::Lreturn
            | Instruction::Freturn
            | Instruction::Dreturn
            | Instruction::Areturn => {
                let value = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                statements.push(Statement::Return(value));
            }
            Instruction::Return => statements.push(Statement::VoidReturn),

            Instruction::Getstatic { field_ref_index } => {
                let (class_name, field_name, _) =
                    class_image.constant_pool.try_get_field_ref(*field_ref_index)?;
                let field = registry.resolve_field(class_name, field_name)?;
                stack.push(Expression::ClassField(field));
            }
            Instruction::Putstatic { field_ref_index } => {
                let (class_name, field_name, _) =
                    class_image.constant_pool.try_get_field_ref(*field_ref_index)?;
                let field = registry.resolve_field(class_name, field_name)?;
                let src = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                statements.push(Statement::Store { dest: Expression::ClassField(field), src });
            }
            Instruction::Getfield { field_ref_index } => {
                let (class_name, field_name, _) =
                    class_image.constant_pool.try_get_field_ref(*field_ref_index)?;
                let field = registry.resolve_field(class_name, field_name)?;
                let objectref = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                stack.push(Expression::InstanceField(field, Box::new(objectref)));
            }
            Instruction::Putfield { field_ref_index } => {
                let (class_name, field_name, _) =
                    class_image.constant_pool.try_get_field_ref(*field_ref_index)?;
                let field = registry.resolve_field(class_name, field_name)?;
                let src = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                let objectref = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                statements.push(Statement::Store {
                    dest: Expression::InstanceField(field, Box::new(objectref)),
                    src,
                });
            }

            Instruction::Invokestatic { method_ref_index } => {
                let (class_name, name, descriptor) =
                    class_image.constant_pool.try_get_method_ref(*method_ref_index)?;
                let resolved = registry.resolve_method(class_name, name, descriptor)?;
                let args = pop_args(&mut stack, resolved.parameter_types.len())?;
                let return_type = resolved.return_type;
                finish_call(&mut stack, &mut statements, Expression::Invoke(resolved, args), return_type);
            }
            Instruction::Invokespecial { method_ref_index } => {
                let (class_name, name, descriptor) =
                    class_image.constant_pool.try_get_method_ref(*method_ref_index)?;
                let resolved = registry.resolve_method(class_name, name, descriptor)?;
                let mut args = pop_args(&mut stack, resolved.parameter_types.len())?;
                let receiver = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                args.insert(0, receiver);
                let return_type = resolved.return_type;
                finish_call(&mut stack, &mut statements, Expression::Invoke(resolved, args), return_type);
            }
            Instruction::Invokevirtual { method_ref_index } => {
                let (class_name, name, descriptor) =
                    class_image.constant_pool.try_get_method_ref(*method_ref_index)?;
                let (virtual_index, return_type) = registry.resolve_virtual(class_name, name, descriptor)?;
                let (parameter_types, _) = FieldType::parse_method_descriptor(descriptor)?;
                let mut args = pop_args(&mut stack, parameter_types.len())?;
                let receiver = stack.pop().ok_or(Error::OperandStackUnderflow)?;
                args.insert(0, receiver);
                finish_call(
                    &mut stack,
                    &mut statements,
                    Expression::InvokeVirtual { virtual_index, return_type, args },
                    return_type,
                );
            }

            Instruction::New { class_index } => {
                let class_name = class_image.constant_pool.try_get_class_name(*class_index)?;
                let class = registry.resolve(class_name)?;
                stack.push(Expression::New(class));
            }

            Instruction::Monitorenter | Instruction::Monitorexit => {
                // Monitor semantics are out of scope; the operand is consumed like any
                // other discarded expression statement's source.
                stack.pop().ok_or(Error::OperandStackUnderflow)?;
            }
        }
    }

    if !matches!(successor, Successor::Goto(_)) {
        let ends_in_return = matches!(statements.last(), Some(Statement::Return(_) | Statement::VoidReturn));
        if !ends_in_return {
            let next = if block_id + 1 < total_blocks { block_id + 1 } else { exit_block };
            successor = Successor::Fallthrough(next);
        }
    }

    Ok(BasicBlock { id: block_id, statements, successor, ..BasicBlock::default() })
}

fn local_expr(index: u8, vm_type: VmType) -> Expression {
    Expression::Local { index: u16::from(index), vm_type }
}

fn store_local(
    statements: &mut Vec<Statement>,
    stack: &mut Vec<Expression>,
    index: u8,
    vm_type: VmType,
) -> Result<()> {
    let src = stack.pop().ok_or(Error::OperandStackUnderflow)?;
    statements.push(Statement::Store { dest: local_expr(index, vm_type), src });
    Ok(())
}

fn push_binop(stack: &mut Vec<Expression>, op: BinOp) -> Result<()> {
    let right = stack.pop().ok_or(Error::OperandStackUnderflow)?;
    let left = stack.pop().ok_or(Error::OperandStackUnderflow)?;
    stack.push(Expression::BinOp(op, Box::new(left), Box::new(right)));
    Ok(())
}

/// Lowers an `ifXX` instruction that compares the top of stack against an implicit
/// zero (or null) to a `Statement::If`.
fn branch_to_zero(
    stack: &mut Vec<Expression>,
    statements: &mut Vec<Statement>,
    op: BinOp,
    target: usize,
    index_to_block: &HashMap<usize, BlockId>,
) -> Result<()> {
    let lhs = stack.pop().ok_or(Error::OperandStackUnderflow)?;
    let zero = match lhs.vm_type() {
        VmType::Reference => Expression::Value(Value::Reference(0)),
        _ => Expression::Value(Value::Int(0)),
    };
    let true_target = *index_to_block.get(&target).ok_or(Error::InvalidBlockAddress(target))?;
    statements.push(Statement::If { condition: Expression::BinOp(op, Box::new(lhs), Box::new(zero)), true_target });
    Ok(())
}

/// Lowers an `if_icmpXX`/`if_acmpXX` instruction, which compares two stack operands.
fn branch_cmp(
    stack: &mut Vec<Expression>,
    statements: &mut Vec<Statement>,
    op: BinOp,
    target: usize,
    index_to_block: &HashMap<usize, BlockId>,
) -> Result<()> {
    let rhs = stack.pop().ok_or(Error::OperandStackUnderflow)?;
    let lhs = stack.pop().ok_or(Error::OperandStackUnderflow)?;
    let true_target = *index_to_block.get(&target).ok_or(Error::InvalidBlockAddress(target))?;
    statements.push(Statement::If { condition: Expression::BinOp(op, Box::new(lhs), Box::new(rhs)), true_target });
    Ok(())
}

fn pop_args(stack: &mut Vec<Expression>, count: usize) -> Result<Vec<Expression>> {
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(stack.pop().ok_or(Error::OperandStackUnderflow)?);
    }
    args.reverse();
    Ok(args)
}

fn finish_call(stack: &mut Vec<Expression>, statements: &mut Vec<Statement>, call: Expression, return_type: VmType) {
    if return_type == VmType::Void {
        statements.push(Statement::Expression(call));
    } else {
        stack.push(call);
    }
}
