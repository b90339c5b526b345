use crate::runtime::{VmClass, VmField, VmMethod};
use crate::value::{Value, VmType};
use std::sync::Arc;

/// Binary operators an IR `BinOp` node can carry. The comparison variants
/// (`Eq`..`Ge`) only ever appear as the condition of an [`crate::ir::Statement::If`];
/// Java bytecode has no instruction that pushes a boolean onto the operand stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    #[must_use]
    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr | BinOp::Ushr)
    }

    #[must_use]
    pub fn is_division(self) -> bool {
        matches!(self, BinOp::Div | BinOp::Rem)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
}

/// A typed IR expression node. Resolution of cross-class references (field and
/// method refs) happens while the [`crate::ir::builder`] lowers bytecode, not later:
/// by the time a tree reaches the selector every reference is already a concrete
/// linked runtime object.
///
/// The distilled design's `args_list`/`arg`/`no_args` cons-list is represented here
/// as a plain `Vec<Expression>` in evaluation order — Rust has no need for a
/// hand-rolled linked list to carry an ordered sequence; the selector still pushes
/// arguments right-to-left at selection time (§4.4).
#[derive(Clone, Debug)]
pub enum Expression {
    Value(Value),
    Local { index: u16, vm_type: VmType },
    ClassField(Arc<VmField>),
    InstanceField(Arc<VmField>, Box<Expression>),
    BinOp(BinOp, Box<Expression>, Box<Expression>),
    UnOp(UnOp, Box<Expression>),
    Invoke(Arc<VmMethod>, Vec<Expression>),
    InvokeVirtual { virtual_index: u32, return_type: VmType, args: Vec<Expression> },
    New(Arc<VmClass>),
}

impl Expression {
    /// The [`VmType`] this expression evaluates to.
    #[must_use]
    pub fn vm_type(&self) -> VmType {
        match self {
            Expression::Value(value) => value.vm_type(),
            Expression::Local { vm_type, .. } => *vm_type,
            Expression::ClassField(field) => field.vm_type,
            Expression::InstanceField(field, _) => field.vm_type,
            Expression::BinOp(op, left, _) => {
                if op.is_comparison() {
                    VmType::Int
                } else {
                    left.vm_type()
                }
            }
            Expression::UnOp(_, operand) => operand.vm_type(),
            Expression::Invoke(method, _) => method.return_type,
            Expression::InvokeVirtual { return_type, .. } => *return_type,
            Expression::New(_) => VmType::Reference,
        }
    }
}
