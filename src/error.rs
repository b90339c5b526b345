//! Error handling for the Ember VM JIT compiler.
//!
//! This module provides a comprehensive error type covering failures that might occur
//! while linking a class, building IR, selecting instructions, emitting machine code,
//! or publishing a compiled method.

/// Ember VM JIT result type.
///
/// This is a type alias for the standard library's [`Result`](core::result::Result)
/// with the error type defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that can occur during JIT compilation and execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested class could not be resolved by the class loader.
    #[error("Class not found: {0}")]
    ClassNotFound(String),
    /// Linking a class failed (superclass missing, inconsistent vtable, etc.).
    #[error("Class link failure: {0}")]
    ClassLinkError(String),
    /// A memory mapping for compiled code or the object heap could not be obtained.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
    /// The constant pool does not contain the expected entry kind at the given index.
    #[error("Invalid constant pool index {index}: expected {expected}")]
    InvalidConstantIndex { index: u16, expected: &'static str },
    /// A local variable slot was referenced outside the frame's declared local count.
    #[error("Invalid local variable index: {0}")]
    InvalidLocalVariableIndex(usize),
    /// A basic block address does not correspond to any block created for this unit.
    #[error("Invalid block address: {0}")]
    InvalidBlockAddress(usize),
    /// The selector attempted to pop from an empty operand stack.
    #[error("Operand stack underflow")]
    OperandStackUnderflow,
    /// The IR builder encountered a bytecode instruction it does not lower.
    #[error("Unsupported instruction: {0}")]
    UnsupportedInstruction(String),
    /// The method cannot be compiled (e.g. native, abstract, or not yet supported).
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
    /// The selector produced an expression/type combination the backend cannot encode.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// The emitter was asked to encode a pseudo-instruction it has no mapping for.
    ///
    /// This indicates a selector bug: every pseudo-instruction the selector can
    /// produce must have an emitter mapping.
    #[error("Unknown instruction in emitter: {0}")]
    UnknownInstruction(String),
    /// A displacement, index, or length did not fit the target's numeric width.
    #[error(transparent)]
    TryFromIntError(#[from] std::num::TryFromIntError),
    /// Memory-mapping compiled code failed at the OS level.
    #[error("Failed to map executable memory: {0}")]
    Io(#[from] std::io::Error),
    /// An invariant the compiler relies on was violated; this is a bug in the
    /// compiler, not a malformed program, and aborts the triggering compilation.
    #[error("Internal error: {0}")]
    InternalError(String),
}
