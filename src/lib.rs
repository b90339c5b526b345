//! A just-in-time compiler that lowers already-parsed JVM bytecode directly to
//! native IA-32 machine code.
//!
//! This crate owns the pipeline from a method's bytecode to an executable, callable
//! native function: building a typed IR from the bytecode, partitioning it into a
//! basic-block control-flow graph, selecting pseudo-instructions against a fixed
//! three-register convention (no general register allocator — see
//! [`codegen::register`]), emitting IA-32 machine bytes with backpatched branches,
//! and publishing the result behind a self-upgrading lazy-compilation trampoline.
//!
//! Out of scope, and only modeled here as the shape of an external collaborator:
//! `.class` file decoding ([`class_image`]), object layout and garbage collection,
//! thread and monitor semantics beyond the minimal hooks the trampoline protocol
//! needs ([`thread_runtime`]), exception dispatch, and the standard library. There is
//! no SSA form, no general register allocator, no tiered compilation, and no OSR or
//! deoptimization: a method is compiled once, on its first call, and stays compiled.

pub mod buffer;
pub mod cfg;
pub mod class_image;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod error;
pub mod ir;
pub mod runtime;
pub mod thread_runtime;
pub mod trampoline;
pub mod value;

pub use compiler::Compiler;
pub use config::CompilerConfig;
pub use error::{Error, Result};
pub use value::{Value, VmType};
