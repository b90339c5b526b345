//! # Class Image
//!
//! Minimal data types standing in for an already-parsed `.class` file: a constant
//! pool, a field table, and a method table, indexable the way bytecode operands
//! expect. Decoding the actual `.class` byte format and resolving object layout is out
//! of scope for this crate (see the crate-level documentation); these types only
//! model the *shape* of that external component's output so the rest of the
//! compiler has something concrete to consume.

mod class_file;
mod constant_pool;
mod field;
mod field_type;
mod instruction;
mod method;

pub use class_file::ClassImage;
pub use constant_pool::{ConstantPool, ConstantPoolEntry};
pub use field::{FieldAccessFlags, FieldInfo};
pub use field_type::FieldType;
pub use instruction::Instruction;
pub use method::{Method, MethodAccessFlags};
