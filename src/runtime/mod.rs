//! Linked runtime objects: classes, fields, and methods (§4.7, §4.8 / components C, I).
//!
//! Object layout and allocation, garbage collection, and the class loader that
//! produces a [`crate::class_image::ClassImage`] in the first place are all out of
//! scope; this module only covers linking an already-decoded class image into the
//! shape the rest of the compiler (and compiled code itself, via fixed offsets —
//! see [`layout`]) consumes.

pub mod class;
pub mod field;
pub mod layout;
pub mod linker;
pub mod method;
pub mod vtable;

pub use class::{ClassInitState, VmClass};
pub use field::{FieldStorage, VmField};
pub use linker::ClassRegistry;
pub use method::VmMethod;
