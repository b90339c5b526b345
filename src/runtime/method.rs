use crate::class_image::Instruction;
use crate::trampoline::Trampoline;
use crate::value::VmType;
use std::sync::Arc;

/// A resolved, linked method: everything the selector and the dispatch sequence need
/// beyond the already-parsed [`crate::class_image::Method`] it was built from.
#[derive(Debug)]
pub struct VmMethod {
    pub declaring_class: String,
    pub name: String,
    pub descriptor: String,
    pub parameter_types: Vec<VmType>,
    pub return_type: VmType,
    pub is_static: bool,
    pub max_locals: u16,
    pub code: Vec<Instruction>,
    /// `None` for methods that are never dispatched virtually (`static`, `<init>`,
    /// `<clinit>`, or resolved only via `invokespecial`/`invokestatic`).
    pub virtual_index: Option<u32>,
    pub trampoline: Arc<Trampoline>,
}

impl VmMethod {
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.virtual_index.is_some()
    }

    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.is_static && self.name == "<clinit>" && self.descriptor == "()V"
    }
}
