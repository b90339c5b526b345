use crate::runtime::field::VmField;
use crate::runtime::method::VmMethod;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// A class's initialization progress (§4.8).
///
/// `Initialized` is set *before* recursively initializing the superclass and running
/// `<clinit>`, not after: a cycle that re-enters this class's initialization (directly
/// or through a superclass) observes `Initialized` immediately and returns, rather
/// than deadlocking or recursing forever. This intentionally mirrors how the
/// reference JVM runtime this design was distilled from breaks the same cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassInitState {
    NotInitialized,
    Initialized,
    Failed(String),
}

/// A resolved, linked class: the superclass chain, instance and static field layout,
/// and the method/vtable pair the selector dispatches through.
#[derive(Debug)]
pub struct VmClass {
    pub name: String,
    pub super_class: Option<Arc<VmClass>>,
    /// Every instance field visible on this class, inherited fields included, indexed
    /// by `word_index`.
    pub instance_fields: Vec<Arc<VmField>>,
    /// Total instance field storage words an object of this class requires.
    pub instance_word_count: u16,
    pub static_fields: AHashMap<String, Arc<VmField>>,
    /// Every method declared directly on this class (not inherited).
    pub methods: Vec<Arc<VmMethod>>,
    /// Method table: superclass's inherited prefix plus this class's own virtual
    /// methods, indexed by `virtual_index` (§4.7).
    pub vtable: Vec<Arc<VmMethod>>,
    pub init_state: Mutex<ClassInitState>,
}

impl VmClass {
    /// Finds a field declared or inherited by this class, by simple name.
    #[must_use]
    pub fn find_instance_field(&self, name: &str) -> Option<&Arc<VmField>> {
        self.instance_fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn find_static_field(&self, name: &str) -> Option<&Arc<VmField>> {
        self.static_fields.get(name)
    }

    /// Finds a method declared directly on this class by name and descriptor, used to
    /// resolve `invokestatic`/`invokespecial` (which bind to the declaring class, not
    /// the dynamic type).
    #[must_use]
    pub fn find_declared_method(&self, name: &str, descriptor: &str) -> Option<&Arc<VmMethod>> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    #[must_use]
    pub fn find_static_initializer(&self) -> Option<&Arc<VmMethod>> {
        self.methods.iter().find(|method| method.is_static_initializer())
    }

    /// Returns this class or the nearest ancestor whose method table entry at `index`
    /// resolves a virtual call; for a linked class this is always `Some` as long as
    /// `index` is within `vtable`.
    #[must_use]
    pub fn virtual_method(&self, index: u32) -> Option<&Arc<VmMethod>> {
        self.vtable.get(index as usize)
    }
}
