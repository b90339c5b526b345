//! Class linking and initialization (§4.8).
//!
//! Linking turns an already-decoded [`ClassImage`] plus its already-linked
//! superclass into a [`VmClass`]: instance fields get word indices (appended after
//! the superclass's own, mirroring how [`crate::runtime::vtable`] appends virtual
//! methods), static fields get storage, and every compilable method gets a
//! trampoline. Initialization later runs each class's `<clinit>` exactly once.

use crate::Error;
use crate::Result;
use crate::class_image::{ClassImage, FieldType};
use crate::runtime::class::{ClassInitState, VmClass};
use crate::runtime::field::VmField;
use crate::runtime::method::VmMethod;
use crate::runtime::vtable;
use crate::trampoline::Trampoline;
use ahash::AHashMap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A name-indexed table of every class this process has linked. Stands in for the
/// class-loader this crate does not implement: classes are expected to already have
/// been located and decoded into a [`ClassImage`] before `link_class` is called.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: DashMap<String, Arc<VmClass>>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    pub fn register(&self, class: Arc<VmClass>) {
        self.classes.insert(class.name.clone(), class);
    }

    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if no class of this name has been registered.
    pub fn resolve(&self, name: &str) -> Result<Arc<VmClass>> {
        self.classes
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))
    }

    /// Resolves a field reference, searching `class_name` and then its ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if `class_name` is not registered, or
    /// [`Error::ClassLinkError`] if no class in the hierarchy declares the field.
    pub fn resolve_field(&self, class_name: &str, field_name: &str) -> Result<Arc<VmField>> {
        let mut current = Some(self.resolve(class_name)?);
        while let Some(class) = current {
            if let Some(field) = class.find_instance_field(field_name) {
                return Ok(Arc::clone(field));
            }
            if let Some(field) = class.find_static_field(field_name) {
                return Ok(Arc::clone(field));
            }
            current = class.super_class.clone();
        }
        Err(Error::ClassLinkError(format!("field '{field_name}' not found on {class_name} or its ancestors")))
    }

    /// Resolves a method reference bound statically to `class_name` (used for
    /// `invokestatic`/`invokespecial`), searching `class_name` and then its
    /// ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if `class_name` is not registered, or
    /// [`Error::ClassLinkError`] if no class in the hierarchy declares the method.
    pub fn resolve_method(&self, class_name: &str, name: &str, descriptor: &str) -> Result<Arc<VmMethod>> {
        let mut current = Some(self.resolve(class_name)?);
        while let Some(class) = current {
            if let Some(method) = class.find_declared_method(name, descriptor) {
                return Ok(Arc::clone(method));
            }
            current = class.super_class.clone();
        }
        Err(Error::ClassLinkError(format!(
            "method '{name}{descriptor}' not found on {class_name} or its ancestors"
        )))
    }

    /// Resolves a virtual method reference against `class_name`'s vtable, returning
    /// its `virtual_index` and return type — everything `invokevirtual` needs at
    /// selection time without binding to a specific overriding method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if `class_name` is not registered, or
    /// [`Error::ClassLinkError`] if the class's vtable has no such entry.
    pub fn resolve_virtual(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(u32, crate::value::VmType)> {
        let class = self.resolve(class_name)?;
        class
            .vtable
            .iter()
            .position(|method| method.name == name && method.descriptor == descriptor)
            .map(|index| (u32::try_from(index).unwrap_or(u32::MAX), class.vtable[index].return_type))
            .ok_or_else(|| {
                Error::ClassLinkError(format!("virtual method '{name}{descriptor}' not found on {class_name}"))
            })
    }
}

/// Links a decoded class image against its already-linked superclass (`None` only for
/// `java.lang.Object`), producing instance field layout, static storage, and a method
/// table.
///
/// `make_trampoline` is supplied by the compiler driver, which alone knows how to emit
/// a method's lazy-compilation stub; linking itself only needs an opaque per-method
/// trampoline.
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] if a field or method descriptor is malformed,
/// or [`Error::ClassLinkError`] if the image is otherwise inconsistent.
#[instrument(skip_all)]
pub fn link_class(
    image: &ClassImage,
    super_class: Option<Arc<VmClass>>,
    mut make_trampoline: impl FnMut() -> Arc<Trampoline>,
) -> Result<VmClass> {
    let (mut instance_fields, mut next_word_index) = match &super_class {
        Some(parent) => (parent.instance_fields.clone(), parent.instance_word_count),
        None => (Vec::new(), 0),
    };
    let mut static_fields = AHashMap::new();
    for field_info in &image.fields {
        let field_type = FieldType::parse_field_descriptor(&field_info.descriptor)?;
        if field_info.is_static() {
            let field = Arc::new(VmField::new_static(
                field_info.name.clone(),
                field_info.descriptor.clone(),
                field_type.vm_type(),
            ));
            static_fields.insert(field_info.name.clone(), field);
        } else {
            let field = Arc::new(VmField::new_instance(
                field_info.name.clone(),
                field_info.descriptor.clone(),
                field_type.vm_type(),
                next_word_index,
            ));
            next_word_index += field_type.vm_type().slot_width();
            instance_fields.push(field);
        }
    }

    let superclass_vtable_keys: Vec<(String, String)> = super_class
        .as_ref()
        .map(|parent| {
            parent.vtable.iter().map(|method| (method.name.clone(), method.descriptor.clone())).collect()
        })
        .unwrap_or_default();
    let virtual_declarations: Vec<(String, String)> = image
        .methods
        .iter()
        .filter(|method| is_virtual_candidate(method))
        .map(|method| (method.name.clone(), method.descriptor.clone()))
        .collect();
    let virtual_indices = vtable::assign_virtual_indices(&superclass_vtable_keys, &virtual_declarations);
    let mut virtual_index_iter = virtual_indices.into_iter();

    let mut methods = Vec::with_capacity(image.methods.len());
    for method in &image.methods {
        let (parameter_types, return_type) = FieldType::parse_method_descriptor(&method.descriptor)?;
        let virtual_index =
            if is_virtual_candidate(method) { virtual_index_iter.next() } else { None };
        methods.push(Arc::new(VmMethod {
            declaring_class: image.class_name()?.to_string(),
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            parameter_types: parameter_types.iter().map(FieldType::vm_type).collect(),
            return_type: return_type.vm_type(),
            is_static: method.is_static(),
            max_locals: method.max_locals,
            code: method.code.clone(),
            virtual_index,
            trampoline: make_trampoline(),
        }));
    }

    let own_virtual_methods: Vec<Arc<VmMethod>> =
        methods.iter().filter(|method| method.is_virtual()).cloned().collect();
    let superclass_vtable: Vec<Arc<VmMethod>> =
        super_class.as_ref().map(|parent| parent.vtable.clone()).unwrap_or_default();
    let vtable = vtable::build_method_table(&superclass_vtable, &own_virtual_methods);

    debug!(fields = instance_fields.len(), methods = methods.len(), "linked class");
    Ok(VmClass {
        name: image.class_name()?.to_string(),
        super_class,
        instance_fields,
        instance_word_count: next_word_index,
        static_fields,
        methods,
        vtable,
        init_state: Mutex::new(ClassInitState::NotInitialized),
    })
}

fn is_virtual_candidate(method: &crate::class_image::Method) -> bool {
    method.is_compilable() && !method.is_static() && method.name != "<init>"
}

/// Ensures `class` has run its `<clinit>`, recursively initializing its superclass
/// first.
///
/// `invoke` is called at most once per class, with that class's `<clinit>` method, to
/// actually run the static initializer (compiling and invoking it is the compiler
/// driver's job, not the linker's).
///
/// # Errors
///
/// Returns whatever `invoke` returns for this class's or an ancestor's `<clinit>`; the
/// class is marked [`ClassInitState::Failed`] and initialization will not be retried
/// for this class (unlike method compilation, which always retries, class
/// initialization failure is sticky — a later caller gets the same failure rather
/// than silently skipping static initialization).
pub fn ensure_initialized(
    class: &Arc<VmClass>,
    invoke: &mut impl FnMut(&Arc<VmMethod>) -> Result<()>,
) -> Result<()> {
    {
        let mut state = class.init_state.lock();
        match &*state {
            ClassInitState::Initialized => return Ok(()),
            ClassInitState::Failed(message) => return Err(Error::ClassLinkError(message.clone())),
            ClassInitState::NotInitialized => {}
        }
        // Set Initialized before recursing: a cycle that re-enters this class's
        // initialization (directly, or through its own superclass chain) observes
        // Initialized immediately instead of deadlocking or looping forever.
        *state = ClassInitState::Initialized;
    }

    if let Some(super_class) = &class.super_class {
        if let Err(error) = ensure_initialized(super_class, invoke) {
            *class.init_state.lock() = ClassInitState::Failed(error.to_string());
            return Err(error);
        }
    }
    if let Some(clinit) = class.find_static_initializer() {
        if let Err(error) = invoke(clinit) {
            *class.init_state.lock() = ClassInitState::Failed(error.to_string());
            return Err(error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_image::{ConstantPool, ConstantPoolEntry, MethodAccessFlags};

    fn image_with_one_method() -> ClassImage {
        let mut constant_pool = ConstantPool::new();
        let name = constant_pool.push(ConstantPoolEntry::Utf8("com/example/Counter".to_string()));
        let this_class = constant_pool.push(ConstantPoolEntry::Class { name_index: name });
        ClassImage {
            this_class,
            super_class: None,
            constant_pool,
            fields: Vec::new(),
            methods: vec![crate::class_image::Method {
                name: "get".to_string(),
                descriptor: "()I".to_string(),
                access_flags: MethodAccessFlags::empty(),
                max_locals: 1,
                code: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_link_class_assigns_virtual_index() {
        let image = image_with_one_method();
        let class = link_class(&image, None, || Arc::new(Trampoline::new(0x1000))).expect("link");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].virtual_index, Some(0));
        assert_eq!(class.vtable.len(), 1);
    }

    #[test]
    fn test_ensure_initialized_runs_once() {
        let image = image_with_one_method();
        let class = Arc::new(link_class(&image, None, || Arc::new(Trampoline::new(0x1000))).expect("link"));
        let mut calls = 0;
        let mut invoke = |_: &Arc<VmMethod>| {
            calls += 1;
            Ok(())
        };
        ensure_initialized(&class, &mut invoke).expect("init");
        ensure_initialized(&class, &mut invoke).expect("init again");
        // No <clinit> declared, so invoke is never called regardless.
        assert_eq!(calls, 0);
        assert_eq!(*class.init_state.lock(), ClassInitState::Initialized);
    }
}
