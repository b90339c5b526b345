use crate::Result;
use crate::class_image::constant_pool::ConstantPool;
use crate::class_image::field::FieldInfo;
use crate::class_image::method::Method;

/// An already-linked-to-bytes view of one class: constant pool plus field and method
/// tables. This crate does not decode `.class` files; it consumes values of this shape
/// from whatever external component does.
#[derive(Clone, Debug)]
pub struct ClassImage {
    pub this_class: u16,
    pub super_class: Option<u16>,
    pub constant_pool: ConstantPool,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<Method>,
}

impl ClassImage {
    /// Returns this class's fully-qualified name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `this_class` does not
    /// reference a well-formed `Class` entry.
    pub fn class_name(&self) -> Result<&str> {
        self.constant_pool.try_get_class_name(self.this_class)
    }

    /// Returns the fully-qualified name of this class's superclass, or `None` for
    /// `java.lang.Object`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `super_class` is set but does
    /// not reference a well-formed `Class` entry.
    pub fn super_class_name(&self) -> Result<Option<&str>> {
        match self.super_class {
            Some(index) => Ok(Some(self.constant_pool.try_get_class_name(index)?)),
            None => Ok(None),
        }
    }

    /// Finds a declared method by name and descriptor.
    #[must_use]
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }
}
