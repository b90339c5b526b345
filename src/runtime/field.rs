use crate::value::VmType;
use std::sync::atomic::{AtomicI64, Ordering};

/// Where a field's value lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldStorage {
    /// One slot per class, held directly on the [`VmField`] record.
    Static,
    /// A word index into the owning object, past the fixed object header.
    Instance { word_index: u16 },
}

/// A resolved, linked field: name, type, and storage location.
///
/// Static storage lives inline on this record (`static_value`), at the fixed offset
/// `runtime::layout::FIELD_STATIC_VALUE_OFFSET` the selector's `class_field` pattern
/// reads from after loading this record's address as an immediate.
#[derive(Debug)]
pub struct VmField {
    pub name: String,
    pub descriptor: String,
    pub vm_type: VmType,
    pub storage: FieldStorage,
    static_value: AtomicI64,
}

impl VmField {
    #[must_use]
    pub fn new_static(name: String, descriptor: String, vm_type: VmType) -> Self {
        VmField {
            name,
            descriptor,
            vm_type,
            storage: FieldStorage::Static,
            static_value: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub fn new_instance(name: String, descriptor: String, vm_type: VmType, word_index: u16) -> Self {
        VmField {
            name,
            descriptor,
            vm_type,
            storage: FieldStorage::Instance { word_index },
            static_value: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self.storage, FieldStorage::Static)
    }

    /// Reads this field's static storage slot.
    ///
    /// Only meaningful for [`FieldStorage::Static`] fields; compiled code reaches the
    /// same slot directly through raw-pointer arithmetic rather than this accessor.
    #[must_use]
    pub fn load_static(&self) -> i64 {
        self.static_value.load(Ordering::Acquire)
    }

    pub fn store_static(&self, value: i64) {
        self.static_value.store(value, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_round_trip() {
        let field = VmField::new_static("counter".to_string(), "I".to_string(), VmType::Int);
        field.store_static(42);
        assert_eq!(field.load_static(), 42);
        assert!(field.is_static());
    }

    #[test]
    fn test_instance_word_index() {
        let field =
            VmField::new_instance("value".to_string(), "I".to_string(), VmType::Int, 2);
        assert_eq!(field.storage, FieldStorage::Instance { word_index: 2 });
        assert!(!field.is_static());
    }
}
