use crate::Error::InvalidConstantIndex;
use crate::Result;

/// One entry of a class's constant pool.
///
/// The `.class` byte-decoder that produces these entries is out of scope for this
/// crate; a `ConstantPool` is assumed to already be fully resolved by the time the
/// compiler sees it.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantPoolEntry {
    Utf8(String),
    Class { name_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// Per-class constant pool, indexed by the 16-bit indices bytecode operands refer to.
///
/// Index `0` is unused, matching the JVM specification's one-based indexing; entries
/// are stored at `index - 1` internally.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantPoolEntry>,
}

impl ConstantPool {
    #[must_use]
    pub fn new() -> Self {
        ConstantPool::default()
    }

    /// Appends an entry and returns the one-based index that refers to it.
    pub fn push(&mut self, entry: ConstantPoolEntry) -> u16 {
        self.entries.push(entry);
        u16::try_from(self.entries.len()).unwrap_or(u16::MAX)
    }

    fn get(&self, index: u16) -> Option<&ConstantPoolEntry> {
        let index = usize::from(index).checked_sub(1)?;
        self.entries.get(index)
    }

    /// Returns the UTF-8 string at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `index` is out of range or
    /// does not reference a UTF-8 entry.
    pub fn try_get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(ConstantPoolEntry::Utf8(value)) => Ok(value.as_str()),
            _ => Err(InvalidConstantIndex { index, expected: "Utf8" }),
        }
    }

    /// Returns the class name referenced by the `Class` entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `index` does not reference a
    /// `Class` entry, or the name it refers to is not a `Utf8` entry.
    pub fn try_get_class_name(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(ConstantPoolEntry::Class { name_index }) => self.try_get_utf8(*name_index),
            _ => Err(InvalidConstantIndex { index, expected: "Class" }),
        }
    }

    /// Returns `(class_name, member_name, descriptor)` for the `FieldRef` entry at
    /// `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `index` does not reference a
    /// well-formed `FieldRef` entry.
    pub fn try_get_field_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        let Some(ConstantPoolEntry::FieldRef { class_index, name_and_type_index }) =
            self.get(index)
        else {
            return Err(InvalidConstantIndex { index, expected: "FieldRef" });
        };
        let class_name = self.try_get_class_name(*class_index)?;
        let (name, descriptor) = self.try_get_name_and_type(*name_and_type_index)?;
        Ok((class_name, name, descriptor))
    }

    /// Returns `(class_name, member_name, descriptor)` for the `MethodRef` entry at
    /// `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `index` does not reference a
    /// well-formed `MethodRef` entry.
    pub fn try_get_method_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        let Some(ConstantPoolEntry::MethodRef { class_index, name_and_type_index }) =
            self.get(index)
        else {
            return Err(InvalidConstantIndex { index, expected: "MethodRef" });
        };
        let class_name = self.try_get_class_name(*class_index)?;
        let (name, descriptor) = self.try_get_name_and_type(*name_and_type_index)?;
        Ok((class_name, name, descriptor))
    }

    /// Returns the literal value of the `Integer`/`Long`/`Float`/`Double` entry at
    /// `index`, as a [`crate::Value`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConstantIndex`] if `index` does not reference
    /// one of those entry kinds.
    pub fn try_get_ldc_value(&self, index: u16) -> Result<crate::Value> {
        match self.get(index) {
            Some(ConstantPoolEntry::Integer(value)) => Ok(crate::Value::from(*value)),
            Some(ConstantPoolEntry::Long(value)) => Ok(crate::Value::from(*value)),
            Some(ConstantPoolEntry::Float(value)) => Ok(crate::Value::from(*value)),
            Some(ConstantPoolEntry::Double(value)) => Ok(crate::Value::from(*value)),
            _ => Err(InvalidConstantIndex { index, expected: "Integer/Long/Float/Double" }),
        }
    }

    fn try_get_name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index) {
            Some(ConstantPoolEntry::NameAndType { name_index, descriptor_index }) => {
                Ok((self.try_get_utf8(*name_index)?, self.try_get_utf8(*descriptor_index)?))
            }
            _ => Err(InvalidConstantIndex { index, expected: "NameAndType" }),
        }
    }
}
