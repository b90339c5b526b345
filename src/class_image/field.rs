use bitflags::bitflags;

bitflags! {
    /// Field access flags, restricted to the bit the linker inspects to decide
    /// static-vs-instance storage.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FieldAccessFlags: u16 {
        const STATIC = 0x0008;
    }
}

/// One field in a class's field table, as the already-parsed class image exposes it.
/// Offsets are not assigned here — that is the linker's job (`runtime::class`).
#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub access_flags: FieldAccessFlags,
}

impl FieldInfo {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_static() {
        let field = FieldInfo {
            name: "counter".to_string(),
            descriptor: "I".to_string(),
            access_flags: FieldAccessFlags::STATIC,
        };
        assert!(field.is_static());
    }

    #[test]
    fn test_is_instance() {
        let field = FieldInfo {
            name: "value".to_string(),
            descriptor: "I".to_string(),
            access_flags: FieldAccessFlags::empty(),
        };
        assert!(!field.is_static());
    }
}
