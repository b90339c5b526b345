use crate::class_image::instruction::Instruction;
use bitflags::bitflags;

bitflags! {
    /// Method access flags, restricted to the bits the compiler inspects.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MethodAccessFlags: u16 {
        const STATIC = 0x0008;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
    }
}

/// One method in a class's method table, as the already-parsed class image exposes
/// it. The `code` attribute is only present for methods with a Java method body
/// (absent for `native`/`abstract` methods).
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub access_flags: MethodAccessFlags,
    pub max_locals: u16,
    pub code: Vec<Instruction>,
}

impl Method {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    #[must_use]
    pub fn is_compilable(&self) -> bool {
        !self.access_flags.contains(MethodAccessFlags::NATIVE)
            && !self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_static() {
        let method = Method {
            name: "main".to_string(),
            descriptor: "([Ljava/lang/String;)V".to_string(),
            access_flags: MethodAccessFlags::STATIC,
            max_locals: 1,
            code: Vec::new(),
        };
        assert!(method.is_static());
        assert!(method.is_compilable());
    }

    #[test]
    fn test_is_compilable_native() {
        let method = Method {
            name: "hashCode".to_string(),
            descriptor: "()I".to_string(),
            access_flags: MethodAccessFlags::NATIVE,
            max_locals: 0,
            code: Vec::new(),
        };
        assert!(!method.is_compilable());
    }
}
