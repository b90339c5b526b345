use crate::Error::UnsupportedType;
use crate::Result;
use crate::value::VmType;

/// A field or parameter type as it appears in a descriptor string.
///
/// Descriptor strings are already extracted from the constant pool by the
/// out-of-scope class-file decoder; this type only interprets that string, it does
/// not decode `.class` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Base(VmType),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Returns the [`VmType`] a value of this field type occupies at runtime.
    #[must_use]
    pub fn vm_type(&self) -> VmType {
        match self {
            FieldType::Base(base) => *base,
            FieldType::Object(_) | FieldType::Array(_) => VmType::Reference,
        }
    }

    /// Parses one field descriptor starting at `bytes[0]`, returning the type and the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedType`] if the descriptor is malformed.
    fn parse_one(bytes: &[u8]) -> Result<(FieldType, usize)> {
        let Some(&tag) = bytes.first() else {
            return Err(UnsupportedType("empty descriptor".to_string()));
        };
        let field_type = match tag {
            b'B' => (FieldType::Base(VmType::Byte), 1),
            b'Z' => (FieldType::Base(VmType::Bool), 1),
            b'C' => (FieldType::Base(VmType::Char), 1),
            b'S' => (FieldType::Base(VmType::Short), 1),
            b'I' => (FieldType::Base(VmType::Int), 1),
            b'J' => (FieldType::Base(VmType::Long), 1),
            b'F' => (FieldType::Base(VmType::Float), 1),
            b'D' => (FieldType::Base(VmType::Double), 1),
            b'V' => (FieldType::Base(VmType::Void), 1),
            b'L' => {
                let end = bytes
                    .iter()
                    .position(|&b| b == b';')
                    .ok_or_else(|| UnsupportedType("unterminated object descriptor".to_string()))?;
                let name = String::from_utf8_lossy(&bytes[1..end]).into_owned();
                (FieldType::Object(name), end + 1)
            }
            b'[' => {
                let (inner, consumed) = Self::parse_one(&bytes[1..])?;
                (FieldType::Array(Box::new(inner)), consumed + 1)
            }
            other => {
                return Err(UnsupportedType(format!("unknown descriptor tag '{}'", other as char)));
            }
        };
        Ok(field_type)
    }

    /// Parses a standalone field descriptor, e.g. `"I"` or `"[Ljava/lang/String;"`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedType`] if the descriptor is malformed or has
    /// trailing bytes.
    pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType> {
        let bytes = descriptor.as_bytes();
        let (field_type, consumed) = Self::parse_one(bytes)?;
        if consumed != bytes.len() {
            return Err(UnsupportedType(format!("trailing data in descriptor '{descriptor}'")));
        }
        Ok(field_type)
    }

    /// Parses a method descriptor, e.g. `"(II)I"`, returning the parameter types in
    /// declaration order and the return type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedType`] if the descriptor is malformed.
    pub fn parse_method_descriptor(descriptor: &str) -> Result<(Vec<FieldType>, FieldType)> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(UnsupportedType(format!("expected '(' in descriptor '{descriptor}'")));
        }
        let mut offset = 1;
        let mut parameters = Vec::new();
        while bytes.get(offset) != Some(&b')') {
            let (field_type, consumed) = Self::parse_one(&bytes[offset..])?;
            parameters.push(field_type);
            offset += consumed;
        }
        offset += 1;
        let (return_type, consumed) = Self::parse_one(&bytes[offset..])?;
        if offset + consumed != bytes.len() {
            return Err(UnsupportedType(format!("trailing data in descriptor '{descriptor}'")));
        }
        Ok((parameters, return_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_descriptor_int() {
        assert_eq!(
            FieldType::parse_field_descriptor("I").expect("parse"),
            FieldType::Base(VmType::Int)
        );
    }

    #[test]
    fn test_parse_field_descriptor_object() {
        assert_eq!(
            FieldType::parse_field_descriptor("Ljava/lang/String;").expect("parse"),
            FieldType::Object("java/lang/String".to_string())
        );
    }

    #[test]
    fn test_parse_field_descriptor_array() {
        assert_eq!(
            FieldType::parse_field_descriptor("[I").expect("parse"),
            FieldType::Array(Box::new(FieldType::Base(VmType::Int)))
        );
    }

    #[test]
    fn test_parse_method_descriptor_two_ints() {
        let (parameters, return_type) =
            FieldType::parse_method_descriptor("(II)I").expect("parse");
        assert_eq!(parameters, vec![FieldType::Base(VmType::Int), FieldType::Base(VmType::Int)]);
        assert_eq!(return_type, FieldType::Base(VmType::Int));
    }

    #[test]
    fn test_parse_method_descriptor_void_no_args() {
        let (parameters, return_type) = FieldType::parse_method_descriptor("()V").expect("parse");
        assert!(parameters.is_empty());
        assert_eq!(return_type, FieldType::Base(VmType::Void));
    }

    #[test]
    fn test_parse_method_descriptor_mixed() {
        let (parameters, return_type) =
            FieldType::parse_method_descriptor("(Ljava/lang/String;J[I)D").expect("parse");
        assert_eq!(
            parameters,
            vec![
                FieldType::Object("java/lang/String".to_string()),
                FieldType::Base(VmType::Long),
                FieldType::Array(Box::new(FieldType::Base(VmType::Int))),
            ]
        );
        assert_eq!(return_type, FieldType::Base(VmType::Double));
    }

    #[test]
    fn test_parse_method_descriptor_missing_paren() {
        assert!(FieldType::parse_method_descriptor("II)I").is_err());
    }
}
