//! Semantic type descriptors and the descriptor-string parser.

/// Primitive value types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimType {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimType {
    /// Source-style name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            PrimType::Bool => "boolean",
            PrimType::Byte => "byte",
            PrimType::Char => "char",
            PrimType::Short => "short",
            PrimType::Int => "int",
            PrimType::Long => "long",
            PrimType::Float => "float",
            PrimType::Double => "double",
            PrimType::Void => "void",
        }
    }

    /// True for types that participate in numeric promotion.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, PrimType::Bool | PrimType::Void)
    }

    /// True for whole-number types (shift and bitwise operands).
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimType::Byte | PrimType::Char | PrimType::Short | PrimType::Int | PrimType::Long
        )
    }
}

/// A semantic type: primitive, reference, or array-of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    Primitive(PrimType),
    Reference(String),
    Array(Box<TypeDesc>),
}

/// Internal name of the root reference type.
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Internal name of the string type.
pub const STRING_CLASS: &str = "java/lang/String";

impl TypeDesc {
    pub fn object() -> TypeDesc {
        TypeDesc::Reference(OBJECT_CLASS.to_string())
    }

    pub fn string() -> TypeDesc {
        TypeDesc::Reference(STRING_CLASS.to_string())
    }

    pub fn boolean() -> TypeDesc {
        TypeDesc::Primitive(PrimType::Bool)
    }

    pub fn int() -> TypeDesc {
        TypeDesc::Primitive(PrimType::Int)
    }

    pub fn as_primitive(&self) -> Option<PrimType> {
        match self {
            TypeDesc::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeDesc::Primitive(p) if p.is_numeric())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeDesc::Reference(_) | TypeDesc::Array(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, TypeDesc::Primitive(PrimType::Bool))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDesc::Primitive(PrimType::Void))
    }

    /// Source-style name for display, e.g. `int`, `java.lang.String`, `T[]`.
    pub fn display_name(&self) -> String {
        match self {
            TypeDesc::Primitive(p) => p.display_name().to_string(),
            TypeDesc::Reference(name) => internal_to_source_name(name),
            TypeDesc::Array(inner) => format!("{}[]", inner.display_name()),
        }
    }
}

/// Parse a single type descriptor starting at position `pos` in `desc`.
/// Returns `(TypeDesc, next_position)`.
pub fn parse_type_at(desc: &str, pos: usize) -> Option<(TypeDesc, usize)> {
    let bytes = desc.as_bytes();
    if pos >= bytes.len() {
        return None;
    }
    match bytes[pos] {
        b'B' => Some((TypeDesc::Primitive(PrimType::Byte), pos + 1)),
        b'C' => Some((TypeDesc::Primitive(PrimType::Char), pos + 1)),
        b'D' => Some((TypeDesc::Primitive(PrimType::Double), pos + 1)),
        b'F' => Some((TypeDesc::Primitive(PrimType::Float), pos + 1)),
        b'I' => Some((TypeDesc::Primitive(PrimType::Int), pos + 1)),
        b'J' => Some((TypeDesc::Primitive(PrimType::Long), pos + 1)),
        b'S' => Some((TypeDesc::Primitive(PrimType::Short), pos + 1)),
        b'Z' => Some((TypeDesc::Primitive(PrimType::Bool), pos + 1)),
        b'V' => Some((TypeDesc::Primitive(PrimType::Void), pos + 1)),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            if semi == 0 {
                return None;
            }
            let class_name = &desc[pos + 1..pos + 1 + semi];
            Some((TypeDesc::Reference(class_name.to_string()), pos + 1 + semi + 1))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            Some((TypeDesc::Array(Box::new(inner)), next))
        }
        _ => None,
    }
}

/// Parse a full type descriptor string; trailing garbage is rejected.
pub fn parse_type(desc: &str) -> Option<TypeDesc> {
    let (ty, next) = parse_type_at(desc, 0)?;
    if next != desc.len() {
        return None;
    }
    Some(ty)
}

/// Parse a method descriptor, e.g. `(II)V` -> `([Int, Int], Void)`.
pub fn parse_method(desc: &str) -> Option<(Vec<TypeDesc>, TypeDesc)> {
    if !desc.starts_with('(') {
        return None;
    }
    let close = desc.find(')')?;
    let mut params = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos)?;
        if ty.is_void() {
            return None;
        }
        params.push(ty);
        pos = next;
    }
    let (ret, next) = parse_type_at(desc, close + 1)?;
    if next != desc.len() {
        return None;
    }
    Some((params, ret))
}

/// Convert internal class name to source name.
pub fn internal_to_source_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Binary numeric promotion: the result type of an arithmetic operation
/// over two numeric operands (double > float > long > int; byte, short
/// and char promote to int).
pub fn binary_promotion(a: &TypeDesc, b: &TypeDesc) -> Option<TypeDesc> {
    let pa = a.as_primitive()?;
    let pb = b.as_primitive()?;
    if !pa.is_numeric() || !pb.is_numeric() {
        return None;
    }
    let promoted = if pa == PrimType::Double || pb == PrimType::Double {
        PrimType::Double
    } else if pa == PrimType::Float || pb == PrimType::Float {
        PrimType::Float
    } else if pa == PrimType::Long || pb == PrimType::Long {
        PrimType::Long
    } else {
        PrimType::Int
    };
    Some(TypeDesc::Primitive(promoted))
}

/// Unary numeric promotion (byte, short, char -> int).
pub fn unary_promotion(a: &TypeDesc) -> Option<TypeDesc> {
    let pa = a.as_primitive()?;
    if !pa.is_numeric() {
        return None;
    }
    let promoted = match pa {
        PrimType::Byte | PrimType::Char | PrimType::Short => PrimType::Int,
        other => other,
    };
    Some(TypeDesc::Primitive(promoted))
}

/// Least upper bound of two result types, used when merging conditional
/// branches. Defined for equal types, numeric pairs, and reference pairs
/// (which meet at the root reference type).
pub fn common_type(a: &TypeDesc, b: &TypeDesc) -> Option<TypeDesc> {
    if a == b {
        return Some(a.clone());
    }
    if a.is_numeric() && b.is_numeric() {
        return binary_promotion(a, b);
    }
    if a.is_reference() && b.is_reference() {
        return Some(TypeDesc::object());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_primitives() {
        assert_eq!(parse_type("I"), Some(TypeDesc::Primitive(PrimType::Int)));
        assert_eq!(parse_type("J"), Some(TypeDesc::Primitive(PrimType::Long)));
        assert_eq!(parse_type("Z"), Some(TypeDesc::Primitive(PrimType::Bool)));
        assert_eq!(parse_type("V"), Some(TypeDesc::Primitive(PrimType::Void)));
        assert_eq!(parse_type("X"), None);
        assert_eq!(parse_type("II"), None);
    }

    #[test]
    fn parse_reference_and_array() {
        assert_eq!(
            parse_type("Ljava/lang/String;"),
            Some(TypeDesc::Reference("java/lang/String".into()))
        );
        assert_eq!(
            parse_type("[[I"),
            Some(TypeDesc::Array(Box::new(TypeDesc::Array(Box::new(
                TypeDesc::Primitive(PrimType::Int)
            )))))
        );
        assert_eq!(parse_type("L;"), None);
        assert_eq!(parse_type("Ljava/lang/String"), None);
    }

    #[test]
    fn parse_method_descriptor() {
        let (params, ret) = parse_method("(Ljava/lang/String;I)[B").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], TypeDesc::string());
        assert_eq!(ret, TypeDesc::Array(Box::new(TypeDesc::Primitive(PrimType::Byte))));

        let (params, ret) = parse_method("()V").unwrap();
        assert!(params.is_empty());
        assert!(ret.is_void());

        assert_eq!(parse_method("(V)V"), None);
        assert_eq!(parse_method("II)V"), None);
    }

    #[test]
    fn promotion_rules() {
        let int = TypeDesc::int();
        let long = TypeDesc::Primitive(PrimType::Long);
        let double = TypeDesc::Primitive(PrimType::Double);
        let byte = TypeDesc::Primitive(PrimType::Byte);
        assert_eq!(binary_promotion(&int, &long), Some(long.clone()));
        assert_eq!(binary_promotion(&long, &double), Some(double.clone()));
        assert_eq!(binary_promotion(&byte, &byte), Some(int.clone()));
        assert_eq!(binary_promotion(&int, &TypeDesc::boolean()), None);
        assert_eq!(unary_promotion(&byte), Some(int.clone()));
    }

    #[test]
    fn common_type_rules() {
        assert_eq!(
            common_type(&TypeDesc::string(), &TypeDesc::string()),
            Some(TypeDesc::string())
        );
        assert_eq!(
            common_type(&TypeDesc::string(), &TypeDesc::object()),
            Some(TypeDesc::object())
        );
        assert_eq!(
            common_type(&TypeDesc::int(), &TypeDesc::Primitive(PrimType::Double)),
            Some(TypeDesc::Primitive(PrimType::Double))
        );
        assert_eq!(common_type(&TypeDesc::int(), &TypeDesc::string()), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(TypeDesc::string().display_name(), "java.lang.String");
        assert_eq!(
            TypeDesc::Array(Box::new(TypeDesc::int())).display_name(),
            "int[]"
        );
    }
}
