use std::fmt::{Display, Formatter};

/// Element type of a tensor flowing through a [Function](crate::function::Function).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ElementType {
    /// Not yet known, only valid during construction of generic ops.
    Dynamic,
    Boolean,
    Bf16,
    F16,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U1,
    U8,
    U16,
    U32,
    U64,
}

impl ElementType {
    pub const ALL: &'static [ElementType] = &[
        ElementType::Dynamic,
        ElementType::Boolean,
        ElementType::Bf16,
        ElementType::F16,
        ElementType::F32,
        ElementType::F64,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U1,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Dynamic => "dynamic",
            ElementType::Boolean => "boolean",
            ElementType::Bf16 => "bf16",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U1 => "u1",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
        }
    }

    pub fn bitwidth(self) -> usize {
        match self {
            ElementType::Dynamic => 0,
            ElementType::U1 => 1,
            ElementType::Boolean | ElementType::I8 | ElementType::U8 => 8,
            ElementType::Bf16 | ElementType::F16 | ElementType::I16 | ElementType::U16 => 16,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 32,
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 64,
        }
    }

    pub fn is_dynamic(self) -> bool {
        self == ElementType::Dynamic
    }

    pub fn is_real(self) -> bool {
        matches!(
            self,
            ElementType::Bf16 | ElementType::F16 | ElementType::F32 | ElementType::F64
        )
    }

    pub fn is_integral(self) -> bool {
        !self.is_real() && !self.is_dynamic()
    }

    pub fn is_signed(self) -> bool {
        match self {
            ElementType::Bf16 | ElementType::F16 | ElementType::F32 | ElementType::F64 => true,
            ElementType::I8 | ElementType::I16 | ElementType::I32 | ElementType::I64 => true,
            ElementType::Dynamic | ElementType::Boolean | ElementType::U1 => false,
            ElementType::U8 | ElementType::U16 | ElementType::U32 | ElementType::U64 => false,
        }
    }

    /// Merge two element types, where [ElementType::Dynamic] acts as a wildcard.
    pub fn merge(self, other: ElementType) -> Option<ElementType> {
        match (self, other) {
            (ElementType::Dynamic, other) => Some(other),
            (this, ElementType::Dynamic) => Some(this),
            (this, other) if this == other => Some(this),
            _ => None,
        }
    }

    /// Round a value the way it would be stored in a tensor of this type.
    pub fn cast_value(self, x: f64) -> f64 {
        match self {
            ElementType::Boolean | ElementType::U1 => (x != 0.0) as u8 as f64,
            ElementType::I8 => x as i8 as f64,
            ElementType::I16 => x as i16 as f64,
            ElementType::I32 => x as i32 as f64,
            ElementType::I64 => x as i64 as f64,
            ElementType::U8 => x as u8 as f64,
            ElementType::U16 => x as u16 as f64,
            ElementType::U32 => x as u32 as f64,
            ElementType::U64 => x as u64 as f64,
            ElementType::Bf16 | ElementType::F16 | ElementType::F32 => x as f32 as f64,
            ElementType::Dynamic | ElementType::F64 => x,
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod test {
    use crate::element::ElementType;

    #[test]
    fn merge_dynamic() {
        assert_eq!(ElementType::Dynamic.merge(ElementType::F32), Some(ElementType::F32));
        assert_eq!(ElementType::I64.merge(ElementType::Dynamic), Some(ElementType::I64));
        assert_eq!(ElementType::I64.merge(ElementType::F32), None);
    }

    #[test]
    fn cast_integral() {
        assert_eq!(ElementType::I32.cast_value(2.7), 2.0);
        assert_eq!(ElementType::U8.cast_value(-1.0), 0.0);
        assert_eq!(ElementType::Boolean.cast_value(0.3), 1.0);
        assert_eq!(ElementType::F32.cast_value(0.5), 0.5);
        assert_eq!(ElementType::F32.cast_value(0.1), 0.1f32 as f64);
    }
}
