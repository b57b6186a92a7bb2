//! Value categories distinguished by the operand stack

use std::fmt;

/// A value category on the JVM operand stack or in a local variable.
///
/// `Byte`, `Short`, `Char` and `Boolean` only exist as declared types; on the
/// stack they are all represented as `Integer` and unify with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    Reference,
    Integer,
    Float,
    Double,
    Long,
    Byte,
    Short,
    Char,
    Boolean,
}

/// Types that share the `int` computational category
pub const INTEGER_TYPES: [OperandType; 5] = [
    OperandType::Integer,
    OperandType::Boolean,
    OperandType::Byte,
    OperandType::Short,
    OperandType::Char,
];

impl OperandType {
    /// Number of stack or local slots a value of this type occupies
    pub fn width(self) -> usize {
        match self {
            OperandType::Long | OperandType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(self) -> bool {
        self.width() == 2
    }

    /// Element type code used by `newarray`, `None` for references
    pub fn array_type_code(self) -> Option<u8> {
        match self {
            OperandType::Reference => None,
            OperandType::Boolean => Some(4),
            OperandType::Char => Some(5),
            OperandType::Float => Some(6),
            OperandType::Double => Some(7),
            OperandType::Byte => Some(8),
            OperandType::Short => Some(9),
            OperandType::Integer => Some(10),
            OperandType::Long => Some(11),
        }
    }

    pub fn from_array_type_code(code: u8) -> Option<Self> {
        [
            OperandType::Boolean,
            OperandType::Char,
            OperandType::Float,
            OperandType::Double,
            OperandType::Byte,
            OperandType::Short,
            OperandType::Integer,
            OperandType::Long,
        ]
        .into_iter()
        .find(|ty| ty.array_type_code() == Some(code))
    }

    pub fn is_integer_family(self) -> bool {
        INTEGER_TYPES.contains(&self)
    }

    /// The type a value of this declared type has once it sits on the stack
    pub fn computational(self) -> Self {
        if self.is_integer_family() {
            OperandType::Integer
        } else {
            self
        }
    }

    /// Whether a stack value of type `self` satisfies an expected input type
    pub fn unifies_with(self, expected: OperandType) -> bool {
        self.computational() == expected.computational()
    }

    /// Map a field descriptor's leading character to its type
    pub fn from_descriptor_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(OperandType::Integer),
            'J' => Some(OperandType::Long),
            'F' => Some(OperandType::Float),
            'D' => Some(OperandType::Double),
            'B' => Some(OperandType::Byte),
            'S' => Some(OperandType::Short),
            'C' => Some(OperandType::Char),
            'Z' => Some(OperandType::Boolean),
            'L' | '[' => Some(OperandType::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandType::Reference => "reference",
            OperandType::Integer => "int",
            OperandType::Float => "float",
            OperandType::Double => "double",
            OperandType::Long => "long",
            OperandType::Byte => "byte",
            OperandType::Short => "short",
            OperandType::Char => "char",
            OperandType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Total slot width of a sequence of values
pub fn total_width(types: &[OperandType]) -> usize {
    types.iter().map(|ty| ty.width()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_category() {
        assert_eq!(OperandType::Long.width(), 2);
        assert_eq!(OperandType::Double.width(), 2);
        for ty in INTEGER_TYPES {
            assert_eq!(ty.width(), 1);
        }
        assert_eq!(OperandType::Reference.width(), 1);
    }

    #[test]
    fn array_codes_round_trip() {
        assert_eq!(OperandType::Long.array_type_code(), Some(11));
        assert_eq!(OperandType::Byte.array_type_code(), Some(8));
        assert_eq!(OperandType::from_array_type_code(8), Some(OperandType::Byte));
        assert_eq!(OperandType::from_array_type_code(3), None);
        assert_eq!(OperandType::Reference.array_type_code(), None);
    }

    #[test]
    fn integer_family_unifies() {
        assert!(OperandType::Boolean.unifies_with(OperandType::Integer));
        assert!(OperandType::Integer.unifies_with(OperandType::Char));
        assert!(!OperandType::Long.unifies_with(OperandType::Integer));
        assert!(!OperandType::Float.unifies_with(OperandType::Integer));
    }
}
