//! Utilities to build and read method/field descriptors

use super::operand::OperandType;

/// Descriptor of the 64-bit cell every IR value is represented as
pub const CELL: &str = "J";
/// Descriptor of the array used to return more than one cell
pub const CELL_ARRAY: &str = "[J";

/// Parameter and return types of a method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodShape {
    pub params: Vec<OperandType>,
    pub ret: Option<OperandType>,
}

impl MethodShape {
    /// Local slots taken by the parameters of a static method
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(|ty| ty.width()).sum()
    }
}

/// Read one field type starting at `pos`, returning its type and the next position
fn field_type(desc: &[u8], pos: usize) -> Option<(OperandType, usize)> {
    let c = *desc.get(pos)? as char;
    match c {
        'L' => {
            let end = desc[pos..].iter().position(|&b| b == b';')?;
            Some((OperandType::Reference, pos + end + 1))
        }
        '[' => {
            let mut p = pos;
            while desc.get(p) == Some(&b'[') {
                p += 1;
            }
            let (_, next) = field_type(desc, p)?;
            Some((OperandType::Reference, next))
        }
        _ => OperandType::from_descriptor_char(c).map(|ty| (ty, pos + 1)),
    }
}

/// Type of a field descriptor such as `J` or `[B`
pub fn parse_field_descriptor(desc: &str) -> Option<OperandType> {
    match field_type(desc.as_bytes(), 0)? {
        (ty, end) if end == desc.len() => Some(ty),
        _ => None,
    }
}

/// Split a method descriptor such as `(JI)[J` into parameters and return type
pub fn parse_method_descriptor(desc: &str) -> Option<MethodShape> {
    let bytes = desc.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }
    let mut pos = 1;
    let mut params = Vec::new();
    while *bytes.get(pos)? != b')' {
        let (ty, next) = field_type(bytes, pos)?;
        params.push(ty);
        pos = next;
    }
    pos += 1;
    let ret = if bytes.get(pos) == Some(&b'V') && pos + 1 == bytes.len() {
        None
    } else {
        match field_type(bytes, pos)? {
            (ty, end) if end == bytes.len() => Some(ty),
            _ => return None,
        }
    };
    Some(MethodShape { params, ret })
}

/// Descriptor of a procedure taking `ins` cells and producing `outs` cells.
///
/// Zero outputs return `void`, one returns the bare cell, more return a cell array.
pub fn procedure_descriptor(ins: usize, outs: usize) -> String {
    let mut d = String::from("(");
    for _ in 0..ins {
        d.push_str(CELL);
    }
    d.push(')');
    d.push_str(match outs {
        0 => "V",
        1 => CELL,
        _ => CELL_ARRAY,
    });
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_descriptors() {
        let shape = parse_method_descriptor("(JI[BLjava/lang/String;)[J").unwrap();
        assert_eq!(
            shape.params,
            vec![OperandType::Long, OperandType::Integer, OperandType::Reference, OperandType::Reference]
        );
        assert_eq!(shape.ret, Some(OperandType::Reference));
        assert_eq!(shape.param_slots(), 5);

        let void = parse_method_descriptor("()V").unwrap();
        assert!(void.params.is_empty());
        assert_eq!(void.ret, None);

        assert!(parse_method_descriptor("JJ").is_none());
        assert!(parse_method_descriptor("(J").is_none());
        assert!(parse_method_descriptor("(Ljava/lang/String)V").is_none());
    }

    #[test]
    fn parses_field_descriptors() {
        assert_eq!(parse_field_descriptor("[B"), Some(OperandType::Reference));
        assert_eq!(parse_field_descriptor("J"), Some(OperandType::Long));
        assert_eq!(parse_field_descriptor("Z"), Some(OperandType::Boolean));
        assert_eq!(parse_field_descriptor("JJ"), None);
    }

    #[test]
    fn procedure_descriptors() {
        assert_eq!(procedure_descriptor(0, 0), "()V");
        assert_eq!(procedure_descriptor(2, 1), "(JJ)J");
        assert_eq!(procedure_descriptor(1, 3), "(J)[J");
    }
}
