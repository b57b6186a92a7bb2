//! Deduplicating constant pool for Java class files
//!
//! Entries are keyed by their serialized form, so two structurally equal
//! constants always share one index. Composite entries intern their
//! components first, which makes independently built duplicates collapse too.
//! `Long` and `Double` occupy two slots; the second one is unusable padding.

use std::collections::HashMap;

use super::error::ConstPoolError;

/// Largest slot count a class file can address
pub const MAX_SLOTS: usize = u16::MAX as usize - 1;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

/// Method handle reference kinds
pub mod reference_kinds {
    pub const REF_GET_FIELD: u8 = 1;
    pub const REF_GET_STATIC: u8 = 2;
    pub const REF_PUT_FIELD: u8 = 3;
    pub const REF_PUT_STATIC: u8 = 4;
    pub const REF_INVOKE_VIRTUAL: u8 = 5;
    pub const REF_INVOKE_STATIC: u8 = 6;
    pub const REF_INVOKE_SPECIAL: u8 = 7;
    pub const REF_NEW_INVOKE_SPECIAL: u8 = 8;
    pub const REF_INVOKE_INTERFACE: u8 = 9;
}

/// Encode a string the way class files store `Utf8` constants.
///
/// NUL becomes the two-byte form `C0 80`, and supplementary characters are
/// written as a surrogate pair with each half in three-byte form.
pub fn modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

/// Length of `value` once encoded as modified UTF-8
pub fn modified_utf8_len(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007f => 1,
            0x0000 | 0x0080..=0x07ff => 2,
            _ => 3,
        })
        .sum()
}

impl Constant {
    pub fn to_bytes(&self) -> Vec<u8> {
        use constant_tags::*;
        let mut bytes = Vec::new();
        match self {
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                let encoded = modified_utf8(value);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&encoded);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Class(name_index) => {
                bytes.push(CONSTANT_CLASS);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::String(string_index) => {
                bytes.push(CONSTANT_STRING);
                bytes.extend_from_slice(&string_index.to_be_bytes());
            }
            Constant::FieldRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_FIELDREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::MethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_METHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_INTERFACEMETHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                bytes.push(CONSTANT_NAMEANDTYPE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::MethodHandle(reference_kind, reference_index) => {
                bytes.push(CONSTANT_METHODHANDLE);
                bytes.push(*reference_kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
            Constant::MethodType(descriptor_index) => {
                bytes.push(CONSTANT_METHODTYPE);
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::InvokeDynamic(bootstrap_method_attr_index, name_and_type_index) => {
                bytes.push(CONSTANT_INVOKEDYNAMIC);
                bytes.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::Module(name_index) => {
                bytes.push(CONSTANT_MODULE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::Package(name_index) => {
                bytes.push(CONSTANT_PACKAGE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
        }
        bytes
    }

    /// Whether this constant takes two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class(_) => "Class",
            Constant::String(_) => "String",
            Constant::FieldRef(..) => "Fieldref",
            Constant::MethodRef(..) => "Methodref",
            Constant::InterfaceMethodRef(..) => "InterfaceMethodref",
            Constant::NameAndType(..) => "NameAndType",
            Constant::MethodHandle(..) => "MethodHandle",
            Constant::MethodType(_) => "MethodType",
            Constant::InvokeDynamic(..) => "InvokeDynamic",
            Constant::Module(_) => "Module",
            Constant::Package(_) => "Package",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Entry(Constant),
    Padding,
}

/// A resolved field, method or call-site reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class: Option<&'a str>,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// Append-only constant pool with a reverse index on serialized form
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    slots: Vec<Slot>,
    lookup: HashMap<Vec<u8>, u16>,
    /// Slots requested after the pool filled up
    rejected: usize,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a constant, returning its index and whether it was newly added.
    ///
    /// Indices are 1-based. A `Long` or `Double` is followed by one padding
    /// slot. A constant that no longer fits is not stored and gets index 0;
    /// [`ConstantPool::check_space`] and [`ConstantPool::validate`] report it.
    pub fn intern(&mut self, constant: Constant) -> (u16, bool) {
        let key = constant.to_bytes();
        if let Some(&index) = self.lookup.get(&key) {
            return (index, false);
        }
        let wide = constant.is_wide();
        let width = if wide { 2 } else { 1 };
        if self.rejected > 0 || self.slots.len() + width > MAX_SLOTS {
            self.rejected += width;
            return (0, false);
        }
        let index = (self.slots.len() + 1) as u16;
        self.slots.push(Slot::Entry(constant));
        if wide {
            self.slots.push(Slot::Padding);
        }
        self.lookup.insert(key, index);
        (index, true)
    }

    fn add(&mut self, constant: Constant) -> u16 {
        self.intern(constant).0
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.add(Constant::Integer(value))
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.add(Constant::Float(value))
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.add(Constant::Long(value))
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.add(Constant::Double(value))
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.add(Constant::Class(name_index))
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8_index = self.utf8(value);
        self.add(Constant::String(utf8_index))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.add(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(Constant::FieldRef(class_index, name_and_type_index))
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(Constant::MethodRef(class_index, name_and_type_index))
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(Constant::InterfaceMethodRef(class_index, name_and_type_index))
    }

    pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.add(Constant::MethodHandle(reference_kind, reference_index))
    }

    pub fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.utf8(descriptor);
        self.add(Constant::MethodType(descriptor_index))
    }

    pub fn invoke_dynamic(&mut self, bootstrap_index: u16, name: &str, descriptor: &str) -> u16 {
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.add(Constant::InvokeDynamic(bootstrap_index, name_and_type_index))
    }

    pub fn module(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.add(Constant::Module(name_index))
    }

    pub fn package(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.add(Constant::Package(name_index))
    }

    /// Number of occupied slots, padding included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The constant at a 1-based index; `None` for index 0, padding or out of range
    pub fn get(&self, index: u16) -> Option<&Constant> {
        match self.slots.get((index as usize).checked_sub(1)?) {
            Some(Slot::Entry(constant)) => Some(constant),
            _ => None,
        }
    }

    pub fn is_padding(&self, index: u16) -> bool {
        matches!(
            (index as usize).checked_sub(1).and_then(|i| self.slots.get(i)),
            Some(Slot::Padding)
        )
    }

    /// Iterate over `(index, constant)` pairs, skipping padding
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Entry(constant) => Some(((i + 1) as u16, constant)),
            Slot::Padding => None,
        })
    }

    fn entry(&self, index: u16) -> Result<&Constant, ConstPoolError> {
        self.get(index).ok_or(ConstPoolError::InvalidIndex(index))
    }

    pub fn utf8_at(&self, index: u16) -> Result<&str, ConstPoolError> {
        match self.entry(index)? {
            Constant::Utf8(value) => Ok(value),
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "Utf8" }),
        }
    }

    pub fn class_name_at(&self, index: u16) -> Result<&str, ConstPoolError> {
        match self.entry(index)? {
            Constant::Class(name_index) => self.utf8_at(*name_index),
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "Class" }),
        }
    }

    fn name_and_type_at(&self, index: u16) -> Result<(&str, &str), ConstPoolError> {
        match self.entry(index)? {
            Constant::NameAndType(name, descriptor) => Ok((self.utf8_at(*name)?, self.utf8_at(*descriptor)?)),
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "NameAndType" }),
        }
    }

    /// Resolve a field, method, interface method or invokedynamic entry
    pub fn member_at(&self, index: u16) -> Result<MemberRef<'_>, ConstPoolError> {
        self.member_of(self.entry(index)?)
            .ok_or(ConstPoolError::UnexpectedKind { index, expected: "member reference" })
    }

    /// Resolve the class, name and descriptor a reference constant points at
    pub fn member_of(&self, constant: &Constant) -> Option<MemberRef<'_>> {
        match constant {
            Constant::FieldRef(class, nat)
            | Constant::MethodRef(class, nat)
            | Constant::InterfaceMethodRef(class, nat) => {
                let (name, descriptor) = self.name_and_type_at(*nat).ok()?;
                Some(MemberRef { class: Some(self.class_name_at(*class).ok()?), name, descriptor })
            }
            Constant::InvokeDynamic(_, nat) => {
                let (name, descriptor) = self.name_and_type_at(*nat).ok()?;
                Some(MemberRef { class: None, name, descriptor })
            }
            _ => None,
        }
    }

    /// Short human-readable rendering of an entry, used by listings
    pub fn describe(&self, index: u16) -> String {
        let Some(constant) = self.get(index) else {
            return format!("#{}", index);
        };
        match constant {
            Constant::Utf8(value) => format!("{:?}", value),
            Constant::Integer(value) => value.to_string(),
            Constant::Float(value) => format!("{}f", value),
            Constant::Long(value) => format!("{}L", value),
            Constant::Double(value) => format!("{}d", value),
            Constant::Class(_) => self.class_name_at(index).unwrap_or("?").to_string(),
            Constant::String(utf8) => format!("{:?}", self.utf8_at(*utf8).unwrap_or("?")),
            _ => match self.member_at(index) {
                Ok(member) => match member.class {
                    Some(class) => format!("{}.{}:{}", class, member.name, member.descriptor),
                    None => format!("{}:{}", member.name, member.descriptor),
                },
                Err(_) => format!("{} #{}", constant.kind_name(), index),
            },
        }
    }

    /// Fail once any constant has been turned away for lack of slots
    pub fn check_space(&self) -> Result<(), ConstPoolError> {
        if self.rejected > 0 {
            return Err(ConstPoolError::OutOfSpace { slots: self.slots.len() + self.rejected, max: MAX_SLOTS });
        }
        Ok(())
    }

    /// Check the limits a class file imposes on the pool
    pub fn validate(&self) -> Result<(), ConstPoolError> {
        self.check_space()?;
        for slot in &self.slots {
            if let Slot::Entry(Constant::Utf8(value)) = slot {
                let length = modified_utf8_len(value);
                if length > u16::MAX as usize {
                    return Err(ConstPoolError::Utf8TooLong { length });
                }
            }
        }
        Ok(())
    }

    /// Serialize the pool count followed by every entry
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&((self.slots.len() + 1) as u16).to_be_bytes());
        for slot in &self.slots {
            if let Slot::Entry(constant) = slot {
                bytes.extend_from_slice(&constant.to_bytes());
            }
        }
        bytes
    }
}
