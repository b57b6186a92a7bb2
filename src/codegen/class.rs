//! Core classfile structures: ClassFile, FieldInfo, MethodInfo

use super::code::Code;
use super::constpool::ConstantPool;

pub const MAGIC: u32 = 0xCAFE_BABE;

/// Major version 49 (Java 5): the last one verified by type inference,
/// so methods need no `StackMapTable`
pub const JAVA_5: u16 = 49;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// Access flags for classes, fields and methods
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
}

/// A raw attribute: name index plus opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.info.len());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

/// Payload of a `Code` attribute once the instruction stream is encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
}

impl CodeAttribute {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12 + self.code.len());
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        // exception_table_length, attributes_count
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// A method whose body is still a symbolic [`Code`]; it is encoded when the
/// class is written
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub code: Code,
}

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
    /// `Utf8` index of the string "Code", interned with the first method
    pub code_attribute_name: u16,
}

impl ClassFile {
    /// An empty `public super` class named `name` extending `java/lang/Object`
    pub fn new(name: &str) -> Self {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.class(name);
        let super_class = constant_pool.class(JAVA_LANG_OBJECT);
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: JAVA_5,
            constant_pool,
            access_flags: access_flags::ACC_PUBLIC | access_flags::ACC_SUPER,
            this_class,
            super_class,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            code_attribute_name: 0,
        }
    }

    /// Binary name of this class
    pub fn name(&self) -> &str {
        self.constant_pool.class_name_at(self.this_class).unwrap_or_default()
    }

    pub fn add_field(&mut self, access_flags: u16, name: &str, descriptor: &str) {
        let name_index = self.constant_pool.utf8(name);
        let descriptor_index = self.constant_pool.utf8(descriptor);
        self.fields.push(FieldInfo { access_flags, name_index, descriptor_index });
    }

    pub fn add_method(&mut self, access_flags: u16, name: &str, descriptor: &str, code: Code) {
        let name_index = self.constant_pool.utf8(name);
        let descriptor_index = self.constant_pool.utf8(descriptor);
        if self.code_attribute_name == 0 {
            self.code_attribute_name = self.constant_pool.utf8("Code");
        }
        self.methods.push(MethodInfo { access_flags, name_index, descriptor_index, code });
    }

    /// Record the `SourceFile` attribute
    pub fn set_source_file(&mut self, file: &str) {
        let name_index = self.constant_pool.utf8("SourceFile");
        let file_index = self.constant_pool.utf8(file);
        self.attributes.retain(|attribute| attribute.name_index != name_index);
        self.attributes.push(AttributeInfo { name_index, info: file_index.to_be_bytes().to_vec() });
    }

    /// Find a method by name and descriptor
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|method| {
            self.constant_pool.utf8_at(method.name_index).ok() == Some(name)
                && self.constant_pool.utf8_at(method.descriptor_index).ok() == Some(descriptor)
        })
    }

    /// `(name, descriptor)` of every method in declaration order
    pub fn method_signatures(&self) -> Vec<(String, String)> {
        self.methods
            .iter()
            .map(|method| {
                let name = self.constant_pool.utf8_at(method.name_index).unwrap_or_default();
                let descriptor = self.constant_pool.utf8_at(method.descriptor_index).unwrap_or_default();
                (name.to_string(), descriptor.to_string())
            })
            .collect()
    }
}
