//! Trait-based serialization for classfile structures

use std::io::Write;

use super::class::{AttributeInfo, ClassFile, CodeAttribute, FieldInfo, MethodInfo};
use super::constpool::ConstantPool;
use super::error::CodeGenResult;

/// An object which can be written into a classfile.
pub trait ClassfileWritable {
    /// Writes the bytes of this object into the given buffer.
    ///
    /// # Arguments
    ///
    /// * `buffer` - classfile byte-buffer into which this object should be written
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> CodeGenResult<()>;

    /// Writes the bytes of this object into a newly created buffer.
    fn to_classfile_bytes(&self) -> CodeGenResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to_classfile(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_u16<W: Write>(buffer: &mut W, value: u16) -> CodeGenResult<()> {
    buffer.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn write_count<W: Write>(buffer: &mut W, count: usize, what: &str) -> CodeGenResult<()> {
    let count = u16::try_from(count).map_err(|_| super::error::CodeGenError::Resource {
        message: format!("too many {}: {}", what, count),
    })?;
    write_u16(buffer, count)
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> CodeGenResult<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        write_u16(buffer, self.minor_version)?;
        write_u16(buffer, self.major_version)?;

        self.constant_pool.write_to_classfile(buffer)?;

        write_u16(buffer, self.access_flags)?;
        write_u16(buffer, self.this_class)?;
        write_u16(buffer, self.super_class)?;
        // no interfaces
        write_u16(buffer, 0)?;

        write_count(buffer, self.fields.len(), "fields")?;
        for field in &self.fields {
            field.write_to_classfile(buffer)?;
        }

        write_count(buffer, self.methods.len(), "methods")?;
        for method in &self.methods {
            method.write_with_code_name(buffer, self.code_attribute_name)?;
        }

        write_count(buffer, self.attributes.len(), "attributes")?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> CodeGenResult<()> {
        self.validate()?;
        buffer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> CodeGenResult<()> {
        write_u16(buffer, self.access_flags)?;
        write_u16(buffer, self.name_index)?;
        write_u16(buffer, self.descriptor_index)?;
        // attributes_count
        write_u16(buffer, 0)
    }
}

impl ClassfileWritable for AttributeInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> CodeGenResult<()> {
        buffer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

impl MethodInfo {
    /// Encode the body and write the method with its single `Code` attribute
    fn write_with_code_name<W: Write>(&self, buffer: &mut W, code_name: u16) -> CodeGenResult<()> {
        let code = CodeAttribute {
            max_stack: self.code.max_stack,
            max_locals: self.code.max_locals,
            code: self.code.encode()?,
        };
        write_u16(buffer, self.access_flags)?;
        write_u16(buffer, self.name_index)?;
        write_u16(buffer, self.descriptor_index)?;
        write_u16(buffer, 1)?;
        AttributeInfo { name_index: code_name, info: code.to_bytes() }.write_to_classfile(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::builder::CodeBuilder;
    use crate::codegen::class::access_flags::*;

    #[test]
    fn writes_header_and_method() {
        let mut class = ClassFile::new("Main");
        let code = {
            let mut b = CodeBuilder::new(&mut class.constant_pool, 0);
            b.return_void().unwrap();
            b.finish().unwrap()
        };
        class.add_method(ACC_PUBLIC | ACC_STATIC, "run", "()V", code);
        let bytes = class.to_classfile_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 49]);
        // Code attribute ends with: code_length 1, return, no handlers, no attributes
        assert_eq!(&bytes[bytes.len() - 11..bytes.len() - 2], &[0, 0, 0, 1, 0xb1, 0, 0, 0, 0]);
    }
}
