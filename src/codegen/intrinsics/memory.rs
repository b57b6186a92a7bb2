//! Linear memory: growth, string placement, loads and stores
//!
//! Memory is the static `byte[] memory` field. Growing it allocates a new
//! array and copies the old contents, so an address stays valid for as long
//! as the region it points into is allocated. Multi-byte values are stored
//! little-endian, one `bastore` per byte, and loads zero-extend.

use super::{emit_method, Runtime, CSTR_TO_STRING, EXTEND_MEM, LOAD_DESCRIPTOR, PUT_STRING, STORE_DESCRIPTOR};
use crate::codegen::builder::CodeBuilder;
use crate::codegen::code::Label;
use crate::codegen::context::CodegenContext;
use crate::codegen::error::CodeGenResult;
use crate::codegen::opcodes::Mnemonic;
use crate::codegen::operand::OperandType;

const ARRAYCOPY: (&str, &str, &str) = ("java/lang/System", "arraycopy", "(Ljava/lang/Object;ILjava/lang/Object;II)V");
const UTF_8: (&str, &str, &str) = ("java/nio/charset/StandardCharsets", "UTF_8", "Ljava/nio/charset/Charset;");

/// Access width of a load or store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub const ALL: [Width; 4] = [Width::W8, Width::W16, Width::W32, Width::W64];

    pub fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn load_name(self) -> &'static str {
        match self {
            Width::W8 => "load_8",
            Width::W16 => "load_16",
            Width::W32 => "load_32",
            Width::W64 => "load_64",
        }
    }

    pub fn store_name(self) -> &'static str {
        match self {
            Width::W8 => "store_8",
            Width::W16 => "store_16",
            Width::W32 => "store_32",
            Width::W64 => "store_64",
        }
    }
}

/// Push `UTF_8` for the charset-taking `String` methods
pub(crate) fn push_utf8_charset(code: &mut CodeBuilder<'_>) -> CodeGenResult<()> {
    let (class, name, descriptor) = UTF_8;
    let charset = code.pool().field_ref(class, name, descriptor);
    code.getstatic(charset)?;
    Ok(())
}

fn arraycopy(code: &mut CodeBuilder<'_>) -> CodeGenResult<()> {
    let (class, name, descriptor) = ARRAYCOPY;
    let method = code.pool().method_ref(class, name, descriptor);
    code.invokestatic(method)?;
    Ok(())
}

/// `memory, (int) address + offset`, ready for `baload` or a value then `bastore`
fn byte_slot(code: &mut CodeBuilder<'_>, rt: &Runtime, address: usize, offset: usize) -> CodeGenResult<()> {
    code.getstatic(rt.memory)?.lload(address)?.l2i()?;
    if offset != 0 {
        code.push_int(offset as i64)?.iadd()?;
    }
    Ok(())
}

/// `extend_mem(n)`: grow (or, for negative `n`, shrink) memory by `n` bytes
/// and return the old length
fn extend_mem(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: n, 1: old length, 2: new array
    code.getstatic(rt.memory)?.arraylength()?.istore(1)?;
    code.iload(1)?.iload(0)?.iadd()?.newarray(OperandType::Byte)?.astore(2)?;

    code.getstatic(rt.memory)?.push_int(0)?.aload(2)?.push_int(0)?;
    code.iload(1)?.iload(1)?.iload(0)?.iadd()?;
    let min = code.pool().method_ref("java/lang/Math", "min", "(II)I");
    code.invokestatic(min)?;
    arraycopy(code)?;

    code.aload(2)?.putstatic(rt.memory)?;
    code.iload(1)?.i2l()?.lreturn()?;
    Ok(())
}

/// `put_string(s)`: append the UTF-8 bytes of `s` to memory, returning their address
fn put_string(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: string, 1: bytes, 2: base
    let get_bytes = code.pool().method_ref("java/lang/String", "getBytes", "(Ljava/nio/charset/Charset;)[B");
    code.aload(0)?;
    push_utf8_charset(code)?;
    code.invokevirtual(get_bytes)?.astore(1)?;
    code.aload(1)?.arraylength()?.invokestatic(rt.extend_mem)?.lstore(2)?;

    code.aload(1)?.push_int(0)?.getstatic(rt.memory)?.lload(2)?.l2i()?;
    code.aload(1)?.arraylength()?;
    arraycopy(code)?;
    code.lload(2)?.lreturn()?;
    Ok(())
}

/// `cstr_to_string(address)`: decode the NUL-terminated bytes at `address`
fn cstr_to_string(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: address, 2: cursor
    let scan = Label::new("scan");
    let found = Label::new("found");
    code.lload(0)?.l2i()?.istore(2)?;
    code.label(scan.clone())?;
    code.getstatic(rt.memory)?.iload(2)?.op(Mnemonic::Baload)?;
    code.branch(Mnemonic::Ifeq, found.clone())?;
    code.iinc(2, 1)?.goto(scan)?;

    code.label(found)?.end_branch()?;
    let init = code
        .pool()
        .method_ref("java/lang/String", "<init>", "([BIILjava/nio/charset/Charset;)V");
    code.new_dup("java/lang/String")?;
    code.getstatic(rt.memory)?.lload(0)?.l2i()?;
    code.iload(2)?.lload(0)?.l2i()?.op(Mnemonic::Isub)?;
    push_utf8_charset(code)?;
    code.invokespecial(init)?.areturn()?;
    Ok(())
}

/// `load_N(address)`: little-endian, zero-extended
fn load(code: &mut CodeBuilder<'_>, rt: &Runtime, width: Width) -> CodeGenResult<()> {
    code.push_long(0)?;
    for i in 0..width.bytes() {
        byte_slot(code, rt, 0, i)?;
        code.op(Mnemonic::Baload)?.push_int(0xff)?.op(Mnemonic::Iand)?.i2l()?;
        if i != 0 {
            code.push_int(8 * i as i64)?.op(Mnemonic::Lshl)?;
        }
        code.lor()?;
    }
    code.lreturn()?;
    Ok(())
}

/// `store_N(value, address)`: the low N bytes of `value`, little-endian
fn store(code: &mut CodeBuilder<'_>, rt: &Runtime, width: Width) -> CodeGenResult<()> {
    for i in 0..width.bytes() {
        byte_slot(code, rt, 2, i)?;
        code.lload(0)?;
        if i != 0 {
            code.push_int(8 * i as i64)?.op(Mnemonic::Lushr)?;
        }
        code.l2i()?.op(Mnemonic::Bastore)?;
    }
    code.return_void()?;
    Ok(())
}

pub fn emit(ctx: &mut CodegenContext<'_>) -> CodeGenResult<()> {
    let (name, descriptor) = EXTEND_MEM;
    emit_method(ctx, name, descriptor, extend_mem)?;
    let (name, descriptor) = PUT_STRING;
    emit_method(ctx, name, descriptor, put_string)?;
    let (name, descriptor) = CSTR_TO_STRING;
    emit_method(ctx, name, descriptor, cstr_to_string)?;
    for width in Width::ALL {
        emit_method(ctx, width.load_name(), LOAD_DESCRIPTOR, |code, rt| load(code, rt, width))?;
        emit_method(ctx, width.store_name(), STORE_DESCRIPTOR, |code, rt| store(code, rt, width))?;
    }
    Ok(())
}
