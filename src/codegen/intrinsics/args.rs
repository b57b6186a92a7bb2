//! Command line and environment setup
//!
//! `prepare_argv` lays out, in freshly allocated memory,
//!
//! ```text
//! argc_address:     [argc]
//! argv_address:     [argv0] [argv1] .. [argvN-1] [0]
//! ```
//!
//! with `argv0` the class name and every pointer addressing a NUL-terminated
//! string. `prepare_envp` builds the same kind of NULL-terminated table of
//! `key=value` strings.

use super::{emit_method, Runtime, Width, CELL_SIZE, PREPARE_ARGV, PREPARE_ENVP};
use crate::codegen::builder::CodeBuilder;
use crate::codegen::code::Label;
use crate::codegen::context::CodegenContext;
use crate::codegen::error::CodeGenResult;
use crate::codegen::opcodes::Mnemonic;

/// `put_string` followed by one zero byte; leaves the string's address
fn put_cstring(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    code.invokestatic(rt.put_string)?;
    code.push_int(1)?.invokestatic(rt.extend_mem)?.pop2()?;
    Ok(())
}

/// `table + index * 8` where `index` is the int on top of the stack
fn table_slot(code: &mut CodeBuilder<'_>, table_field: u16) -> CodeGenResult<()> {
    code.i2l()?.push_long(CELL_SIZE)?.lmul()?;
    code.getstatic(table_field)?.ladd()?;
    Ok(())
}

fn prepare_argv(code: &mut CodeBuilder<'_>, rt: &Runtime, program_name: &str) -> CodeGenResult<()> {
    // 0: args, 1: argc, 2: base, 4: counter
    let next = Label::new("next_arg");
    let done = Label::new("args_done");

    code.aload(0)?.arraylength()?.push_int(1)?.iadd()?.istore(1)?;
    // argc cell, argc pointers, terminator
    code.iload(1)?.push_int(2)?.iadd()?.push_int(CELL_SIZE)?.op(Mnemonic::Imul)?;
    code.invokestatic(rt.extend_mem)?.lstore(2)?;
    code.lload(2)?.putstatic(rt.argc)?;
    code.lload(2)?.push_long(CELL_SIZE)?.ladd()?.putstatic(rt.argv)?;
    code.iload(1)?.i2l()?.lload(2)?.invokestatic(rt.store(Width::W64))?;

    code.push_string(program_name)?;
    put_cstring(code, rt)?;
    code.getstatic(rt.argv)?.invokestatic(rt.store(Width::W64))?;

    code.push_int(0)?.istore(4)?;
    code.label(next.clone())?;
    code.iload(4)?.aload(0)?.arraylength()?.branch(Mnemonic::IfIcmpge, done.clone())?;
    code.aload(0)?.iload(4)?.op(Mnemonic::Aaload)?;
    put_cstring(code, rt)?;
    code.iload(4)?.push_int(1)?.iadd()?;
    table_slot(code, rt.argv)?;
    code.invokestatic(rt.store(Width::W64))?;
    code.iinc(4, 1)?.goto(next)?;

    code.label(done)?.end_branch()?;
    code.return_void()?;
    Ok(())
}

fn prepare_envp(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: environment map, 1: iterator, 2: counter, 3: entry
    let next = Label::new("next_var");
    let done = Label::new("vars_done");
    let pool = code.pool();
    let getenv = pool.method_ref("java/lang/System", "getenv", "()Ljava/util/Map;");
    let size = pool.interface_method_ref("java/util/Map", "size", "()I");
    let entry_set = pool.interface_method_ref("java/util/Map", "entrySet", "()Ljava/util/Set;");
    let iterator = pool.interface_method_ref("java/util/Set", "iterator", "()Ljava/util/Iterator;");
    let has_next = pool.interface_method_ref("java/util/Iterator", "hasNext", "()Z");
    let next_entry = pool.interface_method_ref("java/util/Iterator", "next", "()Ljava/lang/Object;");
    let get_key = pool.interface_method_ref("java/util/Map$Entry", "getKey", "()Ljava/lang/Object;");
    let get_value = pool.interface_method_ref("java/util/Map$Entry", "getValue", "()Ljava/lang/Object;");

    code.invokestatic(getenv)?.astore(0)?;
    code.aload(0)?.invokeinterface(size)?.push_int(1)?.iadd()?;
    code.push_int(CELL_SIZE)?.op(Mnemonic::Imul)?.invokestatic(rt.extend_mem)?.putstatic(rt.envp)?;
    code.aload(0)?.invokeinterface(entry_set)?.invokeinterface(iterator)?.astore(1)?;
    code.push_int(0)?.istore(2)?;

    code.label(next.clone())?;
    code.aload(1)?.invokeinterface(has_next)?.branch(Mnemonic::Ifeq, done.clone())?;
    code.aload(1)?.invokeinterface(next_entry)?.checkcast("java/util/Map$Entry")?.astore(3)?;
    // key, "=" and value land next to each other, so the first address covers all three
    code.aload(3)?.invokeinterface(get_key)?.checkcast("java/lang/String")?;
    code.invokestatic(rt.put_string)?;
    code.push_string("=")?.invokestatic(rt.put_string)?.pop2()?;
    code.aload(3)?.invokeinterface(get_value)?.checkcast("java/lang/String")?;
    put_cstring(code, rt)?;
    code.pop2()?;
    code.iload(2)?;
    table_slot(code, rt.envp)?;
    code.invokestatic(rt.store(Width::W64))?;
    code.iinc(2, 1)?.goto(next)?;

    code.label(done)?.end_branch()?;
    code.return_void()?;
    Ok(())
}

pub fn emit(ctx: &mut CodegenContext<'_>) -> CodeGenResult<()> {
    let program_name = ctx.config.class_name.clone();
    let (name, descriptor) = PREPARE_ARGV;
    emit_method(ctx, name, descriptor, |code, rt| prepare_argv(code, rt, &program_name))?;
    let (name, descriptor) = PREPARE_ENVP;
    emit_method(ctx, name, descriptor, prepare_envp)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::class::ClassFile;

    #[test]
    fn argv_setup_balances() {
        let mut class = ClassFile::new("Main");
        let rt = Runtime::declare(&mut class);
        let mut code = CodeBuilder::new(&mut class.constant_pool, 1);
        prepare_argv(&mut code, &rt, "Main").unwrap();
        let code = code.finish().unwrap();
        assert_eq!(code.max_locals, 5);
        assert!(code.encode().is_ok());
    }

    #[test]
    fn envp_setup_balances() {
        let mut class = ClassFile::new("Main");
        let rt = Runtime::declare(&mut class);
        let mut code = CodeBuilder::new(&mut class.constant_pool, 0);
        prepare_envp(&mut code, &rt).unwrap();
        let code = code.finish().unwrap();
        assert_eq!(code.max_locals, 4);
    }
}
