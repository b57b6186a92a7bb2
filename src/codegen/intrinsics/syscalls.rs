//! Syscall trap tables and console output
//!
//! `syscallN` takes its arguments as they sit on the stack, deepest first,
//! with the syscall number last: `syscall3(count, buffer, fd, number)` for a
//! `write`. Each table dispatches with a `lookupswitch`; ids it does not
//! know return 0.

use super::{emit_method, Runtime, Width, CELL_SIZE, PRINT_LONG, SYSCALL1, SYSCALL2, SYSCALL3};
use crate::codegen::builder::CodeBuilder;
use crate::codegen::code::Label;
use crate::codegen::context::CodegenContext;
use crate::codegen::error::CodeGenResult;
use crate::codegen::opcodes::Mnemonic;

pub const SYS_READ: i32 = 0;
pub const SYS_WRITE: i32 = 1;
pub const SYS_CLOSE: i32 = 3;
pub const SYS_EXECVE: i32 = 59;
pub const SYS_EXIT: i32 = 60;
pub const SYS_CLOCK_GETTIME: i32 = 228;

pub const CLOCK_REALTIME: i32 = 0;
pub const CLOCK_MONOTONIC: i32 = 1;

const EBADF: i64 = -9;
const EINVAL: i64 = -22;

const FILE_DESCRIPTOR: &str = "Ljava/io/FileDescriptor;";

/// Syscall ids each table implements, indexed by arity - 1
pub const IMPLEMENTED: [&[i32]; 3] =
    [&[SYS_CLOSE, SYS_EXIT], &[SYS_CLOCK_GETTIME], &[SYS_READ, SYS_WRITE, SYS_EXECVE]];

/// Whether a literal syscall `number` with `arity` arguments has an implementation
pub fn is_implemented(arity: usize, number: i64) -> bool {
    arity
        .checked_sub(1)
        .and_then(|i| IMPLEMENTED.get(i))
        .map_or(false, |ids| ids.iter().any(|&id| id as i64 == number))
}

/// Branch to `bad` unless the cell in local `slot` indexes an open descriptor.
///
/// Returns the number of branches taken to `bad`.
fn guard_fd(code: &mut CodeBuilder<'_>, rt: &Runtime, slot: usize, bad: &Label) -> CodeGenResult<usize> {
    code.lload(slot)?.push_long(0)?.lcmp()?.branch(Mnemonic::Iflt, bad.clone())?;
    code.lload(slot)?.getstatic(rt.fds)?.arraylength()?.i2l()?.lcmp()?;
    code.branch(Mnemonic::Ifge, bad.clone())?;
    code.getstatic(rt.fds)?.lload(slot)?.l2i()?.op(Mnemonic::Aaload)?;
    code.branch(Mnemonic::Ifnull, bad.clone())?;
    Ok(3)
}

/// `new <stream>(fds[slot])`
fn open_stream(code: &mut CodeBuilder<'_>, rt: &Runtime, class: &str, slot: usize) -> CodeGenResult<()> {
    let init = code.pool().method_ref(class, "<init>", &format!("({})V", FILE_DESCRIPTOR));
    code.new_dup(class)?;
    code.getstatic(rt.fds)?.lload(slot)?.l2i()?.op(Mnemonic::Aaload)?;
    code.invokespecial(init)?;
    Ok(())
}

/// Close the end of each guard branch with `value` returned
fn guarded_return(code: &mut CodeBuilder<'_>, bad: Label, branches: usize, value: i64) -> CodeGenResult<()> {
    code.label(bad)?;
    for _ in 0..branches {
        code.end_branch()?;
    }
    code.push_long(value)?.lreturn()?;
    Ok(())
}

fn unknown(code: &mut CodeBuilder<'_>, label: Label) -> CodeGenResult<()> {
    code.label(label)?.push_long(0)?.lreturn()?;
    Ok(())
}

/// `syscall1(arg, number)`: close, exit
fn syscall1(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    let (close, exit, other, bad) =
        (Label::new("close"), Label::new("exit"), Label::new("unknown"), Label::new("bad_fd"));
    code.lload(2)?.l2i()?;
    code.lookupswitch(other.clone(), vec![(SYS_CLOSE, close.clone()), (SYS_EXIT, exit.clone())])?;

    code.label(close)?;
    let guards = guard_fd(code, rt, 0, &bad)?;
    open_stream(code, rt, "java/io/FileInputStream", 0)?;
    let close_stream = code.pool().method_ref("java/io/FileInputStream", "close", "()V");
    code.invokevirtual(close_stream)?;
    code.getstatic(rt.fds)?.lload(0)?.l2i()?.push_null()?.op(Mnemonic::Aastore)?;
    code.push_long(0)?.lreturn()?;

    code.label(exit)?;
    let system_exit = code.pool().method_ref("java/lang/System", "exit", "(I)V");
    code.lload(0)?.l2i()?.invokestatic(system_exit)?;
    code.push_long(0)?.lreturn()?;

    guarded_return(code, bad, guards, EBADF)?;
    unknown(code, other)
}

/// Store `seconds` and `nanoseconds` computed from the long in `time` (in
/// `unit` per second) into the timespec whose address is in local 0
fn store_timespec(code: &mut CodeBuilder<'_>, rt: &Runtime, time: usize, unit: i64) -> CodeGenResult<()> {
    code.lload(time)?.push_long(unit)?.op(Mnemonic::Ldiv)?;
    code.lload(0)?.invokestatic(rt.store(Width::W64))?;
    code.lload(time)?.push_long(unit)?.op(Mnemonic::Lrem)?;
    if unit != 1_000_000_000 {
        code.push_long(1_000_000_000 / unit)?.lmul()?;
    }
    code.lload(0)?.push_long(CELL_SIZE)?.ladd()?.invokestatic(rt.store(Width::W64))?;
    Ok(())
}

/// `syscall2(arg1, arg2, number)`: clock_gettime
fn syscall2(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: timespec, 2: clock id, 4: number, 6: time
    let (gettime, other) = (Label::new("clock_gettime"), Label::new("unknown"));
    let (realtime, monotonic, invalid) = (Label::new("realtime"), Label::new("monotonic"), Label::new("einval"));
    code.lload(4)?.l2i()?;
    code.lookupswitch(other.clone(), vec![(SYS_CLOCK_GETTIME, gettime.clone())])?;

    code.label(gettime)?;
    code.lload(2)?.l2i()?;
    code.tableswitch(invalid.clone(), CLOCK_REALTIME, vec![realtime.clone(), monotonic.clone()])?;

    code.label(realtime)?;
    let millis = code.pool().method_ref("java/lang/System", "currentTimeMillis", "()J");
    code.invokestatic(millis)?.lstore(6)?;
    store_timespec(code, rt, 6, 1_000)?;
    code.push_long(0)?.lreturn()?;

    code.label(monotonic)?;
    let nanos = code.pool().method_ref("java/lang/System", "nanoTime", "()J");
    code.invokestatic(nanos)?.lstore(6)?;
    store_timespec(code, rt, 6, 1_000_000_000)?;
    code.push_long(0)?.lreturn()?;

    code.label(invalid)?.push_long(EINVAL)?.lreturn()?;
    unknown(code, other)
}

/// Append the string at the address in local `pointer` to the list in local `list`
fn add_cstring(code: &mut CodeBuilder<'_>, rt: &Runtime, list: usize, pointer: usize) -> CodeGenResult<()> {
    let add = code.pool().interface_method_ref("java/util/List", "add", "(Ljava/lang/Object;)Z");
    code.aload(list)?.lload(pointer)?.invokestatic(rt.cstr_to_string)?;
    code.invokeinterface(add)?.pop()?;
    Ok(())
}

/// Walk a NULL-terminated pointer table, running `body` with the current
/// entry in local `entry`; `cursor` must already hold the table address
fn for_each_entry<F>(
    code: &mut CodeBuilder<'_>,
    rt: &Runtime,
    name: &str,
    cursor: usize,
    entry: usize,
    mut body: F,
) -> CodeGenResult<()>
where
    F: FnMut(&mut CodeBuilder<'_>) -> CodeGenResult<()>,
{
    let (top, done) = (Label::new(format!("{}_next", name)), Label::new(format!("{}_done", name)));
    code.lload(cursor)?.push_long(0)?.lcmp()?.branch(Mnemonic::Ifeq, done.clone())?;
    code.label(top.clone())?;
    code.lload(cursor)?.invokestatic(rt.load(Width::W64))?.lstore(entry)?;
    code.lload(entry)?.push_long(0)?.lcmp()?.branch(Mnemonic::Ifeq, done.clone())?;
    body(code)?;
    code.lload(cursor)?.push_long(CELL_SIZE)?.ladd()?.lstore(cursor)?;
    code.goto(top)?;
    code.label(done)?.end_branch()?.end_branch()?;
    Ok(())
}

/// `execve(path, argv, envp)`: run `path` with `argv[1..]` and exactly the
/// variables in `envp`, inheriting I/O, then exit with the child's status
fn execve(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: envp, 2: argv, 4: path, 8: command list, 9: builder, 10: cursor, 12: entry, 14: env map, 15: pair
    let pool = code.pool();
    let list_init = pool.method_ref("java/util/ArrayList", "<init>", "()V");
    let builder_init = pool.method_ref("java/lang/ProcessBuilder", "<init>", "(Ljava/util/List;)V");
    let environment = pool.method_ref("java/lang/ProcessBuilder", "environment", "()Ljava/util/Map;");
    let clear = pool.interface_method_ref("java/util/Map", "clear", "()V");
    let put = pool.interface_method_ref(
        "java/util/Map",
        "put",
        "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
    );
    let split = pool.method_ref("java/lang/String", "split", "(Ljava/lang/String;I)[Ljava/lang/String;");
    let inherit = pool.method_ref("java/lang/ProcessBuilder", "inheritIO", "()Ljava/lang/ProcessBuilder;");
    let start = pool.method_ref("java/lang/ProcessBuilder", "start", "()Ljava/lang/Process;");
    let wait_for = pool.method_ref("java/lang/Process", "waitFor", "()I");
    let system_exit = pool.method_ref("java/lang/System", "exit", "(I)V");

    code.new_dup("java/util/ArrayList")?.invokespecial(list_init)?.astore(8)?;
    add_cstring(code, rt, 8, 4)?;

    // argv[0] names the program, which `path` already does
    code.lload(2)?.lstore(10)?;
    let skip_name = Label::new("argv_empty");
    code.lload(10)?.push_long(0)?.lcmp()?.branch(Mnemonic::Ifeq, skip_name.clone())?;
    code.lload(10)?.push_long(CELL_SIZE)?.ladd()?.lstore(10)?;
    code.label(skip_name)?.end_branch()?;
    for_each_entry(code, rt, "argv", 10, 12, |code| add_cstring(code, rt, 8, 12))?;

    code.new_dup("java/lang/ProcessBuilder")?.aload(8)?.invokespecial(builder_init)?.astore(9)?;
    code.aload(9)?.invokevirtual(environment)?.astore(14)?;
    code.aload(14)?.invokeinterface(clear)?;

    code.lload(0)?.lstore(10)?;
    for_each_entry(code, rt, "envp", 10, 12, |code| {
        let malformed = Label::new("envp_malformed");
        code.lload(12)?.invokestatic(rt.cstr_to_string)?;
        code.push_string("=")?.push_int(2)?.invokevirtual(split)?.astore(15)?;
        code.aload(15)?.arraylength()?.push_int(2)?.branch(Mnemonic::IfIcmplt, malformed.clone())?;
        code.aload(14)?;
        code.aload(15)?.push_int(0)?.op(Mnemonic::Aaload)?;
        code.aload(15)?.push_int(1)?.op(Mnemonic::Aaload)?;
        code.invokeinterface(put)?.pop()?;
        code.label(malformed)?.end_branch()?;
        Ok(())
    })?;

    code.aload(9)?.invokevirtual(inherit)?.invokevirtual(start)?.invokevirtual(wait_for)?;
    code.invokestatic(system_exit)?;
    code.push_long(0)?.lreturn()?;
    Ok(())
}

/// `syscall3(arg1, arg2, arg3, number)`: read, write, execve
fn syscall3(code: &mut CodeBuilder<'_>, rt: &Runtime) -> CodeGenResult<()> {
    // 0: count, 2: buffer, 4: fd, 6: number
    let (read, write, exec) = (Label::new("read"), Label::new("write"), Label::new("execve"));
    let (other, bad) = (Label::new("unknown"), Label::new("bad_fd"));
    code.lload(6)?.l2i()?;
    code.lookupswitch(
        other.clone(),
        vec![(SYS_READ, read.clone()), (SYS_WRITE, write.clone()), (SYS_EXECVE, exec.clone())],
    )?;

    code.label(read)?;
    let mut guards = guard_fd(code, rt, 4, &bad)?;
    open_stream(code, rt, "java/io/FileInputStream", 4)?;
    let read_bytes = code.pool().method_ref("java/io/FileInputStream", "read", "([BII)I");
    let max = code.pool().method_ref("java/lang/Math", "max", "(II)I");
    code.getstatic(rt.memory)?.lload(2)?.l2i()?.lload(0)?.l2i()?;
    // end of stream reads as 0 bytes
    code.invokevirtual(read_bytes)?.push_int(0)?.invokestatic(max)?;
    code.i2l()?.lreturn()?;

    code.label(write)?;
    guards += guard_fd(code, rt, 4, &bad)?;
    open_stream(code, rt, "java/io/FileOutputStream", 4)?;
    let write_bytes = code.pool().method_ref("java/io/FileOutputStream", "write", "([BII)V");
    let flush = code.pool().method_ref("java/io/FileOutputStream", "flush", "()V");
    code.dup()?.getstatic(rt.memory)?.lload(2)?.l2i()?.lload(0)?.l2i()?;
    code.invokevirtual(write_bytes)?.invokevirtual(flush)?;
    code.lload(0)?.lreturn()?;

    code.label(exec)?;
    execve(code, rt)?;

    guarded_return(code, bad, guards, EBADF)?;
    unknown(code, other)
}

/// `print_long(value)`: the decimal value and a newline on standard output
fn print_long(code: &mut CodeBuilder<'_>, _rt: &Runtime) -> CodeGenResult<()> {
    let out = code.pool().field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = code.pool().method_ref("java/io/PrintStream", "println", "(J)V");
    code.getstatic(out)?.lload(0)?.invokevirtual(println)?.return_void()?;
    Ok(())
}

pub fn emit(ctx: &mut CodegenContext<'_>) -> CodeGenResult<()> {
    let (name, descriptor) = PRINT_LONG;
    emit_method(ctx, name, descriptor, print_long)?;
    let (name, descriptor) = SYSCALL1;
    emit_method(ctx, name, descriptor, syscall1)?;
    let (name, descriptor) = SYSCALL2;
    emit_method(ctx, name, descriptor, syscall2)?;
    let (name, descriptor) = SYSCALL3;
    emit_method(ctx, name, descriptor, syscall3)?;
    Ok(())
}
