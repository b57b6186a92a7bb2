//! Generated runtime support methods
//!
//! Every class carries the same small library: a growable byte array that
//! emulates linear memory, loads and stores at four widths, string placement,
//! `argv`/`envp` setup and the syscall trap tables. [`Runtime`] holds the
//! constant pool references translated code uses to reach them.

pub mod args;
pub mod init;
pub mod memory;
pub mod syscalls;

use super::builder::CodeBuilder;
use super::class::{access_flags, ClassFile};
use super::context::CodegenContext;
use super::descriptor::parse_method_descriptor;
use super::error::CodeGenResult;

pub use memory::Width;

/// Bytes per cell in linear memory
pub const CELL_SIZE: i64 = 8;

pub const MEMORY: (&str, &str) = ("memory", "[B");
pub const ARGC: (&str, &str) = ("argc", "J");
pub const ARGV: (&str, &str) = ("argv", "J");
pub const ENVP: (&str, &str) = ("envp", "J");
pub const STRINGS: (&str, &str) = ("strings", "J");
pub const FDS: (&str, &str) = ("fds", "[Ljava/io/FileDescriptor;");

pub const EXTEND_MEM: (&str, &str) = ("extend_mem", "(I)J");
pub const PUT_STRING: (&str, &str) = ("put_string", "(Ljava/lang/String;)J");
pub const CSTR_TO_STRING: (&str, &str) = ("cstr_to_string", "(J)Ljava/lang/String;");
pub const PRINT_LONG: (&str, &str) = ("print_long", "(J)V");
pub const PREPARE_ARGV: (&str, &str) = ("prepare_argv", "([Ljava/lang/String;)V");
pub const PREPARE_ENVP: (&str, &str) = ("prepare_envp", "()V");
pub const SYSCALL1: (&str, &str) = ("syscall1", "(JJ)J");
pub const SYSCALL2: (&str, &str) = ("syscall2", "(JJJ)J");
pub const SYSCALL3: (&str, &str) = ("syscall3", "(JJJJ)J");
pub const LOAD_DESCRIPTOR: &str = "(J)J";
/// `(value, address)`
pub const STORE_DESCRIPTOR: &str = "(JJ)V";

pub const MAIN: (&str, &str) = ("main", "([Ljava/lang/String;)V");
pub const CLINIT: (&str, &str) = ("<clinit>", "()V");

/// Method names procedures must not take
pub const RESERVED_NAMES: &[&str] = &[
    "main",
    "<clinit>",
    "extend_mem",
    "put_string",
    "cstr_to_string",
    "print_long",
    "prepare_argv",
    "prepare_envp",
    "syscall1",
    "syscall2",
    "syscall3",
    "load_8",
    "load_16",
    "load_32",
    "load_64",
    "store_8",
    "store_16",
    "store_32",
    "store_64",
];

/// Constant pool references to the runtime fields and methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Runtime {
    pub memory: u16,
    pub argc: u16,
    pub argv: u16,
    pub envp: u16,
    pub strings: u16,
    pub fds: u16,
    pub extend_mem: u16,
    pub put_string: u16,
    pub cstr_to_string: u16,
    pub print_long: u16,
    pub prepare_argv: u16,
    pub prepare_envp: u16,
    pub load: [u16; 4],
    pub store: [u16; 4],
    pub syscall: [u16; 3],
}

impl Runtime {
    /// Add the runtime fields to `class` and intern references to everything
    pub fn declare(class: &mut ClassFile) -> Self {
        let flags = access_flags::ACC_PRIVATE | access_flags::ACC_STATIC | access_flags::ACC_SYNTHETIC;
        for (name, descriptor) in [MEMORY, ARGC, ARGV, ENVP, STRINGS, FDS] {
            class.add_field(flags, name, descriptor);
        }
        let owner = class.name().to_string();
        let pool = &mut class.constant_pool;
        let mut field = |(name, descriptor): (&str, &str)| pool.field_ref(&owner, name, descriptor);
        let (memory, argc, argv, envp, strings, fds) =
            (field(MEMORY), field(ARGC), field(ARGV), field(ENVP), field(STRINGS), field(FDS));
        let mut method = |(name, descriptor): (&str, &str)| pool.method_ref(&owner, name, descriptor);
        let load = Width::ALL.map(|width| method((width.load_name(), LOAD_DESCRIPTOR)));
        let store = Width::ALL.map(|width| method((width.store_name(), STORE_DESCRIPTOR)));
        Self {
            memory,
            argc,
            argv,
            envp,
            strings,
            fds,
            extend_mem: method(EXTEND_MEM),
            put_string: method(PUT_STRING),
            cstr_to_string: method(CSTR_TO_STRING),
            print_long: method(PRINT_LONG),
            prepare_argv: method(PREPARE_ARGV),
            prepare_envp: method(PREPARE_ENVP),
            load,
            store,
            syscall: [method(SYSCALL1), method(SYSCALL2), method(SYSCALL3)],
        }
    }

    pub fn load(&self, width: Width) -> u16 {
        self.load[width.index()]
    }

    pub fn store(&self, width: Width) -> u16 {
        self.store[width.index()]
    }

    /// Trap table for `arity` arguments, if there is one
    pub fn syscall(&self, arity: usize) -> Option<u16> {
        arity.checked_sub(1).and_then(|i| self.syscall.get(i)).copied()
    }
}

/// Build a runtime method with `body` and add it to the class
pub(crate) fn emit_method<F>(ctx: &mut CodegenContext<'_>, name: &str, descriptor: &str, body: F) -> CodeGenResult<()>
where
    F: FnOnce(&mut CodeBuilder<'_>, &Runtime) -> CodeGenResult<()>,
{
    let param_slots = parse_method_descriptor(descriptor).map(|shape| shape.param_slots()).unwrap_or(0);
    let runtime = ctx.runtime;
    let mut code = CodeBuilder::new(&mut ctx.class.constant_pool, param_slots);
    body(&mut code, &runtime).map_err(|e| e.in_method(name))?;
    let code = code.finish().map_err(|e| e.in_method(name))?;
    ctx.add_method(name, descriptor, code);
    Ok(())
}

/// Generate every runtime method except `<clinit>`, which needs the final string table
pub fn emit_runtime(ctx: &mut CodegenContext<'_>) -> CodeGenResult<()> {
    memory::emit(ctx)?;
    args::emit(ctx)?;
    syscalls::emit(ctx)?;
    Ok(())
}
