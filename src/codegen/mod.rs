//! Code generation module for stack-IR programs
//!
//! This module lowers a validated [`Program`] into a single JVM class: one
//! static method per live procedure, `main` for the top-level operations and
//! a fixed runtime library emulating linear memory and syscalls.

pub mod builder;
pub mod class;
pub mod code;
pub mod constpool;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod intrinsics;
pub mod opcodes;
pub mod operand;
pub mod reachability;
pub mod stack;
pub mod strings;
pub mod translate;
pub mod writer;

// Re-export commonly used types
pub use builder::CodeBuilder;
pub use class::ClassFile;
pub use code::{Code, Label};
pub use constpool::{Constant, ConstantPool};
pub use context::{CodegenContext, Diagnostic};
pub use error::{BytecodeError, CodeGenError, CodeGenResult, ConstPoolError, StackError};
pub use opcodes::Mnemonic;
pub use operand::OperandType;
pub use reachability::{reachable_procedures, CallGraph};
pub use stack::SymbolicStack;
pub use writer::ClassfileWritable;

use log::{debug, info};

use crate::config::Config;
use crate::ir::Program;

/// A generated class and the findings reported while generating it
#[derive(Debug)]
pub struct Generated {
    pub class: ClassFile,
    pub diagnostics: Vec<Diagnostic>,
    /// Names of the procedures that were emitted
    pub live: Vec<String>,
}

/// Generate the class for `program`.
///
/// Methods are added in a fixed order: the runtime library, live procedures
/// by address, `main`, then `<clinit>` once every string literal is known.
pub fn generate(program: &Program, config: &Config) -> CodeGenResult<Generated> {
    let live = reachable_procedures(program);
    info!("{} of {} procedures reachable", live.len(), program.procedures.len());

    let mut ctx = CodegenContext::new(program, config, &live);
    intrinsics::emit_runtime(&mut ctx)?;

    let addresses: Vec<usize> = ctx.procedures.keys().copied().collect();
    for address in addresses {
        translate::translate_procedure(&mut ctx, address)?;
    }
    translate::translate_main(&mut ctx)?;

    debug!("string table: {} strings, {} bytes", ctx.strings.len(), ctx.strings.byte_len());
    intrinsics::init::emit_clinit(&mut ctx)?;
    ctx.class.constant_pool.validate()?;

    info!(
        "generated {}: {} methods, {} constant pool slots",
        ctx.class.name(),
        ctx.class.methods.len(),
        ctx.class.constant_pool.len()
    );
    Ok(Generated { class: ctx.class, diagnostics: ctx.diagnostics, live })
}
