//! Stack-IR to JVM bytecode compiler (stackjvm)
//!
//! A backend that lowers a validated stack-machine program into a single
//! runnable `.class` file.
//!
//! ## Architecture
//!
//! - **ir**: the consumed program: operations, procedures and their contracts
//! - **codegen**: constant pool, symbolic instruction builder, call-graph
//!   reachability, translation and the generated runtime library
//! - **config**: compilation settings
//! - **bin**: command-line interface
//!
//! ## Compilation Flow
//!
//! ```text
//! Program → Reachability → Runtime methods → Procedures → main → <clinit> → .class bytes
//! ```

pub mod codegen;
pub mod common;
pub mod config;
pub mod ir;

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

pub use codegen::{CodeGenError, Diagnostic};
pub use common::{Error, Result};
pub use config::{Config, SyscallFallback};
pub use ir::Program;

use codegen::{ClassFile, ClassfileWritable};

/// Output of a successful compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    pub class_name: String,
    /// The serialized class file
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
    /// `(name, descriptor)` of every emitted method, in class file order
    pub methods: Vec<(String, String)>,
}

fn check_class_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['.', ';', '[', '/']) {
        return Err(Error::config_error(format!("invalid class name: {:?}", name)));
    }
    Ok(())
}

/// Compile a program to class file bytes without touching the filesystem
pub fn compile(program: &Program, config: &Config) -> Result<Compilation> {
    generate_and_render(program, config, false).map(|(compilation, _)| compilation)
}

/// Compile a program and render its bytecode listing from the same generation
pub fn compile_with_listing(program: &Program, config: &Config) -> Result<(Compilation, String)> {
    generate_and_render(program, config, true)
}

fn generate_and_render(program: &Program, config: &Config, with_listing: bool) -> Result<(Compilation, String)> {
    check_class_name(&config.class_name)?;
    let generated = codegen::generate(program, config)?;
    let text = if with_listing { render_listing(&generated.class)? } else { String::new() };
    let bytes = generated.class.to_classfile_bytes()?;
    info!("{}: {} bytes", config.class_name, bytes.len());
    let compilation = Compilation {
        class_name: config.class_name.clone(),
        bytes,
        diagnostics: generated.diagnostics,
        methods: generated.class.method_signatures(),
    };
    Ok((compilation, text))
}

/// Compile a program and write `<class_name>.class` into `output_dir`.
///
/// Nothing is written unless compilation succeeds.
pub fn compile_to_path(program: &Program, config: &Config, output_dir: &Path) -> Result<(Compilation, PathBuf)> {
    let compilation = compile(program, config)?;
    let path = write_class(&compilation, output_dir)?;
    Ok((compilation, path))
}

/// Write an already compiled class as `<class_name>.class` into `output_dir`
pub fn write_class(compilation: &Compilation, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}.class", compilation.class_name));
    fs::write(&path, &compilation.bytes)?;
    info!("wrote {}", path.display());
    Ok(path)
}

/// Generate `program` and render every method as a bytecode listing
pub fn listing(program: &Program, config: &Config) -> Result<String> {
    let generated = codegen::generate(program, config)?;
    render_listing(&generated.class)
}

fn render_listing(class: &ClassFile) -> Result<String> {
    let mut out = String::new();
    for ((name, descriptor), method) in class.method_signatures().into_iter().zip(&class.methods) {
        let body = method.code.disassemble(&class.constant_pool).map_err(CodeGenError::from)?;
        out.push_str(&format!(
            "{}{} (max_stack={}, max_locals={})\n{}\n",
            name, descriptor, method.code.max_stack, method.code.max_locals, body
        ));
    }
    Ok(out)
}

/// Load a program from its JSON form
pub fn load_program(path: &Path) -> Result<Program> {
    let text = fs::read_to_string(path)?;
    Ok(Program::from_json(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_binary_names_with_separators() {
        assert!(check_class_name("Main").is_ok());
        assert!(check_class_name("a/Main").is_err());
        assert!(check_class_name("").is_err());
    }
}
