//! Shared state for generating one class

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};

use super::class::{access_flags, ClassFile};
use super::code::Code;
use super::descriptor::procedure_descriptor;
use super::intrinsics::{Runtime, RESERVED_NAMES};
use super::strings::InternedStrings;
use crate::config::Config;
use crate::ir::{Contract, Location, Program};

/// A non-fatal finding reported alongside the generated class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// A live procedure and the method it compiles to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRef {
    pub name: String,
    pub method_name: String,
    pub descriptor: String,
    /// `Methodref` index used at call sites
    pub method: u16,
    pub address: usize,
    pub local_memory: usize,
    pub contract: Contract,
}

impl ProcedureRef {
    pub fn ins(&self) -> usize {
        self.contract.ins.len()
    }

    pub fn outs(&self) -> usize {
        self.contract.outs.len()
    }
}

/// Method name for a procedure.
///
/// Characters a JVM method name cannot hold, and `$` itself, are written as
/// `$xx`; a name that would clash with a generated method gets a `$` prefix.
pub fn method_name_for(procedure: &str) -> String {
    let mut name = String::with_capacity(procedure.len());
    for c in procedure.chars() {
        match c {
            '.' | ';' | '[' | '/' | '<' | '>' | '$' => name.push_str(&format!("${:02x}", c as u32)),
            _ => name.push(c),
        }
    }
    if name.is_empty() || RESERVED_NAMES.contains(&name.as_str()) {
        name.insert(0, '$');
    }
    name
}

pub struct CodegenContext<'p> {
    pub program: &'p Program,
    pub config: &'p Config,
    pub class: ClassFile,
    pub strings: InternedStrings,
    pub runtime: Runtime,
    /// Live procedures keyed by address
    pub procedures: BTreeMap<usize, ProcedureRef>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'p> CodegenContext<'p> {
    /// Declare the runtime fields and resolve every method the class will contain
    pub fn new(program: &'p Program, config: &'p Config, live: &[String]) -> Self {
        let mut class = ClassFile::new(&config.class_name);
        if let Some(file) = config.source_file.as_deref().or_else(|| program.source_file()) {
            class.set_source_file(file);
        }
        let runtime = Runtime::declare(&mut class);

        let mut procedures = BTreeMap::new();
        for name in live {
            let Some(procedure) = program.procedure(name) else { continue };
            let method_name = method_name_for(&procedure.name);
            let descriptor = procedure_descriptor(procedure.contract.ins.len(), procedure.contract.outs.len());
            let method = class.constant_pool.method_ref(&config.class_name, &method_name, &descriptor);
            procedures.insert(
                procedure.address,
                ProcedureRef {
                    name: procedure.name.clone(),
                    method_name,
                    descriptor,
                    method,
                    address: procedure.address,
                    local_memory: procedure.local_memory,
                    contract: procedure.contract.clone(),
                },
            );
        }

        Self {
            program,
            config,
            class,
            strings: InternedStrings::new(),
            runtime,
            procedures,
            diagnostics: Vec::new(),
        }
    }

    pub fn procedure_at(&self, address: usize) -> Option<&ProcedureRef> {
        self.procedures.get(&address)
    }

    /// Add a finished `private static synthetic` method
    pub fn add_method(&mut self, name: &str, descriptor: &str, code: Code) {
        let flags = access_flags::ACC_PRIVATE | access_flags::ACC_STATIC | access_flags::ACC_SYNTHETIC;
        self.install(flags, name, descriptor, code);
    }

    /// Add a method with explicit access flags, e.g. `main`
    pub fn install(&mut self, flags: u16, name: &str, descriptor: &str, code: Code) {
        debug!(
            "method {}{}: max_stack={} max_locals={} items={}",
            name,
            descriptor,
            code.max_stack,
            code.max_locals,
            code.items.len()
        );
        self.class.add_method(flags, name, descriptor, code);
    }
}

/// Record a diagnostic and log it
pub fn diagnose(diagnostics: &mut Vec<Diagnostic>, location: &Location, message: impl Into<String>) {
    let diagnostic = Diagnostic { location: location.clone(), message: message.into() };
    warn!("{}", diagnostic);
    diagnostics.push(diagnostic);
}
