//! The stack-machine IR consumed by the backend
//!
//! A [`Program`] arrives fully validated: every control-flow operand already
//! points at its target address and every call resolves to a declared
//! procedure. Each value the IR manipulates is a 64-bit cell.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Source position of an operation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self { file: file.into(), line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    #[default]
    None,
    Integer(i64),
    String(String),
    Address(usize),
}

/// Built-in words of the source language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intrinsic {
    Plus,
    Minus,
    Mul,
    Max,
    DivMod,
    IDivMod,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Shr,
    Shl,
    Or,
    And,
    Not,
    Print,
    Dup,
    Swap,
    Drop,
    Over,
    Rot,
    Load8,
    Store8,
    Load16,
    Store16,
    Load32,
    Store32,
    Load64,
    Store64,
    CastPtr,
    CastInt,
    CastBool,
    CastAddr,
    Argc,
    Argv,
    Envp,
    Here,
    Syscall0,
    Syscall1,
    Syscall2,
    Syscall3,
    Syscall4,
    Syscall5,
    Syscall6,
    Stop,
    #[serde(other)]
    Unknown,
}

impl Intrinsic {
    /// Argument count of a `syscallN` intrinsic
    pub fn syscall_arity(self) -> Option<usize> {
        match self {
            Intrinsic::Syscall0 => Some(0),
            Intrinsic::Syscall1 => Some(1),
            Intrinsic::Syscall2 => Some(2),
            Intrinsic::Syscall3 => Some(3),
            Intrinsic::Syscall4 => Some(4),
            Intrinsic::Syscall5 => Some(5),
            Intrinsic::Syscall6 => Some(6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    PushInt,
    PushBool,
    PushPtr,
    PushStr,
    PushCStr,
    PushMem,
    PushLocalMem,
    Intrinsic(Intrinsic),
    If,
    IfStar,
    Else,
    End,
    SkipProc,
    PrepProc,
    Ret,
    Call,
    While,
    Do,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Intrinsic(intrinsic) => write!(f, "intrinsic {:?}", intrinsic),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
    pub kind: OpKind,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub operand: Operand,
}

impl Op {
    pub fn new(kind: OpKind, operand: Operand) -> Self {
        Self { kind, location: Location::default(), operand }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn integer(&self) -> Option<i64> {
        match self.operand {
            Operand::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<usize> {
        match self.operand {
            Operand::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match &self.operand {
            Operand::String(value) => Some(value),
            _ => None,
        }
    }
}

/// Logical type of a cell, as declared in a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int,
    Bool,
    Ptr,
    Addr,
}

/// Ordered input and output types of a procedure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contract {
    pub ins: Vec<DataType>,
    pub outs: Vec<DataType>,
}

impl Contract {
    pub fn new(ins: Vec<DataType>, outs: Vec<DataType>) -> Self {
        Self { ins, outs }
    }

    /// A contract over `ins` and `outs` integer cells
    pub fn cells(ins: usize, outs: usize) -> Self {
        Self { ins: vec![DataType::Int; ins], outs: vec![DataType::Int; outs] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// Address of the procedure's `PrepProc` operation
    pub address: usize,
    /// Bytes of private memory reserved for each call
    #[serde(default)]
    pub local_memory: usize,
    pub contract: Contract,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    pub ops: Vec<Op>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    /// Bytes of global memory, addressed from zero
    #[serde(default)]
    pub memory_capacity: usize,
}

impl Program {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Every procedure keyed by the address of its `PrepProc`
    pub fn procedures_by_address(&self) -> HashMap<usize, &Procedure> {
        self.procedures.iter().map(|proc| (proc.address, proc)).collect()
    }

    /// File named by the first operation's location, if it carries one
    pub fn source_file(&self) -> Option<&str> {
        self.ops.first().map(|op| op.location.file.as_str()).filter(|file| !file.is_empty())
    }

    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|proc| proc.name == name)
    }
}
