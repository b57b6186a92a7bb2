//! Specific error types for code generation operations

use thiserror::Error;

use super::operand::OperandType;
use super::opcodes::Mnemonic;
use crate::ir::Location;

/// Errors that can occur while serializing the constant pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space: {slots} slots, max {max}")]
    OutOfSpace { slots: usize, max: usize },
    #[error("Invalid constant pool index: {0}")]
    InvalidIndex(u16),
    #[error("Constant at index {index} is not a {expected}")]
    UnexpectedKind { index: u16, expected: &'static str },
    #[error("Utf8 constant too long: {length} bytes")]
    Utf8TooLong { length: usize },
}

/// Stack-shape failures observed by the symbolic stack
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("{mnemonic}: stack underflow, needed {needed} slot(s), found {found}")]
    Underflow { mnemonic: Mnemonic, needed: usize, found: usize },
    #[error("{mnemonic}: expected {expected:?} on the stack, found {found:?}")]
    TypeMismatch { mnemonic: Mnemonic, expected: OperandType, found: OperandType },
    #[error("{mnemonic}: would split the two-slot value {found:?}")]
    SplitWideValue { mnemonic: Mnemonic, found: OperandType },
    #[error("stack shapes disagree at a merge point: {expected:?} vs {found:?}")]
    MergeMismatch { expected: Vec<OperandType>, found: Vec<OperandType> },
    #[error("end_branch without a pending branch snapshot")]
    UnbalancedBranch,
    #[error("{mnemonic}: operand does not describe a member ({reason})")]
    BadOperand { mnemonic: Mnemonic, reason: String },
    #[error("Local variable index out of bounds: {index}")]
    LocalIndexOutOfBounds { index: usize },
    #[error("Stack overflow: {width} slots")]
    Overflow { width: usize },
}

/// Errors that can occur while encoding an instruction stream to bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Label defined twice: {0}")]
    DuplicateLabel(String),
    #[error("Branch target too far: {offset}")]
    BranchTooFar { offset: i64 },
    #[error("Code too long: {length} bytes")]
    CodeTooLong { length: usize },
    #[error("{mnemonic}: operand {operand} out of range")]
    OperandRange { mnemonic: Mnemonic, operand: i64 },
    #[error("{mnemonic}: operands do not match the instruction format")]
    OperandMismatch { mnemonic: Mnemonic },
    #[error("Integer literal {value} does not fit in 32 bits")]
    IntegerRange { value: i64 },
}

/// Errors that abort translation of a program
#[derive(Error, Debug)]
pub enum CodeGenError {
    #[error("{location}: literal {value} cannot be encoded")]
    EncodingRange { value: i64, location: Location },
    #[error("{location}: unsupported operation {operation}")]
    Unsupported { operation: String, location: Location },
    #[error("{location}: syscall {number:?} has no implementation for {arity} argument(s)")]
    UnsupportedSyscall { number: Option<i64>, arity: usize, location: Location },
    #[error("{location}: call to unknown procedure at address {address}")]
    UnknownProcedure { address: usize, location: Location },
    #[error("in {method}: {source}")]
    Stack {
        method: String,
        #[source]
        source: StackError,
    },
    #[error("Stack shape error: {0}")]
    StackShape(#[from] StackError),
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),
    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),
    #[error("Resource exhausted: {message}")]
    Resource { message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodeGenError {
    /// Attach the name of the method being generated to a stack-shape error
    pub fn in_method(self, method: &str) -> Self {
        match self {
            CodeGenError::StackShape(source) => CodeGenError::Stack { method: method.to_string(), source },
            other => other,
        }
    }
}

/// Generic result type for code generation operations
pub type CodeGenResult<T> = Result<T, CodeGenError>;

/// Result type for symbolic stack operations
pub type StackResult<T> = Result<T, StackError>;
