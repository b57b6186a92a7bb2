use thiserror::Error;

use crate::codegen::CodeGenError;

/// Result type for stackjvm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the stackjvm compiler
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid IR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Code generation error: {0}")]
    CodeGen(#[from] CodeGenError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}
