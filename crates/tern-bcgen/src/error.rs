//! Error types

use crate::ir::{FunctionId, SourceLoc};
use thiserror::Error;

/// Bytecode generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Instruction selection could not encode a function
    #[error("Error encoding bytecode for function '{function}'")]
    Encoding {
        /// Name of the function that failed
        function: String,
    },

    /// The requested entry point is not part of the module
    #[error("Entry point {0} is not a function of the module")]
    MissingEntryPoint(FunctionId),

    /// A function was referenced that was never registered for emission
    #[error("Function {0} has no bytecode ID")]
    UnknownFunction(FunctionId),

    /// An inline array element or buffer entry has no buffer encoding
    #[error("Function '{function}' has a literal buffer entry that cannot be serialized")]
    UnserializableLiteral {
        /// Name of the function holding the allocation
        function: String,
    },

    /// A string needed by a literal buffer was not collected into the string table
    #[error("String {0:?} is missing from the string table")]
    MissingString(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Options JSON could not be parsed
    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal to the current compilation
    Error,
    /// Informational
    Warning,
}

/// A diagnostic recorded in a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Where the problem is, if known
    pub location: Option<SourceLoc>,
    /// Human-readable message
    pub message: String,
}
