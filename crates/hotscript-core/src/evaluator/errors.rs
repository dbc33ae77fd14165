use thiserror::Error;

use crate::codefs::FsError;
use crate::parser::ParseError;

/// Evaluator-specific error types
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error("undefined: {name}")]
    Undefined { name: String },

    #[error("package {path:?} not found")]
    PackageNotFound { path: String },

    #[error("import cycle not allowed: {path:?}")]
    ImportCycle { path: String },

    #[error("{name} redeclared in package {package:?}")]
    Redeclared { package: String, name: String },

    #[error("package {path:?} is already loaded from scripts")]
    PackageConflict { path: String },

    #[error("package {path:?} mixes package names {first} and {second}")]
    PackageNameMismatch {
        path: String,
        first: String,
        second: String,
    },

    #[error("cannot call non-function {type_name}")]
    NotCallable { type_name: String },

    #[error("wrong number of arguments in call to {name}: expected {expected}, got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type error: {operation} requires {expected}, got {actual}")]
    TypeError {
        operation: String,
        expected: String,
        actual: String,
    },

    #[error("Type error: cannot {operation} {left_type} and {right_type}")]
    BinaryTypeError {
        operation: String,
        left_type: String,
        right_type: String,
    },

    #[error("interface conversion: {actual} is not {expected}")]
    TypeAssertion { expected: String, actual: String },

    #[error("{type_name} has no field or method {field}")]
    NoField { type_name: String, field: String },

    #[error("index {index} out of range [0:{len}]")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("call depth limit {limit} exceeded")]
    CallDepth { limit: usize },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("panic: {message}")]
    Panic { message: String },

    #[error("host error: {0}")]
    Host(String),
}

impl EvaluatorError {
    pub fn type_error(operation: &str, expected: &str, actual: &str) -> Self {
        Self::TypeError {
            operation: operation.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn binary_type_error(operation: &str, left_type: &str, right_type: &str) -> Self {
        Self::BinaryTypeError {
            operation: operation.to_string(),
            left_type: left_type.to_string(),
            right_type: right_type.to_string(),
        }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        Self::Undefined { name: name.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn no_field(type_name: impl Into<String>, field: &str) -> Self {
        Self::NoField {
            type_name: type_name.into(),
            field: field.to_string(),
        }
    }
}
