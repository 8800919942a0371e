//! Centralised error hierarchy for the Lox interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This
//! enables a uniform `Result<T>` alias throughout the crate and ergonomic
//! inter-operation with `anyhow` at the CLI boundary, while preserving rich
//! diagnostic detail.
//!
//! The module does not print diagnostics itself.

use std::fmt;
use std::io;

use log::info;
use thiserror::Error;

/// Stable machine-readable tag carried by every diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Scanner / parser / resolver.
    UnexpectedToken,
    UnterminatedString,
    UnterminatedComment,
    UnclosedParenthesis,
    ExpectedIdentifier,
    InvalidTarget,
    BreakStatementOutsideLoop,
    ContinueStatementOutsideLoop,
    ReturnStatementOutsideFunction,
    ArgumentSizeExceeded,
    InvalidSelfReference,
    VariableAlreadyDeclared,
    UnusedVariable,
    ThisOutsideClass,
    NoSelfInheritance,

    // Runtime.
    InvalidDataType,
    InvalidOperation,
    DivisionByZero,
    UndefinedVariable,
    ExpressionIsNotCallable,
    WrongNumberOfArguments,
    NotAnObject,
    InvalidProperty,
    NotAClass,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical, syntactic, or static-resolution fault.
    #[error("SyntaxError [Line: {line}, Column: {column}] : {message}. Code {code}")]
    Syntax {
        code: ErrorCode,
        message: String,

        /// 1-based position of the offending lexeme.
        line: usize,
        column: usize,
    },

    /// Evaluation fault.
    #[error("RuntimeError [Line: {line}, Column: {column}] : {message}. Code {code}")]
    Runtime {
        code: ErrorCode,
        message: String,
        line: usize,
        column: usize,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the scanner, parser, and resolver.
    pub fn syntax<S: Into<String>>(code: ErrorCode, line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Syntax error [{}:{}] {}: {}", line, column, code, message);

        LoxError::Syntax {
            code,
            message,
            line,
            column,
        }
    }

    /// Helper constructor for the interpreter.
    pub fn runtime<S: Into<String>>(code: ErrorCode, line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Runtime error [{}:{}] {}: {}", line, column, code, message);

        LoxError::Runtime {
            code,
            message,
            line,
            column,
        }
    }

    /// The diagnostic tag, when one applies (I/O errors carry none).
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            LoxError::Syntax { code, .. } | LoxError::Runtime { code, .. } => Some(*code),
            LoxError::Io(_) => None,
        }
    }

    /// Process exit status for this class of fault: 65 for syntax and
    /// resolution errors, 70 for runtime errors, 74 for I/O.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Syntax { .. } => 65,
            LoxError::Runtime { .. } => 70,
            LoxError::Io(_) => 74,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
