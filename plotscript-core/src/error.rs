//! Error taxonomy
//!
//! Three failure kinds with different scopes:
//! - `LexError`: malformed source text, aborts the tokenize call
//! - `ParseError`: structurally invalid statement, aborts the rest of a run
//! - `EvalError`: runtime failure, scoped to the statement that raised it
//!
//! `ScriptError` wraps them with the statement they belong to so a host can
//! report "statement N failed: <reason>".

use crate::{Arity, Span};
use thiserror::Error;

/// Machine-readable error codes
pub mod codes {
    pub const LEX_ERROR: &str = "LEX_ERROR";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const UNDEFINED_SYMBOL: &str = "UNDEFINED_SYMBOL";
    pub const ARG_COUNT: &str = "ARG_COUNT";
    pub const DIV_ZERO: &str = "DIV_ZERO";
    pub const TYPE_ERROR: &str = "TYPE_ERROR";
    pub const NOT_CALLABLE: &str = "NOT_CALLABLE";
    pub const OVERFLOW: &str = "OVERFLOW";
    pub const DOMAIN_ERROR: &str = "DOMAIN_ERROR";
    pub const PLUGIN_ERROR: &str = "PLUGIN_ERROR";
    pub const RECURSION_LIMIT: &str = "RECURSION_LIMIT";
}

// ========== Lexing ==========

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    #[error("unrecognized character {0:?}")]
    UnrecognizedCharacter(char),

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("malformed number literal '{0}'")]
    MalformedNumber(String),

    #[error("number literal '{0}' is out of range")]
    NumberOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("lex error at {span}: {kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

// ========== Parsing ==========

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str },

    #[error("unexpected end of statement, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("left side of '=' must be a name or a function signature")]
    InvalidAssignmentTarget,

    #[error("parameter '{0}' is declared twice")]
    DuplicateParameter(String),

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at {span}: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

// ========== Evaluation ==========

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),

    #[error("wrong argument count: {name}() expects {expected} argument(s), got {got}")]
    WrongArgumentCount {
        name: String,
        expected: Arity,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("type mismatch: cannot apply '{op}' to {operand}")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("{0} is not callable")]
    NotCallable(&'static str),

    #[error("numeric overflow in '{0}'")]
    Overflow(&'static str),

    #[error("domain error in {function}(): {message}")]
    Domain { function: String, message: String },

    #[error("plugin function {function}() failed: {message}")]
    Plugin { function: String, message: String },

    #[error("function calls nest deeper than {0} levels")]
    RecursionLimit(usize),
}

impl EvalError {
    pub fn undefined(name: impl Into<String>) -> Self {
        Self::UndefinedSymbol(name.into())
    }

    pub fn arg_count(name: impl Into<String>, expected: Arity, got: usize) -> Self {
        Self::WrongArgumentCount {
            name: name.into(),
            expected,
            got,
        }
    }

    pub fn domain(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EvalError::UndefinedSymbol(_) => codes::UNDEFINED_SYMBOL,
            EvalError::WrongArgumentCount { .. } => codes::ARG_COUNT,
            EvalError::DivisionByZero => codes::DIV_ZERO,
            EvalError::TypeMismatch { .. } | EvalError::InvalidOperand { .. } => codes::TYPE_ERROR,
            EvalError::NotCallable(_) => codes::NOT_CALLABLE,
            EvalError::Overflow(_) => codes::OVERFLOW,
            EvalError::Domain { .. } => codes::DOMAIN_ERROR,
            EvalError::Plugin { .. } => codes::PLUGIN_ERROR,
            EvalError::RecursionLimit(_) => codes::RECURSION_LIMIT,
        }
    }
}

// ========== Script runs ==========

/// Failure reported while running a script.
///
/// `statement` is 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("statement {statement} failed: {error}")]
    Parse { statement: usize, error: ParseError },

    #[error("statement {statement} failed: {error}")]
    Eval {
        statement: usize,
        span: Span,
        error: EvalError,
    },
}

impl ScriptError {
    pub fn code(&self) -> &'static str {
        match self {
            ScriptError::Lex(_) => codes::LEX_ERROR,
            ScriptError::Parse { .. } => codes::PARSE_ERROR,
            ScriptError::Eval { error, .. } => error.code(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ScriptError::Lex(e) => e.span,
            ScriptError::Parse { error, .. } => error.span,
            ScriptError::Eval { span, .. } => *span,
        }
    }

    /// Whether the run can go on past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScriptError::Eval { .. })
    }
}
