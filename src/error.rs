use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::engine::EngineError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Row-indexed engine failures collected during a batched execution.
///
/// Keys are zero-based positions within the array bind count; rows that do not
/// appear succeeded.
pub type RowErrorMap = BTreeMap<usize, EngineError>;

/// Errors raised while evaluating, pruning, binding or executing.
#[derive(Debug, Error)]
pub enum Error {
    /// Expression text could not be parsed.
    #[error("invalid expression '{expr}' at offset {offset}: {message}")]
    Parse {
        /// Expression source.
        expr: String,
        /// Byte offset of the offending token.
        offset: usize,
        /// Description of the problem.
        message: String,
    },
    /// Template tags are unterminated, mismatched or unknown.
    #[error("malformed template at {line}:{column}: {message}")]
    MalformedTemplate {
        /// One-based line.
        line: usize,
        /// One-based column.
        column: usize,
        /// Description of the problem.
        message: String,
    },
    /// `$name` could not be resolved in the variable context.
    #[error("unknown variable '${name}'")]
    UnknownVariable {
        /// Variable name without the `$` sigil.
        name: String,
    },
    /// A conditional body references a placeholder that is neither valued nor repeated.
    #[error("unknown parameter ':{name}' referenced in a conditional body")]
    UnknownParameter {
        /// Placeholder name without the `:` sigil.
        name: String,
    },
    /// The statement uses a placeholder that has no bind.
    #[error("parameter ':{name}' is used by the statement but was never bound")]
    UnboundParameter {
        /// Placeholder name without the `:` sigil.
        name: String,
    },
    /// Bind arguments are inconsistent.
    #[error("invalid argument for '{name}': {message}")]
    Argument {
        /// Parameter name the problem relates to.
        name: String,
        /// Description of the problem.
        message: String,
    },
    /// Associative array bind received no collection.
    #[error("associative array '{name}' cannot be null")]
    NullArgument {
        /// Parameter name.
        name: String,
    },
    /// Associative array bind received an empty collection.
    #[error("'{name}' is out of range: {message}")]
    OutOfRange {
        /// Parameter name.
        name: String,
        /// Description of the problem.
        message: String,
    },
    /// One or more rows of a batched execution failed.
    #[error("{} of {attempted} batched rows failed", row_errors.len())]
    BatchPartialFailure {
        /// Failures keyed by zero-based row index.
        row_errors: RowErrorMap,
        /// Number of rows the executor attempted.
        attempted: usize,
    },
    /// Failure reported by the engine outside a batch.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Discriminant of [`Error`] for callers that branch on the failure class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Parse`].
    ParseError,
    /// See [`Error::MalformedTemplate`].
    MalformedTemplate,
    /// See [`Error::UnknownVariable`].
    UnknownVariable,
    /// See [`Error::UnknownParameter`].
    UnknownParameter,
    /// See [`Error::UnboundParameter`].
    UnboundParameter,
    /// See [`Error::Argument`].
    ArgumentError,
    /// See [`Error::NullArgument`].
    NullArgument,
    /// See [`Error::OutOfRange`].
    OutOfRange,
    /// See [`Error::BatchPartialFailure`].
    BatchPartialFailure,
    /// See [`Error::Engine`].
    EngineError,
}

impl ErrorKind {
    /// Returns the stable name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::MalformedTemplate => "MalformedTemplate",
            ErrorKind::UnknownVariable => "UnknownVariable",
            ErrorKind::UnknownParameter => "UnknownParameter",
            ErrorKind::UnboundParameter => "UnboundParameter",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::NullArgument => "NullArgument",
            ErrorKind::OutOfRange => "OutOfRange",
            ErrorKind::BatchPartialFailure => "BatchPartialFailure",
            ErrorKind::EngineError => "EngineError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Returns the failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { .. } => ErrorKind::ParseError,
            Error::MalformedTemplate { .. } => ErrorKind::MalformedTemplate,
            Error::UnknownVariable { .. } => ErrorKind::UnknownVariable,
            Error::UnknownParameter { .. } => ErrorKind::UnknownParameter,
            Error::UnboundParameter { .. } => ErrorKind::UnboundParameter,
            Error::Argument { .. } => ErrorKind::ArgumentError,
            Error::NullArgument { .. } => ErrorKind::NullArgument,
            Error::OutOfRange { .. } => ErrorKind::OutOfRange,
            Error::BatchPartialFailure { .. } => ErrorKind::BatchPartialFailure,
            Error::Engine(_) => ErrorKind::EngineError,
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the per-row failures when this is a partial batch failure.
    pub fn row_errors(&self) -> Option<&RowErrorMap> {
        match self {
            Error::BatchPartialFailure { row_errors, .. } => Some(row_errors),
            _ => None,
        }
    }

    pub(crate) fn argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Argument {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_variable(name: impl Into<String>) -> Self {
        Error::UnknownVariable { name: name.into() }
    }

    pub(crate) fn unknown_parameter(name: impl Into<String>) -> Self {
        Error::UnknownParameter { name: name.into() }
    }
}

/// Convenience wrapper that formats errors with their codes.
pub struct ErrorWithCode<'a>(pub &'a Error);

impl fmt::Display for ErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
