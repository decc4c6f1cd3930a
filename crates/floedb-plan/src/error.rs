use crate::types::SourceLocation;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured engine fault with a stable internal classification. An
/// internal error means the input tree violated an upstream contract or a
/// compiler invariant broke; it is never surfaced as a SQL-level error.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct an expression-origin invariant violation.
    pub(crate) fn expression_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Expression,
            message,
        )
    }

    /// Construct a correlation-origin invariant violation.
    pub(crate) fn correlation_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Correlation,
            message,
        )
    }

    /// Construct an assembler-origin invariant violation.
    pub(crate) fn assemble_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Assemble,
            message,
        )
    }

    /// Construct a key-builder-origin internal error.
    pub(crate) fn key_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Key, message)
    }

    /// Construct an access-builder-origin internal error.
    pub(crate) fn access_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Access, message)
    }

    /// Construct an aggregate-origin invariant violation.
    pub(crate) fn aggregate_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Aggregate,
            message,
        )
    }

    /// Construct a resource-class fault for a blown compilation limit.
    pub(crate) fn resource(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Resource, origin, message)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for fault classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Internal,
    InvariantViolation,
    Resource,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
            Self::Resource => "resource",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for fault classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Expression,
    Predicate,
    Key,
    Access,
    Aggregate,
    Correlation,
    Assemble,
    Catalog,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Expression => "expression",
            Self::Predicate => "predicate",
            Self::Key => "key",
            Self::Access => "access",
            Self::Aggregate => "aggregate",
            Self::Correlation => "correlation",
            Self::Assemble => "assemble",
            Self::Catalog => "catalog",
        };
        write!(f, "{label}")
    }
}

///
/// CompileError
///
/// The user-facing compilation error surface. Variants either carry the
/// originating statement location (late semantic errors) or wrap an engine
/// fault that aborted compilation cleanly.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CompileError {
    #[error("LIKE escape clause at {location} must be a single-character literal")]
    NonLiteralEscape { location: SourceLocation },

    #[error("malformed range branch at {location}: {reason}")]
    MalformedRangeBranch {
        location: SourceLocation,
        reason: String,
    },

    #[error("set operands must project the same number of columns ({left} vs {right})")]
    SetOperandArityMismatch { left: usize, right: usize },

    #[error("{0}")]
    Internal(Box<InternalError>),
}

impl From<InternalError> for CompileError {
    fn from(err: InternalError) -> Self {
        Self::Internal(Box::new(err))
    }
}

// Catalog misses are upstream contract violations, not SQL errors.
impl From<crate::model::CatalogError> for CompileError {
    fn from(err: crate::model::CatalogError) -> Self {
        Self::Internal(Box::new(InternalError::new(
            ErrorClass::Internal,
            ErrorOrigin::Catalog,
            err.to_string(),
        )))
    }
}

///
/// TESTS
///
