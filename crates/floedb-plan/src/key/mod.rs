//! Index range key derivation: equality/range/list conjuncts over an
//! index's leading columns become ordered [`KeyRange`]s, possibly over
//! composite multi-column keys. Module wiring plus the key vocabulary;
//! the four build strategies live in `build`.

mod build;


pub(crate) use build::build_key_info;

use crate::{error::CompileError, operand::Operand};
use thiserror::Error as ThisError;

///
/// RangeKind
///
/// Interval shape of one key range. `Inf` marks an unbounded side; the
/// composite forms appear once an equality prefix folds into the bound.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeKind {
    Eq,
    GtInf,
    GeInf,
    InfLt,
    InfLe,
    GtLe,
    GeLe,
    GtLt,
    GeLt,
}

impl RangeKind {
    #[must_use]
    pub const fn has_lower(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::GtInf | Self::GeInf | Self::GtLe | Self::GeLe | Self::GtLt | Self::GeLt
        )
    }

    #[must_use]
    pub const fn has_upper(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::InfLt | Self::InfLe | Self::GtLe | Self::GeLe | Self::GtLt | Self::GeLt
        )
    }
}

///
/// KeyRange
///
/// One bounded or half-bounded key interval. For `Eq` both bounds carry
/// the same key operand.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyRange {
    pub kind: RangeKind,
    pub lower: Option<Operand>,
    pub upper: Option<Operand>,
}

///
/// KeyInfo
///
/// Ordered key ranges for one index scan. `is_constant` holds only when
/// every contributing key part is a literal or bound input parameter;
/// `is_composite` marks multi-column keys built from composite operands.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyInfo {
    pub ranges: Vec<KeyRange>,
    pub is_constant: bool,
    pub is_composite: bool,
}

///
/// KeyBuildError
///
/// `TypeMismatch` is the one recoverable failure: the access builder
/// degrades the source to a sequential scan and keeps the predicate whole.
/// Everything else propagates.
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum KeyBuildError {
    #[error("key value for attribute '{attribute}' does not fit the indexed domain")]
    TypeMismatch { attribute: String },

    #[error("{0}")]
    Compile(Box<CompileError>),
}

impl From<CompileError> for KeyBuildError {
    fn from(err: CompileError) -> Self {
        Self::Compile(Box::new(err))
    }
}

impl From<crate::error::InternalError> for KeyBuildError {
    fn from(err: crate::error::InternalError) -> Self {
        Self::Compile(Box::new(err.into()))
    }
}
