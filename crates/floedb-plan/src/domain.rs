use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Value domains
///
/// A domain is the resolved type surface of one expression: kind, optional
/// precision/scale sizing, and the collation used for ordered text
/// comparison. Comparison semantics themselves are a collaborator concern;
/// the compiler only threads the collation through.
///

/// Maximum numeric precision used when sizing cannot be derived.
pub const NUMERIC_MAX_PRECISION: u16 = 38;

/// Default numeric scale used when sizing cannot be derived.
pub const NUMERIC_MAX_SCALE: u8 = 15;

///
/// CollationId
///

#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct CollationId(pub u16);

///
/// DomainKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum DomainKind {
    Bool,
    Int,
    BigInt,
    Numeric,
    Float,
    Double,
    Char,
    VarChar,
    Date,
    Time,
    Timestamp,
    /// Unresolved placeholder; only valid on parameters before domain
    /// resolution applies its precedence chain.
    Generic,
}

impl DomainKind {
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int | Self::BigInt | Self::Numeric | Self::Float | Self::Double
        )
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Char | Self::VarChar)
    }

    #[must_use]
    pub const fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::Timestamp)
    }

    /// Whether two kinds belong to one coercion family and may be compared
    /// or key-coerced without loss of meaning.
    #[must_use]
    pub const fn same_family(self, other: Self) -> bool {
        (self.is_numeric() && other.is_numeric())
            || (self.is_text() && other.is_text())
            || matches!(
                (self, other),
                (Self::Bool, Self::Bool)
                    | (Self::Date, Self::Date)
                    | (Self::Time, Self::Time)
                    | (Self::Timestamp, Self::Timestamp)
            )
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Numeric => "numeric",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::VarChar => "varchar",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Generic => "generic",
        };
        write!(f, "{label}")
    }
}

///
/// ValueDomain
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct ValueDomain {
    pub kind: DomainKind,
    pub precision: Option<u16>,
    pub scale: Option<u8>,
    pub collation: CollationId,
}

impl ValueDomain {
    #[must_use]
    pub const fn new(kind: DomainKind) -> Self {
        Self {
            kind,
            precision: None,
            scale: None,
            collation: CollationId(0),
        }
    }

    #[must_use]
    pub const fn int() -> Self {
        Self::new(DomainKind::Int)
    }

    #[must_use]
    pub const fn bigint() -> Self {
        Self::new(DomainKind::BigInt)
    }

    #[must_use]
    pub const fn boolean() -> Self {
        Self::new(DomainKind::Bool)
    }

    #[must_use]
    pub const fn double() -> Self {
        Self::new(DomainKind::Double)
    }

    #[must_use]
    pub const fn date() -> Self {
        Self::new(DomainKind::Date)
    }

    #[must_use]
    pub const fn time() -> Self {
        Self::new(DomainKind::Time)
    }

    #[must_use]
    pub const fn timestamp() -> Self {
        Self::new(DomainKind::Timestamp)
    }

    #[must_use]
    pub const fn generic() -> Self {
        Self::new(DomainKind::Generic)
    }

    #[must_use]
    pub const fn numeric(precision: u16, scale: u8) -> Self {
        Self {
            kind: DomainKind::Numeric,
            precision: Some(precision),
            scale: Some(scale),
            collation: CollationId(0),
        }
    }

    /// Numeric domain at maximum sizing, the fallback when no format
    /// operand constrains the result.
    #[must_use]
    pub const fn numeric_max() -> Self {
        Self::numeric(NUMERIC_MAX_PRECISION, NUMERIC_MAX_SCALE)
    }

    #[must_use]
    pub const fn varchar(length: u16) -> Self {
        Self {
            kind: DomainKind::VarChar,
            precision: Some(length),
            scale: None,
            collation: CollationId(0),
        }
    }

    #[must_use]
    pub const fn with_collation(mut self, collation: CollationId) -> Self {
        self.collation = collation;
        self
    }

    #[must_use]
    pub const fn is_generic(&self) -> bool {
        matches!(self.kind, DomainKind::Generic)
    }
}

///
/// TESTS
///
