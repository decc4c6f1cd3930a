use crate::domain::{DomainKind, ValueDomain};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error as ThisError;

///
/// Value
///
/// Literal vocabulary of the compiler. Values appear in the input tree and
/// inside `Operand::Constant`; the compiler never evaluates expressions, it
/// only coerces literals against declared domains while deriving index keys.
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Numeric { unscaled: i128, scale: u8 },
    Double(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Kind of domain this literal inhabits before any coercion.
    #[must_use]
    pub const fn natural_kind(&self) -> DomainKind {
        match self {
            Self::Null => DomainKind::Generic,
            Self::Bool(_) => DomainKind::Bool,
            Self::Int(_) => DomainKind::BigInt,
            Self::Numeric { .. } => DomainKind::Numeric,
            Self::Double(_) => DomainKind::Double,
            Self::Text(_) => DomainKind::VarChar,
            Self::Date(_) => DomainKind::Date,
            Self::Time(_) => DomainKind::Time,
            Self::Timestamp(_) => DomainKind::Timestamp,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

// Bit-exact equality for doubles keeps Value usable in structural plan
// comparison; NaN payload differences are deliberate inequalities.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (
                Self::Numeric {
                    unscaled: a,
                    scale: sa,
                },
                Self::Numeric {
                    unscaled: b,
                    scale: sb,
                },
            ) => a == b && sa == sb,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Order two literals of one coercion family.
///
/// Returns `None` across families or when either side is null; key-range
/// sanity checks treat that as "not comparable here", never as equality.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (a, b) if a.natural_kind().is_numeric() && b.natural_kind().is_numeric() => {
            let a = numeric_as_double(a)?;
            let b = numeric_as_double(b)?;
            a.partial_cmp(&b)
        }
        _ => None,
    }
}

fn numeric_as_double(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => v.to_f64(),
        Value::Double(v) => Some(*v),
        Value::Numeric { unscaled, scale } => {
            let base = unscaled.to_f64()?;
            Some(base / 10f64.powi(i32::from(*scale)))
        }
        _ => None,
    }
}

///
/// CoerceError
///
/// A literal could not be restated in the target domain. For index key
/// derivation this is the recoverable `KeyTypeMismatch` source; the caller
/// degrades to a sequential scan rather than failing the statement.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CoerceError {
    #[error("cannot coerce {from} literal into {to} domain")]
    Incompatible { from: DomainKind, to: DomainKind },

    #[error("literal overflows {to} domain sizing")]
    Overflow { to: DomainKind },
}

/// Restate a literal in the target domain, widening where the family
/// permits it and failing where meaning would change.
pub fn coerce(value: &Value, target: &ValueDomain) -> Result<Value, CoerceError> {
    // Nulls inhabit every domain.
    if value.is_null() {
        return Ok(Value::Null);
    }

    let from = value.natural_kind();
    let incompatible = || CoerceError::Incompatible {
        from,
        to: target.kind,
    };

    match target.kind {
        DomainKind::Int => match value {
            Value::Int(v) => {
                if i32::try_from(*v).is_ok() {
                    Ok(Value::Int(*v))
                } else {
                    Err(CoerceError::Overflow { to: DomainKind::Int })
                }
            }
            _ => Err(incompatible()),
        },
        DomainKind::BigInt => match value {
            Value::Int(v) => Ok(Value::Int(*v)),
            _ => Err(incompatible()),
        },
        DomainKind::Numeric => match value {
            Value::Int(v) => Ok(Value::Numeric {
                unscaled: i128::from(*v),
                scale: 0,
            }),
            Value::Numeric { unscaled, scale } => Ok(Value::Numeric {
                unscaled: *unscaled,
                scale: *scale,
            }),
            _ => Err(incompatible()),
        },
        DomainKind::Float | DomainKind::Double => match value {
            Value::Int(v) => v
                .to_f64()
                .map(Value::Double)
                .ok_or(CoerceError::Overflow { to: target.kind }),
            Value::Numeric { .. } => numeric_as_double(value)
                .map(Value::Double)
                .ok_or(CoerceError::Overflow { to: target.kind }),
            Value::Double(v) => Ok(Value::Double(*v)),
            _ => Err(incompatible()),
        },
        DomainKind::Char | DomainKind::VarChar => match value {
            Value::Text(text) => {
                if let Some(limit) = target.precision
                    && text.chars().count() > usize::from(limit)
                {
                    return Err(CoerceError::Overflow { to: target.kind });
                }
                Ok(Value::Text(text.clone()))
            }
            _ => Err(incompatible()),
        },
        DomainKind::Bool => match value {
            Value::Bool(v) => Ok(Value::Bool(*v)),
            _ => Err(incompatible()),
        },
        DomainKind::Date => match value {
            Value::Date(v) => Ok(Value::Date(*v)),
            _ => Err(incompatible()),
        },
        DomainKind::Time => match value {
            Value::Time(v) => Ok(Value::Time(*v)),
            _ => Err(incompatible()),
        },
        DomainKind::Timestamp => match value {
            Value::Timestamp(v) => Ok(Value::Timestamp(*v)),
            _ => Err(incompatible()),
        },
        DomainKind::Generic => Ok(value.clone()),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_to_numeric_and_double() {
        let five = Value::Int(5);

        assert_eq!(
            coerce(&five, &ValueDomain::numeric_max()),
            Ok(Value::Numeric {
                unscaled: 5,
                scale: 0
            })
        );
        assert_eq!(coerce(&five, &ValueDomain::double()), Ok(Value::Double(5.0)));
    }

    #[test]
    fn text_does_not_coerce_to_numeric() {
        let text = Value::text("5");

        assert!(matches!(
            coerce(&text, &ValueDomain::numeric_max()),
            Err(CoerceError::Incompatible { .. })
        ));
    }

    #[test]
    fn varchar_precision_bounds_length() {
        let text = Value::text("abcdef");

        assert!(coerce(&text, &ValueDomain::varchar(6)).is_ok());
        assert_eq!(
            coerce(&text, &ValueDomain::varchar(5)),
            Err(CoerceError::Overflow {
                to: DomainKind::VarChar
            })
        );
    }

    #[test]
    fn null_inhabits_every_domain() {
        assert_eq!(coerce(&Value::Null, &ValueDomain::date()), Ok(Value::Null));
    }

    #[test]
    fn cross_family_comparison_is_undefined() {
        assert_eq!(canonical_cmp(&Value::Int(1), &Value::text("1")), None);
        assert_eq!(
            canonical_cmp(&Value::Int(2), &Value::Double(2.5)),
            Some(Ordering::Less)
        );
    }
}
