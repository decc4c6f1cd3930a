//! Fixed per-operator result-domain rules. The input tree arrives type
//! checked; these rules restate the operator's result domain for the
//! operand being built so the plan is self-describing without the tree.

use crate::{
    domain::{DomainKind, ValueDomain},
    operand::ArithOp,
    syntax::{FunctionKind, SyntaxNode},
    value::Value,
};

/// Result domain of an arithmetic operator over the given operand domains.
pub(crate) fn arith_result(op: ArithOp, args: &[ValueDomain]) -> ValueDomain {
    match op {
        ArithOp::Concat => ValueDomain::new(DomainKind::VarChar),
        ArithOp::Neg | ArithOp::Case => args.first().copied().unwrap_or(ValueDomain::generic()),
        ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div | ArithOp::Mod => {
            numeric_widened(args)
        }
    }
}

// Widen a numeric operator's result: any double-ish operand wins, numeric
// beats integers, temporal +/- integer keeps the temporal side.
fn numeric_widened(args: &[ValueDomain]) -> ValueDomain {
    if let Some(temporal) = args.iter().find(|domain| domain.kind.is_temporal()) {
        // date + int, timestamp - int: stays temporal; date - date is
        // resolved to bigint by the checker and arrives as such.
        if args.iter().filter(|d| d.kind.is_temporal()).count() == 1 {
            return *temporal;
        }
        return ValueDomain::bigint();
    }

    if args
        .iter()
        .any(|domain| matches!(domain.kind, DomainKind::Double | DomainKind::Float))
    {
        return ValueDomain::double();
    }
    if args.iter().any(|domain| domain.kind == DomainKind::Numeric) {
        return ValueDomain::numeric_max();
    }

    ValueDomain::bigint()
}

/// Result domain of a scalar function call, sized from its syntax-level
/// arguments where the rule allows it.
pub(crate) fn function_result(kind: FunctionKind, args: &[SyntaxNode]) -> ValueDomain {
    match kind {
        FunctionKind::Lower
        | FunctionKind::Upper
        | FunctionKind::Trim
        | FunctionKind::Replace
        | FunctionKind::Substring
        | FunctionKind::ToChar => first_text_domain(args),
        FunctionKind::Position | FunctionKind::CharLength | FunctionKind::Sign => {
            ValueDomain::int()
        }
        FunctionKind::Abs | FunctionKind::Floor | FunctionKind::Ceil => args
            .first()
            .map_or(ValueDomain::numeric_max(), |arg| arg.domain()),
        FunctionKind::Round | FunctionKind::Trunc => ValueDomain::numeric_max(),
        FunctionKind::Power | FunctionKind::Sqrt | FunctionKind::MonthsBetween => {
            ValueDomain::double()
        }
        FunctionKind::ToNumber => to_number_domain(args),
        FunctionKind::ToDate | FunctionKind::AddMonths | FunctionKind::LastDay => {
            ValueDomain::date()
        }
        FunctionKind::SysDate => ValueDomain::date(),
        FunctionKind::SysTime => ValueDomain::time(),
        FunctionKind::SysTimestamp => ValueDomain::timestamp(),
        FunctionKind::CompositeKey | FunctionKind::ValueList => ValueDomain::generic(),
    }
}

fn first_text_domain(args: &[SyntaxNode]) -> ValueDomain {
    args.first()
        .map(|arg| arg.domain())
        .filter(|domain| domain.kind.is_text())
        .unwrap_or(ValueDomain::new(DomainKind::VarChar))
}

// TO_NUMBER sizing: a literal format operand fixes precision and scale,
// otherwise the result takes maximum numeric sizing.
fn to_number_domain(args: &[SyntaxNode]) -> ValueDomain {
    let Some(SyntaxNode::Literal(literal)) = args.get(1) else {
        return ValueDomain::numeric_max();
    };
    let Value::Text(format) = &literal.value else {
        return ValueDomain::numeric_max();
    };

    let digits = format.chars().filter(|c| matches!(c, '9' | '0')).count();
    let scale = format
        .split_once('.')
        .map_or(0, |(_, frac)| frac.chars().filter(|c| matches!(c, '9' | '0')).count());

    let precision = u16::try_from(digits).unwrap_or(u16::MAX);
    let scale = u8::try_from(scale).unwrap_or(u8::MAX);

    ValueDomain::numeric(precision, scale)
}

///
/// TESTS
///
