//! Expression code generation: scalar syntax subtrees become [`Operand`]
//! values, the directly evaluable register-style form the execution engine
//! consumes. Module wiring plus the operand vocabulary; lowering logic
//! lives in `lower`, result-domain rules in `rules`.

mod lower;
pub(crate) mod rules;

#[cfg(test)]
mod tests;

pub(crate) use lower::ExprLowerer;

use crate::{
    context::PseudoCell,
    domain::ValueDomain,
    plan::PlanNode,
    predicate::PredicateExpression,
    syntax::{FunctionKind, PseudoColumnKind},
    types::{AttributeId, ParameterIndex, SpecId},
    value::Value,
};
use std::rc::Rc;

///
/// UnboxMode
///
/// How a set-shaped sub-result is consumed: as a single scalar value or as
/// the whole materialized result.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnboxMode {
    Value,
    Table,
}

///
/// ArithOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Concat,
    /// Searched-case selection; carries its guard predicate alongside the
    /// branch operands.
    Case,
}

///
/// Operand
///
/// The compiled, directly evaluable form of a scalar expression. Every
/// operand carries its value domain.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Constant(ConstantOperand),
    TupleSlot(TupleSlotOperand),
    Attribute(AttributeOperand),
    Parameter(ParameterOperand),
    Arith(ArithOperand),
    Function(FunctionOperand),
    SubqueryResult(SubqueryOperand),
    Pseudo(PseudoOperand),
}

impl Operand {
    #[must_use]
    pub fn domain(&self) -> ValueDomain {
        match self {
            Self::Constant(op) => op.domain,
            Self::TupleSlot(op) => op.domain,
            Self::Attribute(op) => op.domain,
            Self::Parameter(op) => op.domain,
            Self::Arith(op) => op.domain,
            Self::Function(op) => op.domain,
            Self::SubqueryResult(op) => op.domain,
            Self::Pseudo(op) => op.domain,
        }
    }

    /// Whether this operand is a literal or bound input parameter — the
    /// key-builder's notion of a constant key part (never derived from
    /// another row).
    #[must_use]
    pub const fn is_constant_input(&self) -> bool {
        matches!(self, Self::Constant(_) | Self::Parameter(_))
    }

    /// Visit this operand and every operand nested below it.
    pub fn for_each(&self, visit: &mut impl FnMut(&Self)) {
        visit(self);
        match self {
            Self::Constant(_)
            | Self::TupleSlot(_)
            | Self::Attribute(_)
            | Self::Parameter(_)
            | Self::Pseudo(_)
            | Self::SubqueryResult(_) => {}
            Self::Arith(op) => {
                for arg in &op.args {
                    arg.for_each(visit);
                }
            }
            Self::Function(op) => {
                for arg in &op.args {
                    arg.for_each(visit);
                }
            }
        }
    }

    #[must_use]
    pub(crate) fn constant(value: Value, domain: ValueDomain) -> Self {
        Self::Constant(ConstantOperand { value, domain })
    }

    /// Composite key construction over the parts of a multi-column index
    /// key, in key order.
    #[must_use]
    pub(crate) fn composite_key(parts: Vec<Self>) -> Self {
        Self::Function(FunctionOperand {
            kind: FunctionKind::CompositeKey,
            args: parts,
            domain: ValueDomain::generic(),
        })
    }

    /// Arity of a composite-key operand; `None` for any other shape.
    #[must_use]
    pub fn composite_arity(&self) -> Option<usize> {
        match self {
            Self::Function(op) if op.kind == FunctionKind::CompositeKey => Some(op.args.len()),
            _ => None,
        }
    }
}

///
/// ConstantOperand
///

#[derive(Clone, Debug, PartialEq)]
pub struct ConstantOperand {
    pub value: Value,
    pub domain: ValueDomain,
}

///
/// TupleSlotOperand
///
/// Positional read from a materialized row. The position must stay below
/// the owning scope's projected-value count; construction checks it and
/// plan validation re-checks it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct TupleSlotOperand {
    pub spec: SpecId,
    pub position: u32,
    pub domain: ValueDomain,
}

///
/// AttributeOperand
///

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeOperand {
    pub spec: SpecId,
    pub attribute: AttributeId,
    pub domain: ValueDomain,
}

///
/// ParameterOperand
///

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterOperand {
    pub index: ParameterIndex,
    pub domain: ValueDomain,
}

///
/// ArithOperand
///
/// `pred` is present exactly for `Case`: the guard evaluated to choose
/// between the branch operands.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ArithOperand {
    pub op: ArithOp,
    pub args: Vec<Operand>,
    pub pred: Option<Box<PredicateExpression>>,
    pub domain: ValueDomain,
}

///
/// FunctionOperand
///

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionOperand {
    pub kind: FunctionKind,
    pub args: Vec<Operand>,
    pub domain: ValueDomain,
}

///
/// SubqueryOperand
///
/// Result handle of a compiled subplan. `single_row` plans bind directly
/// to the plan's single output cell; otherwise the unbox mode decides
/// between first-value and whole-result consumption.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SubqueryOperand {
    pub plan: Rc<PlanNode>,
    pub single_row: bool,
    pub unbox: UnboxMode,
    pub domain: ValueDomain,
}

///
/// PseudoOperand
///
/// Reference to a block-shared pseudo-column cell. Many operands may hold
/// the same cell; the executor is the only writer.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PseudoOperand {
    pub kind: PseudoColumnKind,
    pub cell: PseudoCell,
    pub domain: ValueDomain,
}
