//! Structural validation of a finished plan tree, run once before the
//! plan is handed to the caller. Failures are engine faults: the builders
//! are supposed to make these states unrepresentable.

use crate::{
    access::{AccessMethod, AccessSource},
    error::{ErrorClass, ErrorOrigin, InternalError},
    key::KeyInfo,
    operand::Operand,
    plan::{PlanBody, PlanNode},
    types::SpecId,
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// PlanValidateError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PlanValidateError {
    #[error("key range {kind} is missing a required bound")]
    MissingRangeBound { kind: String },

    #[error("key range {kind} carries a bound its shape excludes")]
    ExtraRangeBound { kind: String },

    #[error("composite key bound has no parts")]
    EmptyCompositeBound,

    #[error("composite key info carries a non-composite bound")]
    NonCompositeBound,

    #[error("equality range bounds disagree in arity ({lower} vs {upper})")]
    EqArityMismatch { lower: usize, upper: usize },

    #[error("tuple slot {position} out of range for spec {spec} (width {width})")]
    TupleSlotOutOfRange {
        spec: SpecId,
        position: u32,
        width: usize,
    },

    #[error("set operands project different widths ({left} vs {right})")]
    SetOpArityMismatch { left: usize, right: usize },
}

impl From<PlanValidateError> for InternalError {
    fn from(err: PlanValidateError) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Assemble,
            err.to_string(),
        )
    }
}

impl From<PlanValidateError> for crate::error::CompileError {
    fn from(err: PlanValidateError) -> Self {
        InternalError::from(err).into()
    }
}

///
/// validate_plan
///

pub fn validate_plan(root: &PlanNode) -> Result<(), PlanValidateError> {
    // Pass 1: widths of every output-producing spec in the tree.
    let mut widths: BTreeMap<SpecId, usize> = BTreeMap::new();
    let mut collect = |node: &PlanNode| {
        if !node.output.is_empty() {
            widths.insert(node.spec, node.output.len());
        }
        for access in &node.access {
            if let AccessSource::Intermediate { spec, plan } = &access.source {
                widths.insert(*spec, plan.output.len());
            }
        }
    };
    root.walk(&mut collect);

    // Pass 2: per-node structural checks.
    let mut failure: Option<PlanValidateError> = None;
    root.walk(&mut |node| {
        if failure.is_some() {
            return;
        }
        failure = check_node(node, &widths).err();
    });

    failure.map_or(Ok(()), Err)
}

fn check_node(
    node: &PlanNode,
    widths: &BTreeMap<SpecId, usize>,
) -> Result<(), PlanValidateError> {
    for access in &node.access {
        if let AccessMethod::Indexed { key, .. } = &access.method {
            check_key(key)?;
        }
    }

    if let PlanBody::SetOp(setop) = &node.body
        && setop.left.output.len() != setop.right.output.len()
    {
        return Err(PlanValidateError::SetOpArityMismatch {
            left: setop.left.output.len(),
            right: setop.right.output.len(),
        });
    }

    let mut slot_failure: Option<PlanValidateError> = None;
    node.for_each_operand(&mut |operand| {
        if slot_failure.is_some() {
            return;
        }
        if let Operand::TupleSlot(slot) = operand
            && let Some(width) = widths.get(&slot.spec)
            && slot.position as usize >= *width
        {
            slot_failure = Some(PlanValidateError::TupleSlotOutOfRange {
                spec: slot.spec,
                position: slot.position,
                width: *width,
            });
        }
    });
    slot_failure.map_or(Ok(()), Err)
}

fn check_key(key: &KeyInfo) -> Result<(), PlanValidateError> {
    for range in &key.ranges {
        let kind = format!("{:?}", range.kind);
        if range.kind.has_lower() && range.lower.is_none() {
            return Err(PlanValidateError::MissingRangeBound { kind });
        }
        if range.kind.has_upper() && range.upper.is_none() {
            return Err(PlanValidateError::MissingRangeBound { kind });
        }
        if !range.kind.has_lower() && range.lower.is_some() {
            return Err(PlanValidateError::ExtraRangeBound { kind });
        }
        if !range.kind.has_upper() && range.upper.is_some() {
            return Err(PlanValidateError::ExtraRangeBound { kind });
        }

        if key.is_composite {
            for bound in [&range.lower, &range.upper].into_iter().flatten() {
                match bound.composite_arity() {
                    Some(0) => return Err(PlanValidateError::EmptyCompositeBound),
                    Some(_) => {}
                    None => return Err(PlanValidateError::NonCompositeBound),
                }
            }
            if range.kind == crate::key::RangeKind::Eq
                && let (Some(lower), Some(upper)) = (&range.lower, &range.upper)
                && let (Some(left), Some(right)) = (lower.composite_arity(), upper.composite_arity())
                && left != right
            {
                return Err(PlanValidateError::EqArityMismatch {
                    lower: left,
                    upper: right,
                });
            }
        }
    }

    Ok(())
}
