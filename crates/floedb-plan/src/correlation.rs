//! Correlation analysis and subplan placement.
//!
//! Levels are assigned bottom-up while expression lowering resolves names
//! (pass one): a subquery's level is the nesting distance to the binding
//! scope of its nearest free reference, zero when self-contained. This
//! module is pass two: placing each compiled subquery on the plan node
//! that must own its (re-)evaluation.
//!
//! - level 0: evaluated at most once, before any row of the enclosing
//!   block; collected into the block's access-pointer list.
//! - level 1: re-evaluated per row of the specific source it references;
//!   collected into that source's dependent-pointer list.
//! - level > 1: stays reachable only through its parent expression and
//!   rides outward with the parent's own placement, never skipping an
//!   intermediate level.

use crate::{
    context::{CompilationContext, SubqueryRecord},
    error::InternalError,
    plan::PlanNode,
    types::SpecId,
};
use std::{collections::BTreeMap, rc::Rc};

///
/// SubplanAttachment
///
/// Placement result for one block: the access-pointer list and the
/// per-source dependent-pointer lists.
///

#[derive(Debug, Default)]
pub(crate) struct SubplanAttachment {
    pub access_pointers: Vec<Rc<PlanNode>>,
    pub dependent: BTreeMap<SpecId, Vec<Rc<PlanNode>>>,
}

///
/// attach_subplans
///
/// Drain the subqueries recorded while this block compiled (everything at
/// or past `watermark`) and place them. `join_order` lists the block's
/// sources in join order; a level-1 subquery referencing several of them
/// lands on the latest one, where all of its inputs are bound.
///

pub(crate) fn attach_subplans(
    ctx: &mut CompilationContext,
    watermark: usize,
    join_order: &[SpecId],
) -> Result<SubplanAttachment, InternalError> {
    let records = ctx.drain_subqueries(watermark);
    let mut out = SubplanAttachment::default();

    for record in records {
        match record.level {
            0 => {
                if !contains_plan(&out.access_pointers, &record.plan) {
                    out.access_pointers.push(record.plan);
                }
            }
            1 => {
                let spec = owning_spec(&record, join_order)?;
                let list = out.dependent.entry(spec).or_default();
                if !contains_plan(list, &record.plan) {
                    list.push(Rc::clone(&record.plan));
                }
            }
            // Deeper correlation stays attached to its parent expression
            // and is carried outward by the parent's own placement.
            _ => {}
        }
    }

    Ok(out)
}

// A level-1 subquery must reference at least one source of this block;
// anything else means the level bookkeeping broke.
fn owning_spec(record: &SubqueryRecord, join_order: &[SpecId]) -> Result<SpecId, InternalError> {
    join_order
        .iter()
        .rev()
        .find(|spec| record.binding_specs.contains(*spec))
        .copied()
        .ok_or_else(|| {
            let label = record
                .id
                .map_or_else(|| "internal fetch".to_string(), |id| id.to_string());
            InternalError::correlation_invariant(format!(
                "level-1 subquery {label} references no source of its enclosing block",
            ))
        })
}

fn contains_plan(list: &[Rc<PlanNode>], plan: &Rc<PlanNode>) -> bool {
    list.iter().any(|existing| Rc::ptr_eq(existing, plan))
}
