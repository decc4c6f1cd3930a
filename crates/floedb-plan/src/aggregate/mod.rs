//! Aggregate and grouping planning: build-value vs build-list shape
//! selection, accumulator wiring, group-by sort keys, and the HAVING
//! split into its plain and group-position-dependent parts.

#[cfg(test)]
mod tests;

use crate::{
    assemble::PlanHints,
    context::{BlockCells, CompilationContext},
    domain::ValueDomain,
    error::{CompileError, InternalError},
    model::{Catalog, TableModel},
    operand::{ArithOp, ExprLowerer, Operand, TupleSlotOperand, UnboxMode, rules},
    plan::{ActivationPredicate, AggregateOption, AggregateSpec, OrderDirection, OrderSpec, SortKey},
    predicate::{PredicateExpression, lower_conjuncts},
    syntax::{AggregateExpr, AggregateKind, SyntaxNode, walk},
    types::{AggregateCallId, IndexId, SpecId},
};
use std::collections::BTreeMap;

///
/// PlanShape
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlanShape {
    BuildValue,
    BuildList,
}

///
/// AggregateBinding
///
/// Where one aggregate call's result cell lives in the block output row.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct AggregateBinding {
    pub spec: SpecId,
    pub position: u32,
    pub domain: ValueDomain,
}

///
/// AggregateBindings
///

#[derive(Clone, Debug, Default)]
pub(crate) struct AggregateBindings {
    entries: BTreeMap<AggregateCallId, AggregateBinding>,
}

impl AggregateBindings {
    pub(crate) fn get(&self, call: AggregateCallId) -> Option<&AggregateBinding> {
        self.entries.get(&call)
    }

    fn insert(&mut self, call: AggregateCallId, binding: AggregateBinding) {
        self.entries.insert(call, binding);
    }
}

///
/// AggregateSourceInfo
///
/// Block facts the index short-circuit hint depends on: the single table
/// scanned (if the block scans exactly one), whether any predicate
/// references it, and whether an OR/quantified predicate is present.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct AggregateSourceInfo<'a> {
    pub table: Option<&'a TableModel>,
    pub predicate_free: bool,
    pub has_or_or_quantified: bool,
}

///
/// AggregationPlan
///

#[derive(Clone, Debug)]
pub(crate) struct AggregationPlan {
    pub shape: PlanShape,
    pub aggregates: Vec<AggregateSpec>,
    pub group: Option<OrderSpec>,
    pub having: Option<PredicateExpression>,
    pub group_activation: Option<ActivationPredicate>,
    /// Group-by expressions absent from the select list, lowered; appended
    /// to the output row after the select items.
    pub hidden_outputs: Vec<Operand>,
    /// Accumulator result cells, appended after the hidden outputs.
    pub accumulator_outputs: Vec<Operand>,
    pub bindings: AggregateBindings,
}

///
/// plan_aggregation
///
/// Returns `None` when the block has neither aggregates nor GROUP BY.
///

#[expect(clippy::too_many_arguments)]
pub(crate) fn plan_aggregation(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    cells: &BlockCells,
    output_spec: SpecId,
    select: &[SyntaxNode],
    group_by: &[SyntaxNode],
    having: Option<&SyntaxNode>,
    source_info: &AggregateSourceInfo<'_>,
) -> Result<Option<AggregationPlan>, CompileError> {
    let calls = collect_calls(select, having)?;
    if calls.is_empty() && group_by.is_empty() {
        return Ok(None);
    }

    let shape = if group_by.is_empty() && walk::select_is_single_row(select) {
        PlanShape::BuildValue
    } else {
        PlanShape::BuildList
    };

    // Output row layout: select items, then hidden group keys, then
    // accumulator cells.
    let hidden_group: Vec<&SyntaxNode> = group_by
        .iter()
        .filter(|expr| !select.contains(*expr))
        .collect();
    let acc_base = select.len() + hidden_group.len();

    let mut bindings = AggregateBindings::default();
    let mut aggregates = Vec::with_capacity(calls.len());
    let mut accumulator_outputs = Vec::with_capacity(calls.len());
    for (offset, &aggregate) in calls.iter().enumerate() {
        let position = u32::try_from(acc_base + offset)
            .map_err(|_| InternalError::aggregate_invariant("output row exceeds slot space"))?;
        let domain = accumulator_domain(aggregate);
        bindings.insert(
            aggregate.call,
            AggregateBinding {
                spec: output_spec,
                position,
                domain,
            },
        );

        let input = match &aggregate.arg {
            Some(arg) => {
                let mut lowerer = ExprLowerer {
                    ctx: &mut *ctx,
                    catalog,
                    hints,
                    aggregates: None,
                    cells,
                };
                Some(lowerer.lower(arg, UnboxMode::Value)?)
            }
            None => None,
        };

        aggregates.push(AggregateSpec {
            kind: aggregate.kind,
            option: if aggregate.distinct {
                AggregateOption::Distinct
            } else {
                AggregateOption::All
            },
            input,
            domain,
            output_position: position,
            index_hint: index_hint(aggregate, source_info),
        });
        accumulator_outputs.push(Operand::TupleSlot(TupleSlotOperand {
            spec: output_spec,
            position,
            domain,
        }));
    }

    // The grouping key list is a stable ascending sort specification over
    // output positions.
    let group = build_group_spec(select, group_by, &hidden_group)?;

    let mut hidden_outputs = Vec::with_capacity(hidden_group.len());
    for &expr in &hidden_group {
        let mut lowerer = ExprLowerer {
            ctx: &mut *ctx,
            catalog,
            hints,
            aggregates: None,
            cells,
        };
        hidden_outputs.push(lowerer.lower(expr, UnboxMode::Value)?);
    }

    let (having_pred, group_activation) =
        split_having(ctx, catalog, hints, cells, &bindings, having)?;

    Ok(Some(AggregationPlan {
        shape,
        aggregates,
        group,
        having: having_pred,
        group_activation,
        hidden_outputs,
        accumulator_outputs,
        bindings,
    }))
}

// Collect the distinct aggregate calls of the block, rejecting aggregate
// arguments that themselves contain aggregate calls.
fn collect_calls<'a>(
    select: &'a [SyntaxNode],
    having: Option<&'a SyntaxNode>,
) -> Result<Vec<&'a AggregateExpr>, CompileError> {
    let mut found: Vec<&AggregateExpr> = Vec::new();
    for item in select.iter().chain(having) {
        walk::collect_aggregates(item, &mut found);
    }

    let mut calls: Vec<&AggregateExpr> = Vec::new();
    for aggregate in found {
        if let Some(arg) = &aggregate.arg
            && walk::contains_aggregate(arg)
        {
            return Err(InternalError::aggregate_invariant(format!(
                "nested aggregate call at {}",
                aggregate.location
            ))
            .into());
        }
        if !calls.iter().any(|existing| existing.call == aggregate.call) {
            calls.push(aggregate);
        }
    }

    Ok(calls)
}

fn accumulator_domain(aggregate: &AggregateExpr) -> ValueDomain {
    match aggregate.kind {
        AggregateKind::Count | AggregateKind::CountStar => ValueDomain::bigint(),
        AggregateKind::Avg | AggregateKind::Stddev | AggregateKind::Variance => {
            ValueDomain::double()
        }
        AggregateKind::Sum => aggregate
            .arg
            .as_deref()
            .map_or(ValueDomain::numeric_max(), |arg| {
                rules::arith_result(ArithOp::Add, &[arg.domain(), arg.domain()])
            }),
        AggregateKind::Min | AggregateKind::Max => aggregate
            .arg
            .as_deref()
            .map_or(ValueDomain::generic(), SyntaxNode::domain),
    }
}

// Cardinality-only aggregates may short-circuit through an index when
// nothing else constrains the table.
fn index_hint(
    aggregate: &AggregateExpr,
    source_info: &AggregateSourceInfo<'_>,
) -> Option<IndexId> {
    if !source_info.predicate_free || source_info.has_or_or_quantified || aggregate.distinct {
        return None;
    }
    let table = source_info.table?;

    match aggregate.kind {
        AggregateKind::CountStar => table.indexes.first().map(|index| index.id),
        AggregateKind::Min | AggregateKind::Max => {
            let SyntaxNode::ColumnRef(column) = aggregate.arg.as_deref()? else {
                return None;
            };
            let attribute = column.attribute?;

            table
                .indexes
                .iter()
                .find(|index| index.attributes.first() == Some(&attribute))
                .map(|index| index.id)
        }
        _ => None,
    }
}

fn build_group_spec(
    select: &[SyntaxNode],
    group_by: &[SyntaxNode],
    hidden_group: &[&SyntaxNode],
) -> Result<Option<OrderSpec>, CompileError> {
    if group_by.is_empty() {
        return Ok(None);
    }

    let mut keys = Vec::with_capacity(group_by.len());
    for expr in group_by {
        let position = if let Some(position) = select.iter().position(|item| item == expr) {
            position
        } else {
            let hidden = hidden_group
                .iter()
                .position(|item| *item == expr)
                .ok_or_else(|| {
                    InternalError::aggregate_invariant("group key missing from output layout")
                })?;
            select.len() + hidden
        };

        keys.push(SortKey {
            position: u32::try_from(position)
                .map_err(|_| InternalError::aggregate_invariant("group key position overflow"))?,
            direction: OrderDirection::Asc,
        });
    }

    Ok(Some(OrderSpec { keys }))
}

// HAVING splits into a pseudo-column-free part evaluated per group and a
// group-position-dependent part whose continuation flag decides whether a
// failing group still lets later groups through.
fn split_having(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    cells: &BlockCells,
    bindings: &AggregateBindings,
    having: Option<&SyntaxNode>,
) -> Result<(Option<PredicateExpression>, Option<ActivationPredicate>), CompileError> {
    let Some(having) = having else {
        return Ok((None, None));
    };

    let conjuncts = walk::flatten_conjuncts(having);
    let mut having_part = Vec::new();
    let mut grbynum_part = Vec::new();
    for conjunct in conjuncts {
        if walk::profile(conjunct).has_pseudo {
            grbynum_part.push(conjunct);
        } else {
            having_part.push(conjunct);
        }
    }

    let mut lowerer = ExprLowerer {
        ctx,
        catalog,
        hints,
        aggregates: Some(bindings),
        cells,
    };
    let having_pred = lower_conjuncts(&mut lowerer, &having_part)?.map(|lowered| lowered.pred);
    let group_activation = lower_conjuncts(&mut lowerer, &grbynum_part)?.map(|lowered| {
        ActivationPredicate {
            pred: lowered.pred,
            scan_continue: lowered.scan_continue,
        }
    });

    Ok((having_pred, group_activation))
}
