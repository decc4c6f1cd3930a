use crate::{
    access::{AccessInput, AccessSpec, BoundSource, CallSignature, build_access},
    aggregate::{self, AggregateSourceInfo, PlanShape},
    assemble::{PlanHints, compile_query},
    context::{BlockCells, CompilationContext},
    correlation,
    diagnostics::{CompilePhase, CompileTraceEvent},
    error::{CompileError, InternalError},
    model::Catalog,
    operand::{ExprLowerer, UnboxMode},
    plan::{
        ActivationPredicate, OrderDirection, OrderSpec, PlanBody, PlanNode, PseudoCells, SortKey,
    },
    predicate::lower_conjuncts,
    scope::{Scope, ScopeKind},
    syntax::{
        BinaryOp, OrderItem, PseudoColumnKind, QueryBlock, SourceDecl, SourceKind, SyntaxNode, walk,
    },
    types::SpecId,
};
use std::collections::BTreeMap;
use std::rc::Rc;

///
/// compile_block
///
/// One query block through the assembly pipeline: ScopeEntered,
/// SourcesBound, PredicatesClassified, ShapeChosen, AccessSpecsBuilt,
/// SubplansAttached, Finished.
///

pub(crate) fn compile_block(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    block: &QueryBlock,
) -> Result<PlanNode, CompileError> {
    ctx.enter_block()?;
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::ScopeEntered,
    });

    let watermark = ctx.subquery_watermark();
    let cells = ctx.alloc_block_cells();
    let output_spec = ctx.alloc_internal_spec();

    // Register every source in declared order; each becomes the owner of
    // one access spec. Binding may recurse into derived-table bodies.
    let mut bound = Vec::with_capacity(block.sources.len());
    for decl in &block.sources {
        let (source, kind) = bind_source(ctx, catalog, hints, &cells, decl)?;
        ctx.register_scope(Scope::new(
            decl.spec,
            decl.name.clone(),
            kind,
            decl.attributes.clone(),
        ));
        bound.push(source);
    }
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::SourcesBound,
    });

    let join_order: Vec<SpecId> = block.sources.iter().map(|decl| decl.spec).collect();
    let primary = join_order.first().copied();

    // Split the filter: row-number conjuncts activate at this block's
    // level, other pseudo-column conjuncts activate over the sorted
    // output, multi-source conjuncts sit at the join point of the last
    // source completing their reference set, and the rest belong to a
    // single source.
    let conjuncts: Vec<&SyntaxNode> = block
        .filter
        .as_ref()
        .map(walk::flatten_conjuncts)
        .unwrap_or_default();
    let mut per_source: BTreeMap<SpecId, Vec<&SyntaxNode>> = BTreeMap::new();
    let mut join_residual: BTreeMap<SpecId, Vec<&SyntaxNode>> = BTreeMap::new();
    let mut rownum_part: Vec<&SyntaxNode> = Vec::new();
    let mut orderpos_part: Vec<&SyntaxNode> = Vec::new();
    for &conjunct in &conjuncts {
        let profile = walk::profile(conjunct);
        let refs: Vec<SpecId> = join_order
            .iter()
            .filter(|spec| profile.specs.contains(*spec))
            .copied()
            .collect();

        if profile.has_row_number {
            rownum_part.push(conjunct);
        } else if profile.has_pseudo {
            orderpos_part.push(conjunct);
        } else if refs.len() > 1 {
            let owner = *refs.last().unwrap_or(&join_order[0]);
            join_residual.entry(owner).or_default().push(conjunct);
        } else {
            let Some(owner) = refs.first().copied().or(primary) else {
                return Err(InternalError::assemble_invariant(
                    "filter conjunct in a block without sources",
                )
                .into());
            };
            per_source.entry(owner).or_default().push(conjunct);
        }
    }
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::PredicatesClassified,
    });

    // Shape selection and aggregate wiring.
    let single_table = match (bound.first(), bound.len()) {
        (Some(BoundSource::Table { table }), 1) => Some(table),
        _ => None,
    };
    let source_info = AggregateSourceInfo {
        table: single_table,
        predicate_free: conjuncts.is_empty(),
        has_or_or_quantified: block
            .filter
            .as_ref()
            .is_some_and(filter_has_or_or_quantified),
    };
    let aggregation = aggregate::plan_aggregation(
        ctx,
        catalog,
        hints,
        &cells,
        output_spec,
        &block.select,
        &block.group_by,
        block.having.as_ref(),
        &source_info,
    )?;
    let shape = match &aggregation {
        Some(plan) => plan.shape,
        None if block.sources.is_empty() && walk::select_is_single_row(&block.select) => {
            PlanShape::BuildValue
        }
        None => PlanShape::BuildList,
    };
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::ShapeChosen,
    });

    // Access specs per source, in join order.
    let rest_exprs: Vec<&SyntaxNode> = block
        .select
        .iter()
        .chain(block.group_by.iter())
        .chain(block.having.as_ref())
        .collect();
    let mut access_specs: Vec<AccessSpec> = Vec::with_capacity(block.sources.len());
    for (decl, bound_source) in block.sources.iter().zip(&bound) {
        let input = AccessInput {
            source: decl,
            bound: bound_source,
            conjuncts: per_source.remove(&decl.spec).unwrap_or_default(),
            join_residuals: join_residual.remove(&decl.spec).unwrap_or_default(),
            rest_exprs: rest_exprs.clone(),
            choice: hints.access.get(&decl.spec),
        };
        let mut lowerer = ExprLowerer {
            ctx: &mut *ctx,
            catalog,
            hints,
            aggregates: None,
            cells: &cells,
        };
        access_specs.push(build_access(&mut lowerer, &input)?);
    }
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::AccessSpecsBuilt,
    });

    // Output row: select items, then the grouping planner's hidden keys
    // and accumulator cells.
    let mut output = Vec::with_capacity(block.select.len());
    {
        let bindings = aggregation.as_ref().map(|plan| &plan.bindings);
        for item in &block.select {
            let mut lowerer = ExprLowerer {
                ctx: &mut *ctx,
                catalog,
                hints,
                aggregates: bindings,
                cells: &cells,
            };
            output.push(lowerer.lower(item, UnboxMode::Value)?);
        }
    }

    // Ordering: suppressed when the chosen index already delivers it.
    let mut order = build_order(&block.order_by);
    if order.is_some()
        && let Some(primary) = primary
        && hints.order_covered.contains(&primary)
    {
        ctx.trace(CompileTraceEvent::SortSuppressed { spec: primary });
        order = None;
    }

    let row_activation = lower_activation(ctx, catalog, hints, &cells, &rownum_part)?;
    let order_activation = lower_activation(ctx, catalog, hints, &cells, &orderpos_part)?;

    // Place the subqueries this block's expressions compiled.
    let mut attachment = correlation::attach_subplans(ctx, watermark, &join_order)?;
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::SubplansAttached,
    });

    let body = match shape {
        PlanShape::BuildValue => PlanBody::BuildValue,
        PlanShape::BuildList => PlanBody::BuildList,
    };
    let mut node = PlanNode::new(output_spec, body);

    let mut group = None;
    let mut aggregates = Vec::new();
    let mut group_activation = None;
    if let Some(plan) = aggregation {
        output.extend(plan.hidden_outputs);
        output.extend(plan.accumulator_outputs);
        group = plan.group;
        aggregates = plan.aggregates;
        group_activation = plan.group_activation;
    }
    node.output = output;

    // First source is the primary access; later sources chain as sibling
    // scans implementing the join.
    let mut specs = access_specs.into_iter();
    if let Some(first) = specs.next() {
        node.access.push(first);
    }
    for (offset, access) in specs.enumerate() {
        let decl = &block.sources[offset + 1];
        let mut scan = PlanNode::new(decl.spec, PlanBody::Scan);
        scan.access.push(access);
        if let Some(dependents) = attachment.dependent.remove(&decl.spec) {
            scan.dependent_pointers = dependents;
        }
        node.scan_chain.push(scan);
    }

    node.access_pointers = attachment.access_pointers;
    // Materialized source bodies evaluate once, before any row of this
    // block.
    for source in &bound {
        if let BoundSource::Intermediate { plan } = source
            && !node
                .access_pointers
                .iter()
                .any(|existing| Rc::ptr_eq(existing, plan))
        {
            node.access_pointers.push(Rc::clone(plan));
        }
    }
    if let Some(primary) = primary
        && let Some(dependents) = attachment.dependent.remove(&primary)
    {
        node.dependent_pointers = dependents;
    }
    if !attachment.dependent.is_empty() {
        return Err(InternalError::correlation_invariant(
            "dependent subplans bound to a spec outside their block",
        )
        .into());
    }

    node.order = order;
    node.group = group;
    node.aggregates = aggregates;
    node.cells = PseudoCells {
        row_number: cells.cell_if_used(PseudoColumnKind::RowNumber),
        order_position: cells.cell_if_used(PseudoColumnKind::OrderPosition),
        group_position: cells.cell_if_used(PseudoColumnKind::GroupPosition),
    };
    node.row_activation = row_activation;
    node.order_activation = order_activation;
    node.group_activation = group_activation;
    node.distinct = block.distinct;

    ctx.leave_block()?;
    ctx.trace(CompileTraceEvent::Phase {
        phase: CompilePhase::Finished,
    });

    Ok(node)
}

fn bind_source(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    cells: &BlockCells,
    decl: &SourceDecl,
) -> Result<(BoundSource, ScopeKind), CompileError> {
    match &decl.kind {
        SourceKind::Table(table) => {
            let table = catalog.table(*table)?.clone();
            ctx.note_table(table.id);

            Ok((BoundSource::Table { table }, ScopeKind::RowSource))
        }
        SourceKind::Derived(query) => {
            let plan = Rc::new(compile_query(ctx, catalog, hints, query)?);

            Ok((BoundSource::Intermediate { plan }, ScopeKind::Intermediate))
        }
        SourceKind::SetValued(expr) => {
            let mut lowerer = ExprLowerer {
                ctx: &mut *ctx,
                catalog,
                hints,
                aggregates: None,
                cells,
            };
            let operand = lowerer.lower(expr, UnboxMode::Table)?;

            Ok((BoundSource::SetExpr { operand }, ScopeKind::Intermediate))
        }
        SourceKind::ExternalCall(call) => {
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                let mut lowerer = ExprLowerer {
                    ctx: &mut *ctx,
                    catalog,
                    hints,
                    aggregates: None,
                    cells,
                };
                args.push(lowerer.lower(arg, UnboxMode::Value)?);
            }
            let signature = CallSignature {
                name: call.name.clone(),
                args,
                result_domain: call.result_domain,
            };

            Ok((BoundSource::ExternalCall { signature }, ScopeKind::Intermediate))
        }
    }
}

fn filter_has_or_or_quantified(filter: &SyntaxNode) -> bool {
    let mut found = false;
    walk::walk_exprs(filter, &mut |node| match node {
        SyntaxNode::Binary(binary) if binary.op == BinaryOp::Or => found = true,
        SyntaxNode::Quantified(_) | SyntaxNode::InList(_) => found = true,
        _ => {}
    });

    found
}

fn build_order(items: &[OrderItem]) -> Option<OrderSpec> {
    if items.is_empty() {
        return None;
    }

    let keys = items
        .iter()
        .map(|item| SortKey {
            position: item.position,
            direction: if item.descending {
                OrderDirection::Desc
            } else {
                OrderDirection::Asc
            },
        })
        .collect();

    Some(OrderSpec { keys })
}

fn lower_activation(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    cells: &BlockCells,
    parts: &[&SyntaxNode],
) -> Result<Option<ActivationPredicate>, CompileError> {
    if parts.is_empty() {
        return Ok(None);
    }

    let mut lowerer = ExprLowerer {
        ctx: &mut *ctx,
        catalog,
        hints,
        aggregates: None,
        cells,
    };

    Ok(lower_conjuncts(&mut lowerer, parts)?.map(|lowered| ActivationPredicate {
        pred: lowered.pred,
        scan_continue: lowered.scan_continue,
    }))
}
