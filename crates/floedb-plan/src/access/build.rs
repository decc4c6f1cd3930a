use crate::{
    access::{AccessMethod, AccessSource, AccessSpec, CallSignature},
    diagnostics::CompileTraceEvent,
    error::{CompileError, InternalError},
    key::{KeyBuildError, build_key_info},
    model::TableModel,
    operand::{ExprLowerer, Operand},
    plan::PlanNode,
    predicate::lower_conjuncts,
    syntax::{SourceDecl, SyntaxNode, walk},
    types::{AttributeId, IndexId, SpecId},
};
use std::rc::Rc;

///
/// BoundSource
///
/// A block source after binding: its catalog shape or compiled subplan,
/// ready for access-spec construction.
///

#[derive(Clone, Debug)]
pub(crate) enum BoundSource {
    Table { table: TableModel },
    Intermediate { plan: Rc<PlanNode> },
    SetExpr { operand: Operand },
    ExternalCall { signature: CallSignature },
}

///
/// IndexChoice
///
/// The optimizer's chosen index for one source: index id plus the ordered
/// positions (into the source's conjunct list) of the terms that apply to
/// the index's leading columns.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexChoice {
    pub index: IndexId,
    pub terms: Vec<usize>,
}

///
/// AccessInput
///

pub(crate) struct AccessInput<'a> {
    pub source: &'a SourceDecl,
    pub bound: &'a BoundSource,
    /// Conjuncts classified to this source by the block-level split.
    pub conjuncts: Vec<&'a SyntaxNode>,
    /// Multi-source conjuncts this source owns at its join point.
    pub join_residuals: Vec<&'a SyntaxNode>,
    /// Block expressions read from this source outside its own filters.
    pub rest_exprs: Vec<&'a SyntaxNode>,
    pub choice: Option<&'a IndexChoice>,
}

///
/// build_access
///
/// Combine a bound source, an optional index choice, and the source's
/// conjuncts into an access spec. A key-coercion mismatch degrades to a
/// sequential scan with the predicate left unsplit.
///

pub(crate) fn build_access(
    lowerer: &mut ExprLowerer<'_>,
    input: &AccessInput<'_>,
) -> Result<AccessSpec, CompileError> {
    let spec = input.source.spec;

    if let (Some(choice), BoundSource::Table { table }) = (input.choice, input.bound) {
        match indexed_access(lowerer, input, table, choice) {
            Ok(access) => return Ok(access),
            Err(KeyBuildError::TypeMismatch { .. }) => {
                // Recoverable: fall back to a sequential scan and keep the
                // original predicate whole in the residual stage.
                lowerer.ctx.trace(CompileTraceEvent::IndexDegraded {
                    spec,
                    index: choice.index,
                });

                return degraded_access(lowerer, input, table);
            }
            Err(KeyBuildError::Compile(err)) => return Err(*err),
        }
    }

    sequential_access(lowerer, input)
}

fn indexed_access(
    lowerer: &mut ExprLowerer<'_>,
    input: &AccessInput<'_>,
    table: &TableModel,
    choice: &IndexChoice,
) -> Result<AccessSpec, KeyBuildError> {
    let spec = input.source.spec;
    let index = table
        .index(choice.index)
        .ok_or_else(|| {
            InternalError::access_internal(format!(
                "optimizer chose unknown index {} for table '{}'",
                choice.index, table.name
            ))
        })?
        .clone();

    let mut key_terms = Vec::with_capacity(choice.terms.len());
    for position in &choice.terms {
        let term = input.conjuncts.get(*position).copied().ok_or_else(|| {
            InternalError::access_internal(format!(
                "index term position {position} outside the source's conjunct list"
            ))
        })?;
        key_terms.push(term);
    }

    let key = build_key_info(lowerer, spec, table, &index, &key_terms)?;

    // Partition: key terms were consumed by the key builder and are
    // re-checked as the key filter; of the rest, source-local conjuncts
    // become the access filter and everything else stays residual.
    let mut access_terms = Vec::new();
    let mut residual_terms = Vec::new();
    for (position, &conjunct) in input.conjuncts.iter().enumerate() {
        if choice.terms.contains(&position) {
            continue;
        }
        if is_access_compatible(conjunct, spec) {
            access_terms.push(conjunct);
        } else {
            residual_terms.push(conjunct);
        }
    }
    residual_terms.extend(input.join_residuals.iter().copied());

    let key_filter = lower_filter(lowerer, &key_terms)?;
    let access_filter = lower_filter(lowerer, &access_terms)?;
    let residual_filter = lower_filter(lowerer, &residual_terms)?;

    let key_columns = collect_columns(table, spec, &key_terms, &[]);
    let filter_columns = collect_columns(table, spec, &access_terms, &key_columns);
    let mut seen = key_columns.clone();
    seen.extend_from_slice(&filter_columns);
    let mut rest_sources: Vec<&SyntaxNode> = residual_terms.clone();
    rest_sources.extend(input.rest_exprs.iter().copied());
    let rest_columns = collect_columns(table, spec, &rest_sources, &seen);

    Ok(AccessSpec {
        source: table_source(spec, table),
        method: AccessMethod::Indexed {
            index: index.id,
            key,
        },
        key_filter,
        access_filter,
        residual_filter,
        key_columns,
        filter_columns,
        rest_columns,
    })
}

// Sequential access: no key stage; the access/residual partition still
// applies.
fn sequential_access(
    lowerer: &mut ExprLowerer<'_>,
    input: &AccessInput<'_>,
) -> Result<AccessSpec, CompileError> {
    let spec = input.source.spec;

    let mut access_terms = Vec::new();
    let mut residual_terms = Vec::new();
    for &conjunct in &input.conjuncts {
        if is_access_compatible(conjunct, spec) {
            access_terms.push(conjunct);
        } else {
            residual_terms.push(conjunct);
        }
    }
    residual_terms.extend(input.join_residuals.iter().copied());

    let access_filter = lower_filter(lowerer, &access_terms)?;
    let residual_filter = lower_filter(lowerer, &residual_terms)?;

    let (filter_columns, rest_columns) = match input.bound {
        BoundSource::Table { table } => {
            let filter_columns = collect_columns(table, spec, &access_terms, &[]);
            let mut rest_sources: Vec<&SyntaxNode> = residual_terms.clone();
            rest_sources.extend(input.rest_exprs.iter().copied());
            let rest_columns = collect_columns(table, spec, &rest_sources, &filter_columns);

            (filter_columns, rest_columns)
        }
        _ => (Vec::new(), Vec::new()),
    };

    Ok(AccessSpec {
        source: bound_source(spec, input.bound),
        method: AccessMethod::Sequential,
        key_filter: None,
        access_filter,
        residual_filter,
        key_columns: Vec::new(),
        filter_columns,
        rest_columns,
    })
}

// Degraded access after a key type mismatch: sequential scan, predicate
// left unsplit as one residual filter.
fn degraded_access(
    lowerer: &mut ExprLowerer<'_>,
    input: &AccessInput<'_>,
    table: &TableModel,
) -> Result<AccessSpec, CompileError> {
    let spec = input.source.spec;

    let mut residual_terms = input.conjuncts.clone();
    residual_terms.extend(input.join_residuals.iter().copied());
    let residual_filter = lower_filter(lowerer, &residual_terms)?;

    let mut rest_sources: Vec<&SyntaxNode> = residual_terms.clone();
    rest_sources.extend(input.rest_exprs.iter().copied());
    let rest_columns = collect_columns(table, spec, &rest_sources, &[]);

    Ok(AccessSpec {
        source: table_source(spec, table),
        method: AccessMethod::Sequential,
        key_filter: None,
        access_filter: None,
        residual_filter,
        key_columns: Vec::new(),
        filter_columns: Vec::new(),
        rest_columns,
    })
}

// Access compatibility: every leaf resolves to this source, no nested
// query, and no row-number pseudo column (row number is only meaningful
// once the full row composition for this nesting level is known).
fn is_access_compatible(conjunct: &SyntaxNode, spec: SpecId) -> bool {
    let profile = walk::profile(conjunct);

    !profile.has_subquery
        && !profile.has_pseudo
        && profile.specs.iter().all(|s| *s == spec)
}

fn lower_filter(
    lowerer: &mut ExprLowerer<'_>,
    conjuncts: &[&SyntaxNode],
) -> Result<Option<crate::predicate::PredicateExpression>, CompileError> {
    Ok(lower_conjuncts(lowerer, conjuncts)?.map(|lowered| lowered.pred))
}

// Attribute ids of this source referenced by the given expressions,
// deduplicated against `already`, ordered by declared attribute position.
fn collect_columns(
    table: &TableModel,
    spec: SpecId,
    exprs: &[&SyntaxNode],
    already: &[AttributeId],
) -> Vec<AttributeId> {
    let mut referenced: Vec<AttributeId> = Vec::new();
    for &expr in exprs {
        walk::walk_exprs(expr, &mut |leaf| {
            if let SyntaxNode::ColumnRef(column) = leaf
                && column.spec == spec
                && let Some(attribute) = column.attribute
                && !already.contains(&attribute)
                && !referenced.contains(&attribute)
            {
                referenced.push(attribute);
            }
        });
    }

    referenced.sort_by_key(|id| table.attribute(*id).map_or(u32::MAX, |attr| attr.position));

    referenced
}

fn table_source(spec: SpecId, table: &TableModel) -> AccessSource {
    AccessSource::Table {
        spec,
        table: table.id,
        partitions: table.partitions.clone(),
    }
}

fn bound_source(spec: SpecId, bound: &BoundSource) -> AccessSource {
    match bound {
        BoundSource::Table { table } => table_source(spec, table),
        BoundSource::Intermediate { plan } => AccessSource::Intermediate {
            spec,
            plan: Rc::clone(plan),
        },
        BoundSource::SetExpr { operand } => AccessSource::SetExpr {
            spec,
            operand: operand.clone(),
        },
        BoundSource::ExternalCall { signature } => AccessSource::ExternalCall {
            spec,
            signature: signature.clone(),
            input: None,
        },
    }
}
