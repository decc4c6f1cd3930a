use crate::{
    domain::DomainKind,
    error::{ErrorOrigin, InternalError},
    key::{KeyBuildError, KeyInfo, KeyRange, RangeKind},
    model::{AttributeModel, IndexModel, TableModel},
    operand::{ExprLowerer, Operand, UnboxMode},
    syntax::{BinaryOp, RangeBranch, RangeBranchOp, SyntaxNode},
    types::SpecId,
    value,
};

///
/// build_key_info
///
/// Derive ordered key ranges from the conjuncts the optimizer asserts
/// apply to an index's leading columns. Strategy is chosen by the last
/// (most specific) term: all-equality, range, list, or range-list.
///

pub(crate) fn build_key_info(
    lowerer: &mut ExprLowerer<'_>,
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    terms: &[&SyntaxNode],
) -> Result<KeyInfo, KeyBuildError> {
    let Some((&last, eq_terms)) = terms.split_last() else {
        return Err(InternalError::key_internal("index choice carries no terms").into());
    };
    if terms.len() > lowerer.ctx.limits.max_key_parts {
        return Err(InternalError::resource(
            ErrorOrigin::Key,
            format!("key spans more than {} parts", lowerer.ctx.limits.max_key_parts),
        )
        .into());
    }

    let multi_col = index.is_composite();

    match last {
        SyntaxNode::Binary(binary) if binary.op == BinaryOp::Eq => {
            single_key(lowerer, spec, table, index, terms, multi_col)
        }
        SyntaxNode::Binary(binary) if binary.op.is_comparison() => {
            range_key(lowerer, spec, table, index, eq_terms, last, multi_col)
        }
        SyntaxNode::Between(between) if !between.negated => {
            range_key(lowerer, spec, table, index, eq_terms, last, multi_col)
        }
        SyntaxNode::InList(in_list) if !in_list.negated => {
            list_key(lowerer, spec, table, index, eq_terms, in_list, multi_col)
        }
        SyntaxNode::RangeList(_) => {
            rangelist_key(lowerer, spec, table, index, eq_terms, last, multi_col, terms.len())
        }
        _ => Err(InternalError::key_internal(
            "last index term operator is not applicable to an index scan",
        )
        .into()),
    }
}

// All terms are equality conjuncts; the result is exactly one EQ range
// whose bounds are the (possibly composite) key value.
fn single_key(
    lowerer: &mut ExprLowerer<'_>,
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    terms: &[&SyntaxNode],
    multi_col: bool,
) -> Result<KeyInfo, KeyBuildError> {
    let mut parts = Vec::with_capacity(terms.len());
    let mut is_constant = true;

    for &term in terms {
        let (attr, value_node, op) = comparison_term(spec, table, index, term)?;
        if op != BinaryOp::Eq {
            return Err(InternalError::key_internal(
                "single-key derivation requires equality on every term",
            )
            .into());
        }
        let part = key_value(lowerer, &attr, value_node)?;
        is_constant &= part.is_constant_input();
        parts.push(part);
    }

    let key = assemble_key(multi_col, parts)?;

    Ok(KeyInfo {
        ranges: vec![KeyRange {
            kind: RangeKind::Eq,
            lower: Some(key.clone()),
            upper: Some(key),
        }],
        is_constant,
        is_composite: multi_col,
    })
}

// Equality prefix plus one range term: the prefix contributes to both
// bounds, the last term decides which bound it extends and the range kind.
fn range_key(
    lowerer: &mut ExprLowerer<'_>,
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    eq_terms: &[&SyntaxNode],
    last: &SyntaxNode,
    multi_col: bool,
) -> Result<KeyInfo, KeyBuildError> {
    let nterms = eq_terms.len() + 1;
    let mut lower_parts = Vec::new();
    let mut upper_parts = Vec::new();
    let mut is_constant = true;

    for &term in eq_terms {
        let (attr, value_node, op) = comparison_term(spec, table, index, term)?;
        if op != BinaryOp::Eq {
            return Err(InternalError::key_internal(
                "range-key derivation requires equality on every earlier term",
            )
            .into());
        }
        let part = key_value(lowerer, &attr, value_node)?;
        is_constant &= part.is_constant_input();
        lower_parts.push(part.clone());
        upper_parts.push(part);
    }

    let kind = match last {
        SyntaxNode::Binary(_) => {
            let (attr, value_node, op) = comparison_term(spec, table, index, last)?;
            let part = key_value(lowerer, &attr, value_node)?;
            is_constant &= part.is_constant_input();
            match op {
                BinaryOp::Gt => {
                    lower_parts.push(part);
                    if nterms > 1 { RangeKind::GtLe } else { RangeKind::GtInf }
                }
                BinaryOp::Ge => {
                    lower_parts.push(part);
                    if nterms > 1 { RangeKind::GeLe } else { RangeKind::GeInf }
                }
                BinaryOp::Lt => {
                    upper_parts.push(part);
                    if nterms > 1 { RangeKind::GeLt } else { RangeKind::InfLt }
                }
                BinaryOp::Le => {
                    upper_parts.push(part);
                    if nterms > 1 { RangeKind::GeLe } else { RangeKind::InfLe }
                }
                _ => {
                    return Err(InternalError::key_internal(
                        "range-key derivation requires an ordering operator on the last term",
                    )
                    .into());
                }
            }
        }
        SyntaxNode::Between(between) => {
            let Some(attr) = indexed_column(spec, table, index, &between.subject) else {
                return Err(non_indexed_term());
            };
            let lower = key_value(lowerer, &attr, &between.lower)?;
            let upper = key_value(lowerer, &attr, &between.upper)?;
            is_constant &= lower.is_constant_input() && upper.is_constant_input();
            lower_parts.push(lower);
            upper_parts.push(upper);

            RangeKind::GeLe
        }
        _ => {
            return Err(InternalError::key_internal(
                "range-key derivation requires a comparison or BETWEEN last term",
            )
            .into());
        }
    };

    Ok(KeyInfo {
        ranges: vec![KeyRange {
            kind,
            lower: bound_key(multi_col, lower_parts)?,
            upper: bound_key(multi_col, upper_parts)?,
        }],
        is_constant,
        is_composite: multi_col,
    })
}

// Equality prefix replicated across every list element; one EQ range per
// element, preserving source element order.
fn list_key(
    lowerer: &mut ExprLowerer<'_>,
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    eq_terms: &[&SyntaxNode],
    in_list: &crate::syntax::InListExpr,
    multi_col: bool,
) -> Result<KeyInfo, KeyBuildError> {
    if in_list.elements.len() > lowerer.ctx.limits.max_list_key_elements {
        return Err(InternalError::resource(
            ErrorOrigin::Key,
            format!(
                "list key exceeds {} elements",
                lowerer.ctx.limits.max_list_key_elements
            ),
        )
        .into());
    }

    let (prefix, mut is_constant) = eq_prefix(lowerer, spec, table, index, eq_terms)?;
    let Some(attr) = indexed_column(spec, table, index, &in_list.subject) else {
        return Err(non_indexed_term());
    };

    let mut ranges = Vec::with_capacity(in_list.elements.len());
    for element in &in_list.elements {
        let part = key_value(lowerer, &attr, element)?;
        is_constant &= part.is_constant_input();

        let mut parts = prefix.clone();
        parts.push(part);
        let key = assemble_key(multi_col, parts)?;
        ranges.push(KeyRange {
            kind: RangeKind::Eq,
            lower: Some(key.clone()),
            upper: Some(key),
        });
    }

    Ok(KeyInfo {
        ranges,
        is_constant,
        is_composite: multi_col,
    })
}

// Equality prefix replicated across every range branch; each branch's kind
// is derived from its own operator, independently of the other branches.
#[expect(clippy::too_many_arguments)]
fn rangelist_key(
    lowerer: &mut ExprLowerer<'_>,
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    eq_terms: &[&SyntaxNode],
    last: &SyntaxNode,
    multi_col: bool,
    nterms: usize,
) -> Result<KeyInfo, KeyBuildError> {
    let SyntaxNode::RangeList(range_list) = last else {
        return Err(InternalError::key_internal("range-list derivation on a non-range term").into());
    };

    let (prefix, mut is_constant) = eq_prefix(lowerer, spec, table, index, eq_terms)?;
    let Some(attr) = indexed_column(spec, table, index, &range_list.subject) else {
        return Err(non_indexed_term());
    };

    let mut ranges = Vec::with_capacity(range_list.branches.len());
    for branch in &range_list.branches {
        ranges.push(range_branch(
            lowerer,
            &attr,
            &prefix,
            branch,
            multi_col,
            nterms,
            &mut is_constant,
        )?);
    }

    Ok(KeyInfo {
        ranges,
        is_constant,
        is_composite: multi_col,
    })
}

fn range_branch(
    lowerer: &mut ExprLowerer<'_>,
    attr: &AttributeModel,
    prefix: &[Operand],
    branch: &RangeBranch,
    multi_col: bool,
    nterms: usize,
    is_constant: &mut bool,
) -> Result<KeyRange, KeyBuildError> {
    let kind = branch_kind(branch.op, nterms > 1);

    let bound = |node: Option<&SyntaxNode>,
                     lowerer: &mut ExprLowerer<'_>,
                     is_constant: &mut bool|
     -> Result<Option<Operand>, KeyBuildError> {
        match node {
            Some(node) => {
                let part = key_value(lowerer, attr, node)?;
                *is_constant &= part.is_constant_input();

                Ok(Some(part))
            }
            None => Ok(None),
        }
    };

    let (lower_point, upper_point) = match branch.op {
        RangeBranchOp::Eq => {
            let Some(point) = bound(branch.lower.as_ref(), lowerer, is_constant)? else {
                return Err(malformed_branch(branch, "point branch is missing its value"));
            };

            (Some(point.clone()), Some(point))
        }
        RangeBranchOp::GeInf | RangeBranchOp::GtInf => {
            let Some(point) = bound(branch.lower.as_ref(), lowerer, is_constant)? else {
                return Err(malformed_branch(branch, "lower bound is missing"));
            };

            (Some(point), None)
        }
        RangeBranchOp::InfLe | RangeBranchOp::InfLt => {
            let Some(point) = bound(branch.upper.as_ref(), lowerer, is_constant)? else {
                return Err(malformed_branch(branch, "upper bound is missing"));
            };

            (None, Some(point))
        }
        RangeBranchOp::GeLe | RangeBranchOp::GeLt | RangeBranchOp::GtLe | RangeBranchOp::GtLt => {
            let lower = bound(branch.lower.as_ref(), lowerer, is_constant)?;
            let upper = bound(branch.upper.as_ref(), lowerer, is_constant)?;
            if lower.is_none() || upper.is_none() {
                return Err(malformed_branch(branch, "bounded branch is missing a bound"));
            }

            (lower, upper)
        }
    };

    let mut lower_parts = prefix.to_vec();
    if let Some(point) = lower_point {
        lower_parts.push(point);
    }
    let mut upper_parts = prefix.to_vec();
    if let Some(point) = upper_point {
        upper_parts.push(point);
    }

    Ok(KeyRange {
        kind,
        lower: bound_key(multi_col, lower_parts)?,
        upper: bound_key(multi_col, upper_parts)?,
    })
}

// Operator-to-kind table for range branches; with an equality prefix the
// unbounded side closes over the prefix value.
const fn branch_kind(op: RangeBranchOp, multi_terms: bool) -> RangeKind {
    match op {
        RangeBranchOp::Eq => RangeKind::Eq,
        RangeBranchOp::GeLe => RangeKind::GeLe,
        RangeBranchOp::GeLt => RangeKind::GeLt,
        RangeBranchOp::GtLe => RangeKind::GtLe,
        RangeBranchOp::GtLt => RangeKind::GtLt,
        RangeBranchOp::GeInf => {
            if multi_terms { RangeKind::GeLe } else { RangeKind::GeInf }
        }
        RangeBranchOp::GtInf => {
            if multi_terms { RangeKind::GtLe } else { RangeKind::GtInf }
        }
        RangeBranchOp::InfLe => {
            if multi_terms { RangeKind::GeLe } else { RangeKind::InfLe }
        }
        RangeBranchOp::InfLt => {
            if multi_terms { RangeKind::GeLt } else { RangeKind::InfLt }
        }
    }
}

fn eq_prefix(
    lowerer: &mut ExprLowerer<'_>,
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    eq_terms: &[&SyntaxNode],
) -> Result<(Vec<Operand>, bool), KeyBuildError> {
    let mut parts = Vec::with_capacity(eq_terms.len());
    let mut is_constant = true;

    for &term in eq_terms {
        let (attr, value_node, op) = comparison_term(spec, table, index, term)?;
        if op != BinaryOp::Eq {
            return Err(InternalError::key_internal(
                "key prefix terms must be equality conjuncts",
            )
            .into());
        }
        let part = key_value(lowerer, &attr, value_node)?;
        is_constant &= part.is_constant_input();
        parts.push(part);
    }

    Ok((parts, is_constant))
}

// Destructure one comparison term into (indexed column, key value side,
// operator), swapping sides and restating the operator when the indexed
// column sits on the right.
fn comparison_term<'a>(
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    term: &'a SyntaxNode,
) -> Result<(AttributeModel, &'a SyntaxNode, BinaryOp), KeyBuildError> {
    let SyntaxNode::Binary(binary) = term else {
        return Err(non_indexed_term());
    };
    if !binary.op.is_comparison() {
        return Err(non_indexed_term());
    }

    if let Some(attr) = indexed_column(spec, table, index, &binary.left) {
        return Ok((attr, &binary.right, binary.op));
    }
    if let Some(attr) = indexed_column(spec, table, index, &binary.right) {
        let op = binary
            .op
            .converse()
            .ok_or_else(|| InternalError::key_internal("operator has no converse form"))?;

        return Ok((attr, &binary.left, op));
    }

    Err(non_indexed_term())
}

fn indexed_column(
    spec: SpecId,
    table: &TableModel,
    index: &IndexModel,
    node: &SyntaxNode,
) -> Option<AttributeModel> {
    let SyntaxNode::ColumnRef(column) = node else {
        return None;
    };
    if column.spec != spec {
        return None;
    }
    let attribute = column.attribute?;
    index.key_position(attribute)?;

    table.attribute(attribute).cloned()
}

// Lower a key value and make sure it can actually be compared against the
// indexed column: literals are coerced in place, everything else passes a
// family compatibility check.
fn key_value(
    lowerer: &mut ExprLowerer<'_>,
    attr: &AttributeModel,
    node: &SyntaxNode,
) -> Result<Operand, KeyBuildError> {
    let operand = lowerer.lower_expected(node, UnboxMode::Value, Some(attr.domain))?;

    match &operand {
        Operand::Constant(constant) => match value::coerce(&constant.value, &attr.domain) {
            Ok(coerced) => Ok(Operand::constant(coerced, attr.domain)),
            Err(_) => Err(KeyBuildError::TypeMismatch {
                attribute: attr.name.clone(),
            }),
        },
        other => {
            let kind = other.domain().kind;
            if kind == DomainKind::Generic || kind.same_family(attr.domain.kind) {
                Ok(operand)
            } else {
                Err(KeyBuildError::TypeMismatch {
                    attribute: attr.name.clone(),
                })
            }
        }
    }
}

// One bound of a key range: composite construction for multi-column
// indexes, the bare part otherwise; an empty part list is an open bound.
fn bound_key(multi_col: bool, parts: Vec<Operand>) -> Result<Option<Operand>, KeyBuildError> {
    if parts.is_empty() {
        return Ok(None);
    }
    if multi_col {
        return Ok(Some(Operand::composite_key(parts)));
    }
    if parts.len() > 1 {
        return Err(
            InternalError::key_internal("single-column index received a composite key").into(),
        );
    }

    Ok(parts.into_iter().next())
}

fn assemble_key(multi_col: bool, parts: Vec<Operand>) -> Result<Operand, KeyBuildError> {
    bound_key(multi_col, parts)?
        .ok_or_else(|| InternalError::key_internal("key assembly produced no parts").into())
}

fn non_indexed_term() -> KeyBuildError {
    InternalError::key_internal("index term does not reference an indexed column of this source")
        .into()
}

fn malformed_branch(branch: &RangeBranch, reason: &str) -> KeyBuildError {
    crate::error::CompileError::MalformedRangeBranch {
        location: branch.location,
        reason: reason.to_string(),
    }
    .into()
}
