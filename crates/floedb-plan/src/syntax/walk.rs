use crate::{
    syntax::node::{AggregateExpr, BinaryOp, PseudoColumnKind, SyntaxNode},
    types::SpecId,
};
use std::collections::BTreeSet;

///
/// Leaf walks
///
/// Pre-order traversals over one expression tree. Subquery nodes are
/// visited but never entered: a subquery's body belongs to its own scope
/// and is examined when that scope compiles.
///

pub(crate) fn walk_exprs<'a>(node: &'a SyntaxNode, visit: &mut impl FnMut(&'a SyntaxNode)) {
    visit(node);

    match node {
        SyntaxNode::Literal(_)
        | SyntaxNode::ColumnRef(_)
        | SyntaxNode::Parameter(_)
        | SyntaxNode::Path(_)
        | SyntaxNode::Pseudo(_)
        | SyntaxNode::Subquery(_) => {}
        SyntaxNode::Unary(inner) => walk_exprs(&inner.arg, visit),
        SyntaxNode::Binary(inner) => {
            walk_exprs(&inner.left, visit);
            walk_exprs(&inner.right, visit);
        }
        SyntaxNode::Function(inner) => {
            for arg in &inner.args {
                walk_exprs(arg, visit);
            }
        }
        SyntaxNode::Aggregate(inner) => {
            if let Some(arg) = &inner.arg {
                walk_exprs(arg, visit);
            }
        }
        SyntaxNode::Case(inner) => {
            for (cond, then) in &inner.branches {
                walk_exprs(cond, visit);
                walk_exprs(then, visit);
            }
            if let Some(else_value) = &inner.else_value {
                walk_exprs(else_value, visit);
            }
        }
        SyntaxNode::Between(inner) => {
            walk_exprs(&inner.subject, visit);
            walk_exprs(&inner.lower, visit);
            walk_exprs(&inner.upper, visit);
        }
        SyntaxNode::InList(inner) => {
            walk_exprs(&inner.subject, visit);
            for element in &inner.elements {
                walk_exprs(element, visit);
            }
        }
        SyntaxNode::Like(inner) => {
            walk_exprs(&inner.subject, visit);
            walk_exprs(&inner.pattern, visit);
            if let Some(escape) = &inner.escape {
                walk_exprs(escape, visit);
            }
        }
        SyntaxNode::Quantified(inner) => {
            walk_exprs(&inner.subject, visit);
            walk_exprs(&inner.set, visit);
        }
        SyntaxNode::RangeList(inner) => {
            walk_exprs(&inner.subject, visit);
            for branch in &inner.branches {
                if let Some(lower) = &branch.lower {
                    walk_exprs(lower, visit);
                }
                if let Some(upper) = &branch.upper {
                    walk_exprs(upper, visit);
                }
            }
        }
    }
}

/// Split a filter condition into its top-level AND conjuncts, preserving
/// left-to-right source order.
pub(crate) fn flatten_conjuncts(node: &SyntaxNode) -> Vec<&SyntaxNode> {
    let mut out = Vec::new();
    push_conjuncts(node, &mut out);

    out
}

fn push_conjuncts<'a>(node: &'a SyntaxNode, out: &mut Vec<&'a SyntaxNode>) {
    match node {
        SyntaxNode::Binary(inner) if inner.op == BinaryOp::And => {
            push_conjuncts(&inner.left, out);
            push_conjuncts(&inner.right, out);
        }
        other => out.push(other),
    }
}

///
/// ConjunctProfile
///
/// Leaf census of one conjunct, driving access/residual classification:
/// which row sources it touches, and whether it contains constructs that
/// disqualify it from source-local evaluation.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ConjunctProfile {
    pub specs: BTreeSet<SpecId>,
    pub has_subquery: bool,
    pub has_row_number: bool,
    pub has_pseudo: bool,
}

pub(crate) fn profile(node: &SyntaxNode) -> ConjunctProfile {
    let mut out = ConjunctProfile::default();

    walk_exprs(node, &mut |leaf| match leaf {
        SyntaxNode::ColumnRef(column) => {
            out.specs.insert(column.spec);
        }
        SyntaxNode::Path(path) => {
            out.specs.insert(path.spec);
        }
        SyntaxNode::Subquery(_) => out.has_subquery = true,
        SyntaxNode::Pseudo(pseudo) => {
            out.has_pseudo = true;
            if pseudo.kind == PseudoColumnKind::RowNumber {
                out.has_row_number = true;
            }
        }
        _ => {}
    });

    out
}

/// Collect the aggregate calls directly contained in one expression,
/// in traversal order.
pub(crate) fn collect_aggregates<'a>(node: &'a SyntaxNode, out: &mut Vec<&'a AggregateExpr>) {
    walk_exprs(node, &mut |leaf| {
        if let SyntaxNode::Aggregate(aggregate) = leaf {
            out.push(aggregate);
        }
    });
}

pub(crate) fn contains_aggregate(node: &SyntaxNode) -> bool {
    let mut found = false;
    walk_exprs(node, &mut |leaf| {
        if matches!(leaf, SyntaxNode::Aggregate(_)) {
            found = true;
        }
    });

    found
}

/// Whether a select list is provably single-row: every row-dependent leaf
/// occurs inside an aggregate argument.
pub(crate) fn select_is_single_row(items: &[SyntaxNode]) -> bool {
    items.iter().all(|item| !has_bare_row_reference(item, false))
}

fn has_bare_row_reference(node: &SyntaxNode, inside_aggregate: bool) -> bool {
    match node {
        SyntaxNode::ColumnRef(_) | SyntaxNode::Path(_) | SyntaxNode::Pseudo(_) => {
            !inside_aggregate
        }
        SyntaxNode::Literal(_) | SyntaxNode::Parameter(_) | SyntaxNode::Subquery(_) => false,
        SyntaxNode::Aggregate(inner) => inner
            .arg
            .as_deref()
            .is_some_and(|arg| has_bare_row_reference(arg, true)),
        SyntaxNode::Unary(inner) => has_bare_row_reference(&inner.arg, inside_aggregate),
        SyntaxNode::Binary(inner) => {
            has_bare_row_reference(&inner.left, inside_aggregate)
                || has_bare_row_reference(&inner.right, inside_aggregate)
        }
        SyntaxNode::Function(inner) => inner
            .args
            .iter()
            .any(|arg| has_bare_row_reference(arg, inside_aggregate)),
        SyntaxNode::Case(inner) => {
            inner.branches.iter().any(|(cond, then)| {
                has_bare_row_reference(cond, inside_aggregate)
                    || has_bare_row_reference(then, inside_aggregate)
            }) || inner
                .else_value
                .as_deref()
                .is_some_and(|value| has_bare_row_reference(value, inside_aggregate))
        }
        SyntaxNode::Between(inner) => {
            has_bare_row_reference(&inner.subject, inside_aggregate)
                || has_bare_row_reference(&inner.lower, inside_aggregate)
                || has_bare_row_reference(&inner.upper, inside_aggregate)
        }
        SyntaxNode::InList(inner) => {
            has_bare_row_reference(&inner.subject, inside_aggregate)
                || inner
                    .elements
                    .iter()
                    .any(|element| has_bare_row_reference(element, inside_aggregate))
        }
        SyntaxNode::Like(inner) => {
            has_bare_row_reference(&inner.subject, inside_aggregate)
                || has_bare_row_reference(&inner.pattern, inside_aggregate)
        }
        SyntaxNode::Quantified(inner) => {
            has_bare_row_reference(&inner.subject, inside_aggregate)
                || has_bare_row_reference(&inner.set, inside_aggregate)
        }
        SyntaxNode::RangeList(inner) => has_bare_row_reference(&inner.subject, inside_aggregate),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tree;

    #[test]
    fn conjunct_flattening_preserves_order() {
        let filter = tree::and(
            tree::and(
                tree::eq(tree::column_n(1, "a"), tree::int(1)),
                tree::eq(tree::column_n(1, "b"), tree::int(2)),
            ),
            tree::eq(tree::column_n(2, "c"), tree::int(3)),
        );

        let conjuncts = flatten_conjuncts(&filter);

        assert_eq!(conjuncts.len(), 3);
        let specs: Vec<_> = conjuncts
            .iter()
            .map(|&conjunct| profile(conjunct).specs.into_iter().collect::<Vec<_>>())
            .collect();
        assert_eq!(specs, vec![vec![SpecId(1)], vec![SpecId(1)], vec![SpecId(2)]]);
    }

    #[test]
    fn profile_flags_row_number_references() {
        let conjunct = tree::lt(tree::row_number(), tree::int(10));
        let profile = profile(&conjunct);

        assert!(profile.has_row_number);
        assert!(profile.specs.is_empty());
    }

    #[test]
    fn single_row_detection_allows_aggregate_interiors() {
        let count = tree::count_star(0);
        let mixed = vec![count.clone(), tree::column_n(1, "a")];

        assert!(select_is_single_row(&[count]));
        assert!(!select_is_single_row(&mixed));
    }
}
