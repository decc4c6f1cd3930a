use crate::{
    access::{AccessInput, AccessMethod, BoundSource, IndexChoice, build_access},
    diagnostics::CompileTraceEvent,
    domain::ValueDomain,
    key::RangeKind,
    syntax::SyntaxNode,
    test_support::{fixtures, harness::Harness, tree},
    types::{AttributeId, IndexId},
};

fn harness() -> Harness {
    let mut harness = Harness::new(fixtures::catalog());
    harness.scope_table(1, &fixtures::table_t());
    harness.scope_table(2, &fixtures::table_s());

    harness
}

fn k_col() -> SyntaxNode {
    tree::column(1, "k", 2, ValueDomain::int())
}

fn z_col() -> SyntaxNode {
    tree::column(1, "z", 3, ValueDomain::int())
}

fn a_col() -> SyntaxNode {
    tree::column(1, "a", 1, ValueDomain::int())
}

#[test]
fn indexed_access_partitions_key_access_and_residual() {
    let mut harness = harness();
    let table = fixtures::table_t();
    let source = fixtures::table_source(1, &table);
    let bound = BoundSource::Table { table };

    let key_term = tree::eq(k_col(), tree::int(5));
    let access_term = tree::gt(z_col(), tree::int(3));
    let join_term = tree::eq(a_col(), tree::column(2, "x", 11, ValueDomain::int()));
    let choice = IndexChoice {
        index: IndexId(1),
        terms: vec![0],
    };

    let select = a_col();
    let input = AccessInput {
        source: &source,
        bound: &bound,
        conjuncts: vec![&key_term, &access_term, &join_term],
        join_residuals: vec![],
        rest_exprs: vec![&select],
        choice: Some(&choice),
    };

    let access = build_access(&mut harness.lowerer(), &input).expect("access builds");

    let AccessMethod::Indexed { index, key } = &access.method else {
        panic!("expected indexed access");
    };
    assert_eq!(*index, IndexId(1));
    assert_eq!(key.ranges[0].kind, RangeKind::Eq);

    // The three partitions are disjoint and cover every conjunct.
    assert!(access.key_filter.is_some());
    assert!(access.access_filter.is_some());
    assert!(access.residual_filter.is_some());

    assert_eq!(access.key_columns, vec![AttributeId(2)]);
    assert_eq!(access.filter_columns, vec![AttributeId(3)]);
    // Rest covers the select column and the join term's own-side column.
    assert_eq!(access.rest_columns, vec![AttributeId(1)]);
}

#[test]
fn sequential_access_still_partitions_filters() {
    let mut harness = harness();
    let table = fixtures::table_t();
    let source = fixtures::table_source(1, &table);
    let bound = BoundSource::Table { table };

    let access_term = tree::gt(z_col(), tree::int(3));
    let join_term = tree::eq(a_col(), tree::column(2, "x", 11, ValueDomain::int()));

    let input = AccessInput {
        source: &source,
        bound: &bound,
        conjuncts: vec![&access_term, &join_term],
        join_residuals: vec![],
        rest_exprs: vec![],
        choice: None,
    };

    let access = build_access(&mut harness.lowerer(), &input).expect("access builds");

    assert_eq!(access.method, AccessMethod::Sequential);
    assert!(access.key_filter.is_none());
    assert!(access.access_filter.is_some());
    assert!(access.residual_filter.is_some());
}

#[test]
fn key_mismatch_degrades_to_sequential_with_unsplit_residual() {
    let mut harness = harness();
    let table = fixtures::table_t();
    let source = fixtures::table_source(1, &table);
    let bound = BoundSource::Table { table };

    let bad_key = tree::eq(k_col(), tree::text("abc"));
    let access_term = tree::gt(z_col(), tree::int(3));
    let choice = IndexChoice {
        index: IndexId(1),
        terms: vec![0],
    };

    let input = AccessInput {
        source: &source,
        bound: &bound,
        conjuncts: vec![&bad_key, &access_term],
        join_residuals: vec![],
        rest_exprs: vec![],
        choice: Some(&choice),
    };

    let access = build_access(&mut harness.lowerer(), &input).expect("degraded access builds");

    assert_eq!(access.method, AccessMethod::Sequential);
    assert!(access.key_filter.is_none());
    assert!(access.access_filter.is_none());
    assert!(access.residual_filter.is_some());
    assert!(harness.ctx.take_events().iter().any(|event| matches!(
        event,
        CompileTraceEvent::IndexDegraded {
            index: IndexId(1),
            ..
        }
    )));
}

///
/// Partition property: for any conjunct set, the access/residual split is
/// conjunct-disjoint and covers the whole set, and only source-local
/// conjuncts reach the access stage.
///

mod partition_property {
    use super::*;
    use crate::{predicate::PredicateExpression, syntax::walk};
    use proptest::prelude::*;

    fn arb_conjunct() -> impl Strategy<Value = SyntaxNode> {
        let column = prop_oneof![
            Just(("k", 2u32, 1u32)),
            Just(("z", 3, 1)),
            Just(("a", 1, 1)),
            Just(("x", 11, 2)),
        ];

        (column, 0..3u8, -1000..1000i64).prop_map(|((name, attr, spec), op, value)| {
            let lhs = tree::column(spec, name, attr, ValueDomain::int());
            let rhs = tree::int(value);
            match op {
                0 => tree::eq(lhs, rhs),
                1 => tree::lt(lhs, rhs),
                _ => tree::gt(lhs, rhs),
            }
        })
    }

    // Simple comparisons lower to single comparisons, so the right-leaning
    // AND spine length counts conjuncts exactly.
    fn spine_len(pred: &PredicateExpression) -> usize {
        match pred {
            PredicateExpression::And(_, rest) => 1 + spine_len(rest),
            _ => 1,
        }
    }

    proptest! {
        #[test]
        fn split_is_disjoint_and_covering(
            conjuncts in prop::collection::vec(arb_conjunct(), 0..8)
        ) {
            let mut harness = harness();
            let table = fixtures::table_t();
            let source = fixtures::table_source(1, &table);
            let bound = BoundSource::Table { table };
            let refs: Vec<&SyntaxNode> = conjuncts.iter().collect();

            let input = AccessInput {
                source: &source,
                bound: &bound,
                conjuncts: refs.clone(),
                join_residuals: vec![],
                rest_exprs: vec![],
                choice: None,
            };
            let access = build_access(&mut harness.lowerer(), &input)
                .expect("sequential access always builds");

            let access_count = access.access_filter.as_ref().map_or(0, spine_len);
            let residual_count = access.residual_filter.as_ref().map_or(0, spine_len);
            prop_assert!(access.key_filter.is_none());
            prop_assert_eq!(access_count + residual_count, refs.len());

            let local = refs
                .iter()
                .filter(|&&conjunct| {
                    walk::profile(conjunct)
                        .specs
                        .iter()
                        .all(|spec| spec.0 == 1)
                })
                .count();
            prop_assert_eq!(access_count, local);
        }
    }
}

#[test]
fn subquery_conjuncts_never_join_the_access_filter() {
    let mut harness = harness();
    let table = fixtures::table_t();
    let source = fixtures::table_source(1, &table);
    let bound = BoundSource::Table {
        table: table.clone(),
    };

    let inner = fixtures::block(
        vec![fixtures::table_source(2, &fixtures::table_s())],
        None,
        vec![tree::int(1)],
    );
    let exists_term = tree::exists(tree::subquery(1, crate::syntax::QueryExpr::Block(inner)));

    let input = AccessInput {
        source: &source,
        bound: &bound,
        conjuncts: vec![&exists_term],
        join_residuals: vec![],
        rest_exprs: vec![],
        choice: None,
    };

    let access = build_access(&mut harness.lowerer(), &input).expect("access builds");

    assert!(access.access_filter.is_none());
    assert!(access.residual_filter.is_some());
}
