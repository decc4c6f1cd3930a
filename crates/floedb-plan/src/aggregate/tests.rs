use crate::{
    aggregate::{AggregateSourceInfo, PlanShape, plan_aggregation},
    domain::ValueDomain,
    error::CompileError,
    model::TableModel,
    plan::OrderDirection,
    syntax::{AggregateKind, SyntaxNode},
    test_support::{fixtures, harness::Harness, tree},
    types::{IndexId, SpecId},
};

fn harness() -> (Harness, TableModel) {
    let mut harness = Harness::new(fixtures::catalog());
    let table = fixtures::table_t();
    harness.scope_table(1, &table);

    (harness, table)
}

fn a_col() -> SyntaxNode {
    tree::column(1, "a", 1, ValueDomain::int())
}

fn source_info(table: &TableModel) -> AggregateSourceInfo<'_> {
    AggregateSourceInfo {
        table: Some(table),
        predicate_free: true,
        has_or_or_quantified: false,
    }
}

#[test]
fn lone_count_star_selects_build_value() {
    let (mut harness, table) = harness();
    let select = vec![tree::count_star(0)];

    let plan = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &[],
        None,
        &source_info(&table),
    )
    .expect("aggregation plans")
    .expect("aggregation present");

    assert_eq!(plan.shape, PlanShape::BuildValue);
    assert!(plan.group.is_none());
    assert_eq!(plan.aggregates.len(), 1);
    // COUNT(*) over an unconstrained table may short-circuit via an index.
    assert_eq!(plan.aggregates[0].index_hint, Some(IndexId(1)));
}

#[test]
fn grouped_select_builds_a_list_with_a_stable_sort() {
    let (mut harness, table) = harness();
    let select = vec![a_col(), tree::count_star(0)];
    let group_by = vec![a_col()];

    let plan = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &group_by,
        None,
        &source_info(&table),
    )
    .expect("aggregation plans")
    .expect("aggregation present");

    assert_eq!(plan.shape, PlanShape::BuildList);
    let group = plan.group.expect("group spec");
    assert_eq!(group.keys.len(), 1);
    assert_eq!(group.keys[0].position, 0);
    assert_eq!(group.keys[0].direction, OrderDirection::Asc);
    assert!(plan.hidden_outputs.is_empty());
}

#[test]
fn hidden_group_keys_extend_the_output_row() {
    let (mut harness, table) = harness();
    let select = vec![tree::count_star(0)];
    let group_by = vec![a_col()];

    let plan = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &group_by,
        None,
        &source_info(&table),
    )
    .expect("aggregation plans")
    .expect("aggregation present");

    // Layout: [count] [hidden a] [accumulator]; the group key points past
    // the select items.
    assert_eq!(plan.hidden_outputs.len(), 1);
    assert_eq!(plan.group.expect("group spec").keys[0].position, 1);
    assert_eq!(plan.aggregates[0].output_position, 2);
}

#[test]
fn min_hint_requires_a_leading_index_column() {
    let (mut harness, table) = harness();
    let min_k = tree::aggregate(
        0,
        AggregateKind::Min,
        tree::column(1, "k", 2, ValueDomain::int()),
    );
    let min_z = tree::aggregate(
        1,
        AggregateKind::Min,
        tree::column(1, "z", 3, ValueDomain::int()),
    );
    let select = vec![min_k, min_z];

    let plan = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &[],
        None,
        &source_info(&table),
    )
    .expect("aggregation plans")
    .expect("aggregation present");

    assert_eq!(plan.aggregates[0].index_hint, Some(IndexId(1)));
    assert_eq!(plan.aggregates[1].index_hint, None);
}

#[test]
fn predicates_disable_the_index_hint() {
    let (mut harness, table) = harness();
    let select = vec![tree::count_star(0)];
    let info = AggregateSourceInfo {
        table: Some(&table),
        predicate_free: false,
        has_or_or_quantified: false,
    };

    let plan = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &[],
        None,
        &info,
    )
    .expect("aggregation plans")
    .expect("aggregation present");

    assert_eq!(plan.aggregates[0].index_hint, None);
}

#[test]
fn nested_aggregates_are_rejected() {
    let (mut harness, table) = harness();
    let nested = tree::aggregate(
        0,
        AggregateKind::Sum,
        tree::aggregate(1, AggregateKind::Max, a_col()),
    );
    let select = vec![nested];

    let err = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &[],
        None,
        &source_info(&table),
    )
    .expect_err("nested aggregate");

    assert!(matches!(err, CompileError::Internal(_)));
}

#[test]
fn having_splits_on_group_position_references() {
    let (mut harness, table) = harness();
    let select = vec![a_col(), tree::count_star(0)];
    let group_by = vec![a_col()];
    let having = tree::and(
        tree::gt(tree::count_star(0), tree::int(1)),
        tree::lt(tree::group_position(), tree::int(10)),
    );

    let plan = plan_aggregation(
        &mut harness.ctx,
        &harness.catalog,
        &harness.hints,
        &harness.cells,
        SpecId(100),
        &select,
        &group_by,
        Some(&having),
        &source_info(&table),
    )
    .expect("aggregation plans")
    .expect("aggregation present");

    assert!(plan.having.is_some());
    let activation = plan.group_activation.expect("group activation");
    // A bare upper bound terminates grouping early.
    assert!(!activation.scan_continue);
}
