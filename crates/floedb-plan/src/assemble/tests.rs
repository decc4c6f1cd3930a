use crate::{
    access::{AccessMethod, IndexChoice},
    assemble::{DmlStatement, PlanHints, compile_statement, compile_update},
    context::CompileLimits,
    diagnostics::CompileTraceEvent,
    domain::ValueDomain,
    error::CompileError,
    key::RangeKind,
    operand::Operand,
    plan::{PlanBody, fingerprint},
    syntax::{OrderItem, QueryExpr, SetOpExpr, SetOpKind, Statement, SyntaxNode},
    test_support::{fixtures, tree},
    types::{AttributeId, IndexId, SourceLocation, SpecId, TableId},
    value::Value,
};
use std::rc::Rc;

fn hints_with_index(spec: u32, index: u32, terms: Vec<usize>) -> PlanHints {
    let mut hints = PlanHints::default();
    hints.access.insert(
        SpecId(spec),
        IndexChoice {
            index: IndexId(index),
            terms,
        },
    );

    hints
}

fn compile(statement: &Statement, hints: &PlanHints) -> crate::plan::CompiledStatement {
    compile_statement(
        &fixtures::catalog(),
        statement,
        hints,
        Vec::new(),
        CompileLimits::default(),
    )
    .expect("statement compiles")
}

fn a_col() -> SyntaxNode {
    tree::column(1, "a", 1, ValueDomain::int())
}

fn k_col() -> SyntaxNode {
    tree::column(1, "k", 2, ValueDomain::int())
}

fn z_col() -> SyntaxNode {
    tree::column(1, "z", 3, ValueDomain::int())
}

#[test]
fn equality_over_an_indexed_column_scans_by_key() {
    // SELECT a FROM t WHERE k = 5, index chosen on k.
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        Some(tree::eq(k_col(), tree::int(5))),
        vec![a_col()],
    );
    let compiled = compile(&fixtures::statement(block), &hints_with_index(1, 1, vec![0]));

    let access = &compiled.root.access[0];
    let AccessMethod::Indexed { index, key } = &access.method else {
        panic!("expected indexed access");
    };
    assert_eq!(*index, IndexId(1));
    assert_eq!(key.ranges.len(), 1);
    assert_eq!(key.ranges[0].kind, RangeKind::Eq);
    let Some(Operand::Constant(constant)) = &key.ranges[0].lower else {
        panic!("expected constant key");
    };
    assert_eq!(constant.value, Value::Int(5));
    assert_eq!(compiled.referenced_tables, vec![TableId(1)]);
}

#[test]
fn range_plus_filter_splits_between_key_and_access() {
    // SELECT a FROM t WHERE k BETWEEN 1 AND 10 AND z > 3, index on k only.
    let filter = tree::and(
        tree::between(k_col(), tree::int(1), tree::int(10)),
        tree::gt(z_col(), tree::int(3)),
    );
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        Some(filter),
        vec![a_col()],
    );
    let compiled = compile(&fixtures::statement(block), &hints_with_index(1, 1, vec![0]));

    let access = &compiled.root.access[0];
    let AccessMethod::Indexed { key, .. } = &access.method else {
        panic!("expected indexed access");
    };
    assert_eq!(key.ranges[0].kind, RangeKind::GeLe);
    assert!(access.key_filter.is_some());
    assert!(access.access_filter.is_some(), "z > 3 stays on the access stage");
    assert!(access.residual_filter.is_none());
}

#[test]
fn correlated_exists_lands_on_the_dependent_pointer_list() {
    // SELECT a FROM t WHERE EXISTS (SELECT 1 FROM s WHERE s.x = t.a).
    let inner = fixtures::block(
        vec![fixtures::table_source(2, &fixtures::table_s())],
        Some(tree::eq(
            tree::column(2, "x", 11, ValueDomain::int()),
            a_col(),
        )),
        vec![tree::int(1)],
    );
    let subquery = tree::subquery(7, QueryExpr::Block(inner));
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        Some(tree::exists(subquery)),
        vec![a_col()],
    );
    let statement = fixtures::statement(block);
    let compiled = compile(&statement, &PlanHints::default());

    // The annotation slot on the input tree now carries the level.
    let QueryExpr::Block(outer) = &statement.query else {
        unreachable!();
    };
    let Some(SyntaxNode::Unary(exists)) = outer.filter.as_ref() else {
        panic!("expected EXISTS filter");
    };
    let SyntaxNode::Subquery(subquery_node) = exists.arg.as_ref() else {
        panic!("expected subquery argument");
    };
    assert_eq!(subquery_node.correlation.get(), Some(1));
    assert_eq!(compiled.root.dependent_pointers.len(), 1);
    assert!(compiled.root.access_pointers.is_empty());
    assert_eq!(compiled.referenced_tables, vec![TableId(1), TableId(2)]);
}

#[test]
fn uncorrelated_subquery_lands_on_the_access_pointer_list() {
    // SELECT a FROM t WHERE k = (SELECT MAX(x)-ish constant FROM s).
    let inner = fixtures::block(
        vec![fixtures::table_source(2, &fixtures::table_s())],
        None,
        vec![tree::column(2, "x", 11, ValueDomain::int())],
    );
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        Some(tree::eq(k_col(), tree::subquery(9, QueryExpr::Block(inner)))),
        vec![a_col()],
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    assert_eq!(compiled.root.access_pointers.len(), 1);
    assert!(compiled.root.dependent_pointers.is_empty());
}

#[test]
fn identical_subquery_identities_reuse_one_subplan() {
    let inner = fixtures::block(
        vec![fixtures::table_source(2, &fixtures::table_s())],
        None,
        vec![tree::column(2, "x", 11, ValueDomain::int())],
    );
    let first = tree::subquery(7, QueryExpr::Block(inner));
    let second = first.clone();

    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        None,
        vec![a_col(), first, second],
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    assert!(
        compiled
            .diagnostics
            .events
            .iter()
            .any(|event| matches!(event, CompileTraceEvent::SubplanCacheHit { .. }))
    );
    assert_eq!(compiled.root.access_pointers.len(), 1);

    let subplans: Vec<_> = compiled
        .root
        .output
        .iter()
        .filter_map(|operand| match operand {
            Operand::SubqueryResult(subquery) => Some(Rc::clone(&subquery.plan)),
            _ => None,
        })
        .collect();
    assert_eq!(subplans.len(), 2);
    assert!(Rc::ptr_eq(&subplans[0], &subplans[1]));
}

#[test]
fn lone_count_star_compiles_to_build_value() {
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        None,
        vec![tree::count_star(0)],
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    assert!(matches!(compiled.root.body, PlanBody::BuildValue));
    assert!(compiled.root.is_single_row());
    assert_eq!(compiled.root.aggregates.len(), 1);
}

#[test]
fn grouped_select_compiles_to_build_list_with_group_keys() {
    let block = fixtures::grouped_block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        None,
        vec![a_col(), tree::count_star(0)],
        vec![a_col()],
        None,
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    assert!(matches!(compiled.root.body, PlanBody::BuildList));
    let group = compiled.root.group.as_ref().expect("group spec");
    assert_eq!(group.keys[0].position, 0);
}

#[test]
fn row_number_predicate_becomes_an_activation() {
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        Some(tree::lt(tree::row_number(), tree::int(10))),
        vec![a_col()],
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    let activation = compiled.root.row_activation.as_ref().expect("activation");
    assert!(!activation.scan_continue);
    assert!(compiled.root.cells.row_number.is_some());
    // The activation never reaches the source's filters.
    let access = &compiled.root.access[0];
    assert!(access.access_filter.is_none());
    assert!(access.residual_filter.is_none());
}

#[test]
fn ordering_hint_suppresses_the_sort_step() {
    let order = vec![OrderItem {
        position: 0,
        descending: false,
    }];
    let block = fixtures::ordered_block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        vec![a_col()],
        order.clone(),
    );

    let plain = compile(&fixtures::statement(block.clone()), &PlanHints::default());
    assert!(plain.root.order.is_some());

    let mut hints = PlanHints::default();
    hints.order_covered.insert(SpecId(1));
    let suppressed = compile(&fixtures::statement(block), &hints);
    assert!(suppressed.root.order.is_none());
    assert!(
        suppressed
            .diagnostics
            .events
            .iter()
            .any(|event| matches!(event, CompileTraceEvent::SortSuppressed { spec: SpecId(1) }))
    );
}

#[test]
fn join_sources_chain_as_sibling_scans() {
    // SELECT a FROM t, s WHERE t.a = s.x.
    let join = tree::eq(a_col(), tree::column(2, "x", 11, ValueDomain::int()));
    let block = fixtures::block(
        vec![
            fixtures::table_source(1, &fixtures::table_t()),
            fixtures::table_source(2, &fixtures::table_s()),
        ],
        Some(join),
        vec![a_col()],
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    assert_eq!(compiled.root.scan_chain.len(), 1);
    let chained = &compiled.root.scan_chain[0];
    assert!(matches!(chained.body, PlanBody::Scan));
    // The join term waits at the last source completing its references.
    assert!(chained.access[0].residual_filter.is_some());
    assert!(compiled.root.access[0].residual_filter.is_none());
}

#[test]
fn set_operands_must_agree_on_width() {
    let left = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        None,
        vec![a_col()],
    );
    let right = fixtures::block(
        vec![fixtures::table_source(2, &fixtures::table_s())],
        None,
        vec![
            tree::column(2, "x", 11, ValueDomain::int()),
            tree::column(2, "y", 12, ValueDomain::int()),
        ],
    );
    let statement = Statement {
        query: QueryExpr::SetOp(SetOpExpr {
            op: SetOpKind::Union,
            all: false,
            left: Box::new(QueryExpr::Block(left)),
            right: Box::new(QueryExpr::Block(right)),
            order_by: Vec::new(),
            location: SourceLocation::default(),
        }),
    };

    let err = compile_statement(
        &fixtures::catalog(),
        &statement,
        &PlanHints::default(),
        Vec::new(),
        CompileLimits::default(),
    )
    .expect_err("arity mismatch");

    assert!(matches!(err, CompileError::SetOperandArityMismatch { .. }));
}

#[test]
fn union_distinct_orders_every_output_column() {
    let left = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        None,
        vec![a_col(), k_col()],
    );
    let right = fixtures::block(
        vec![fixtures::table_source(2, &fixtures::table_s())],
        None,
        vec![
            tree::column(2, "x", 11, ValueDomain::int()),
            tree::column(2, "y", 12, ValueDomain::int()),
        ],
    );
    let statement = Statement {
        query: QueryExpr::SetOp(SetOpExpr {
            op: SetOpKind::Union,
            all: false,
            left: Box::new(QueryExpr::Block(left)),
            right: Box::new(QueryExpr::Block(right)),
            order_by: Vec::new(),
            location: SourceLocation::default(),
        }),
    };
    let compiled = compile_statement(
        &fixtures::catalog(),
        &statement,
        &PlanHints::default(),
        Vec::new(),
        CompileLimits::default(),
    )
    .expect("set op compiles");

    assert!(matches!(compiled.root.body, PlanBody::SetOp(_)));
    assert_eq!(compiled.root.order.as_ref().expect("order").keys.len(), 2);
}

#[test]
fn compilation_is_idempotent_modulo_arena_ids() {
    let make = || {
        let filter = tree::and(
            tree::between(k_col(), tree::int(1), tree::int(10)),
            tree::gt(z_col(), tree::int(3)),
        );
        fixtures::statement(fixtures::block(
            vec![fixtures::table_source(1, &fixtures::table_t())],
            Some(filter),
            vec![a_col()],
        ))
    };
    let hints = hints_with_index(1, 1, vec![0]);

    let first = compile(&make(), &hints);
    let second = compile(&make(), &hints);

    assert_eq!(
        fingerprint(&first.root),
        fingerprint(&second.root),
        "fresh arenas must produce structurally identical plans"
    );
    assert_eq!(first.diagnostics.fingerprint, second.diagnostics.fingerprint);
}

#[test]
fn update_wrapper_owns_its_select_core() {
    let statement = DmlStatement {
        target: TableId(1),
        assignments: vec![(AttributeId(3), 0)],
        query: QueryExpr::Block(fixtures::block(
            vec![fixtures::table_source(1, &fixtures::table_t())],
            Some(tree::eq(k_col(), tree::int(5))),
            vec![a_col()],
        )),
    };
    let compiled = compile_update(
        &fixtures::catalog(),
        &statement,
        &PlanHints::default(),
        CompileLimits::default(),
    )
    .expect("update compiles");

    let PlanBody::Update(dml) = &compiled.root.body else {
        panic!("expected update body");
    };
    assert_eq!(dml.table, TableId(1));
    assert_eq!(dml.assignments.len(), 1);
    assert_eq!(dml.savepoint, "sp-1");
    assert_eq!(compiled.root.access_pointers.len(), 1);
    assert!(compiled.root.is_root);
}

#[test]
fn max_parameter_index_is_reported() {
    let filter = tree::and(
        tree::eq(k_col(), tree::param(2)),
        tree::gt(z_col(), tree::param(0)),
    );
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        Some(filter),
        vec![a_col()],
    );
    let compiled = compile(&fixtures::statement(block), &PlanHints::default());

    assert_eq!(
        compiled.max_parameter_index,
        Some(crate::types::ParameterIndex(2))
    );
}

#[test]
fn nesting_limit_aborts_compilation() {
    let block = fixtures::block(
        vec![fixtures::table_source(1, &fixtures::table_t())],
        None,
        vec![a_col()],
    );
    let err = compile_statement(
        &fixtures::catalog(),
        &fixtures::statement(block),
        &PlanHints::default(),
        Vec::new(),
        CompileLimits {
            max_nesting_depth: 0,
            ..CompileLimits::default()
        },
    )
    .expect_err("zero nesting allowance");

    assert!(matches!(err, CompileError::Internal(_)));
}
