use crate::{
    domain::{DomainKind, ValueDomain},
    error::CompileError,
    operand::{ArithOp, Operand, UnboxMode},
    syntax::{BinaryExpr, BinaryOp, CaseExpr, ParameterExpr, PseudoColumnKind, SyntaxNode},
    test_support::{fixtures, harness::Harness, tree},
    types::{AttributeId, ParameterIndex, SourceLocation, SpecId},
    value::Value,
};

fn harness() -> Harness {
    let mut harness = Harness::new(fixtures::catalog());
    harness.scope_table(1, &fixtures::table_t());
    harness.scope_table(2, &fixtures::table_s());

    harness
}

#[test]
fn literal_lowers_to_constant() {
    let mut harness = harness();
    let operand = harness
        .lowerer()
        .lower(&tree::int(42), UnboxMode::Value)
        .expect("literal lowers");

    let Operand::Constant(constant) = operand else {
        panic!("expected constant");
    };
    assert_eq!(constant.value, Value::Int(42));
    assert_eq!(constant.domain.kind, DomainKind::BigInt);
}

#[test]
fn table_column_lowers_to_attribute_ref() {
    let mut harness = harness();
    let column = tree::column(1, "k", 2, ValueDomain::int());
    let operand = harness
        .lowerer()
        .lower(&column, UnboxMode::Value)
        .expect("column lowers");

    let Operand::Attribute(attr) = operand else {
        panic!("expected attribute ref");
    };
    assert_eq!(attr.spec, SpecId(1));
    assert_eq!(attr.attribute, AttributeId(2));
}

#[test]
fn unknown_spec_is_an_engine_fault() {
    let mut harness = harness();
    let column = tree::column_n(99, "ghost");
    let err = harness
        .lowerer()
        .lower(&column, UnboxMode::Value)
        .expect_err("unbound spec");

    assert!(matches!(err, CompileError::Internal(_)));
}

#[test]
fn parameter_cast_wins_over_every_other_source() {
    let mut harness = harness();
    harness
        .ctx
        .bind_parameter_domains(vec![Some(ValueDomain::int())]);

    let param = SyntaxNode::Parameter(ParameterExpr {
        index: ParameterIndex(0),
        cast: Some(ValueDomain::date()),
        declared: ValueDomain::double(),
        location: SourceLocation::default(),
    });
    let operand = harness
        .lowerer()
        .lower_expected(&param, UnboxMode::Value, Some(ValueDomain::boolean()))
        .expect("parameter lowers");

    assert_eq!(operand.domain(), ValueDomain::date());
}

#[test]
fn parameter_falls_back_to_bound_then_expected() {
    let mut harness = harness();
    harness
        .ctx
        .bind_parameter_domains(vec![Some(ValueDomain::int())]);

    let bound = harness
        .lowerer()
        .lower_expected(&tree::param(0), UnboxMode::Value, Some(ValueDomain::date()))
        .expect("bound parameter lowers");
    assert_eq!(bound.domain(), ValueDomain::int());

    let expected = harness
        .lowerer()
        .lower_expected(&tree::param(1), UnboxMode::Value, Some(ValueDomain::date()))
        .expect("expected-domain parameter lowers");
    assert_eq!(expected.domain(), ValueDomain::date());
}

#[test]
fn parameter_without_any_domain_is_an_engine_fault() {
    let mut harness = harness();
    let err = harness
        .lowerer()
        .lower(&tree::param(3), UnboxMode::Value)
        .expect_err("unresolved parameter domain");

    assert!(matches!(err, CompileError::Internal(_)));
}

#[test]
fn parameter_lowering_tracks_the_maximum_index() {
    let mut harness = harness();
    harness
        .lowerer()
        .lower_expected(&tree::param(7), UnboxMode::Value, Some(ValueDomain::int()))
        .expect("parameter lowers");
    harness
        .lowerer()
        .lower_expected(&tree::param(2), UnboxMode::Value, Some(ValueDomain::int()))
        .expect("parameter lowers");

    assert_eq!(harness.ctx.max_parameter(), Some(ParameterIndex(7)));
}

#[test]
fn arithmetic_widens_per_operator_rules() {
    let mut harness = harness();
    let expr = SyntaxNode::Binary(BinaryExpr {
        op: BinaryOp::Add,
        left: Box::new(tree::int(1)),
        right: Box::new(tree::int(2)),
        domain: ValueDomain::bigint(),
        location: SourceLocation::default(),
    });
    let operand = harness
        .lowerer()
        .lower(&expr, UnboxMode::Value)
        .expect("arith lowers");

    let Operand::Arith(arith) = operand else {
        panic!("expected arith");
    };
    assert_eq!(arith.op, ArithOp::Add);
    assert_eq!(arith.args.len(), 2);
    assert_eq!(arith.domain.kind, DomainKind::BigInt);
}

#[test]
fn aggregate_outside_grouping_plan_is_rejected() {
    let mut harness = harness();
    let err = harness
        .lowerer()
        .lower(&tree::count_star(0), UnboxMode::Value)
        .expect_err("aggregate outside grouping context");

    assert!(matches!(err, CompileError::Internal(_)));
}

#[test]
fn case_folds_branches_into_guarded_selection() {
    let mut harness = harness();
    let case = SyntaxNode::Case(CaseExpr {
        branches: vec![(
            tree::eq(tree::column(1, "a", 1, ValueDomain::int()), tree::int(1)),
            tree::int(10),
        )],
        else_value: Some(Box::new(tree::int(20))),
        domain: ValueDomain::bigint(),
        location: SourceLocation::default(),
    });
    let operand = harness
        .lowerer()
        .lower(&case, UnboxMode::Value)
        .expect("case lowers");

    let Operand::Arith(arith) = operand else {
        panic!("expected case arith");
    };
    assert_eq!(arith.op, ArithOp::Case);
    assert!(arith.pred.is_some());
    assert_eq!(arith.args.len(), 2);
}

#[test]
fn path_expression_becomes_a_per_row_fetch() {
    use crate::{plan::PlanBody, syntax::PathExpr, types::TableId};

    let mut harness = harness();
    let path = SyntaxNode::Path(PathExpr {
        spec: SpecId(1),
        anchor_attribute: AttributeId(1),
        target_table: TableId(2),
        target_attribute: AttributeId(12),
        domain: ValueDomain::int(),
        location: SourceLocation::default(),
    });
    let operand = harness
        .lowerer()
        .lower(&path, UnboxMode::Value)
        .expect("path lowers");

    let Operand::TupleSlot(slot) = operand else {
        panic!("expected tuple slot over the fetch output");
    };
    assert_eq!(slot.position, 0);

    let records = harness.ctx.drain_subqueries(0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, 1);
    assert!(records[0].binding_specs.contains(&SpecId(1)));
    assert!(matches!(records[0].plan.body, PlanBody::Fetch(_)));
    assert!(harness.ctx.referenced_tables().contains(&TableId(2)));
}

#[test]
fn pseudo_column_shares_the_block_cell() {
    let mut harness = harness();
    let first = harness
        .lowerer()
        .lower(&tree::row_number(), UnboxMode::Value)
        .expect("pseudo lowers");
    let second = harness
        .lowerer()
        .lower(&tree::row_number(), UnboxMode::Value)
        .expect("pseudo lowers");

    let (Operand::Pseudo(first), Operand::Pseudo(second)) = (first, second) else {
        panic!("expected pseudo operands");
    };
    assert_eq!(first.cell, second.cell);
    assert!(
        harness
            .cells
            .cell_if_used(PseudoColumnKind::RowNumber)
            .is_some()
    );
    assert!(
        harness
            .cells
            .cell_if_used(PseudoColumnKind::OrderPosition)
            .is_none()
    );
}
