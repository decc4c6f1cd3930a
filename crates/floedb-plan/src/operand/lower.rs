use crate::{
    aggregate::AggregateBindings,
    assemble::{self, PlanHints},
    context::{BlockCells, CachedSubplan, CompilationContext, SubqueryRecord},
    diagnostics::CompileTraceEvent,
    error::{CompileError, ErrorClass, ErrorOrigin, InternalError},
    model::Catalog,
    operand::{
        ArithOp, ArithOperand, AttributeOperand, FunctionOperand, Operand, ParameterOperand,
        PseudoOperand, SubqueryOperand, TupleSlotOperand, UnboxMode, rules,
    },
    predicate,
    scope::ColumnBinding,
    syntax::{
        BinaryExpr, BinaryOp, CaseExpr, ParameterExpr, PathExpr, SubqueryExpr, SyntaxNode, UnaryOp,
    },
    value::Value,
};
use std::rc::Rc;

///
/// ExprLowerer
///
/// Carried state for one expression-lowering walk: the compilation arena,
/// the consumed collaborator interfaces, the aggregate redirection table
/// when lowering inside a grouping plan, and the owning block's shared
/// pseudo-column cells.
///

pub(crate) struct ExprLowerer<'a> {
    pub ctx: &'a mut CompilationContext,
    pub catalog: &'a dyn Catalog,
    pub hints: &'a PlanHints,
    pub aggregates: Option<&'a AggregateBindings>,
    pub cells: &'a BlockCells,
}

impl ExprLowerer<'_> {
    /// Lower one scalar expression into an operand.
    pub(crate) fn lower(
        &mut self,
        node: &SyntaxNode,
        unbox: UnboxMode,
    ) -> Result<Operand, CompileError> {
        self.lower_expected(node, unbox, None)
    }

    /// Lower with an expected domain from the surrounding context, used by
    /// parameter domain resolution.
    pub(crate) fn lower_expected(
        &mut self,
        node: &SyntaxNode,
        unbox: UnboxMode,
        expected: Option<crate::domain::ValueDomain>,
    ) -> Result<Operand, CompileError> {
        match node {
            SyntaxNode::Literal(literal) => {
                Ok(Operand::constant(literal.value.clone(), literal.domain))
            }
            SyntaxNode::ColumnRef(column) => {
                let resolved = self.ctx.resolve_column(column)?;
                let operand = match resolved.binding {
                    ColumnBinding::Attribute { spec, attribute } => {
                        Operand::Attribute(AttributeOperand {
                            spec,
                            attribute,
                            domain: resolved.domain,
                        })
                    }
                    ColumnBinding::TupleSlot { spec, position } => {
                        Operand::TupleSlot(TupleSlotOperand {
                            spec,
                            position,
                            domain: resolved.domain,
                        })
                    }
                };

                Ok(operand)
            }
            SyntaxNode::Parameter(param) => self.lower_parameter(param, expected),
            SyntaxNode::Unary(unary) => match unary.op {
                UnaryOp::Neg => {
                    let arg = self.lower(&unary.arg, UnboxMode::Value)?;
                    let domain = rules::arith_result(ArithOp::Neg, &[arg.domain()]);
                    Ok(Operand::Arith(ArithOperand {
                        op: ArithOp::Neg,
                        args: vec![arg],
                        pred: None,
                        domain,
                    }))
                }
                UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsNotNull | UnaryOp::Exists => {
                    self.lower_boolean_as_value(node)
                }
            },
            SyntaxNode::Binary(binary) => self.lower_binary(node, binary),
            SyntaxNode::Function(function) => {
                let mut args = Vec::with_capacity(function.args.len());
                for arg in &function.args {
                    args.push(self.lower(arg, UnboxMode::Value)?);
                }
                let mut domain = rules::function_result(function.kind, &function.args);
                if domain.is_generic() {
                    domain = function.domain;
                }

                Ok(Operand::Function(FunctionOperand {
                    kind: function.kind,
                    args,
                    domain,
                }))
            }
            SyntaxNode::Aggregate(aggregate) => {
                // Aggregate calls are only evaluable through the grouping
                // plan's accumulator cells; anywhere else they are a
                // contract violation.
                let Some(bindings) = self.aggregates else {
                    return Err(InternalError::aggregate_invariant(format!(
                        "aggregate call at {} outside its grouping plan",
                        aggregate.location
                    ))
                    .into());
                };
                let Some(binding) = bindings.get(aggregate.call) else {
                    return Err(InternalError::aggregate_invariant(format!(
                        "aggregate call {} has no accumulator binding",
                        aggregate.call
                    ))
                    .into());
                };

                Ok(Operand::TupleSlot(TupleSlotOperand {
                    spec: binding.spec,
                    position: binding.position,
                    domain: binding.domain,
                }))
            }
            SyntaxNode::Subquery(subquery) => self.lower_subquery(subquery, unbox),
            SyntaxNode::Case(case) => self.lower_case(case),
            SyntaxNode::Path(path) => self.lower_path(path),
            SyntaxNode::Pseudo(pseudo) => Ok(Operand::Pseudo(PseudoOperand {
                kind: pseudo.kind,
                cell: self.cells.cell_for(pseudo.kind),
                domain: crate::domain::ValueDomain::bigint(),
            })),
            SyntaxNode::Between(_)
            | SyntaxNode::InList(_)
            | SyntaxNode::Like(_)
            | SyntaxNode::Quantified(_)
            | SyntaxNode::RangeList(_) => self.lower_boolean_as_value(node),
        }
    }

    // Parameter domain precedence: explicit cast, then an already-bound
    // runtime value's domain, then the expected domain from context, then a
    // non-generic declared annotation.
    fn lower_parameter(
        &mut self,
        param: &ParameterExpr,
        expected: Option<crate::domain::ValueDomain>,
    ) -> Result<Operand, CompileError> {
        let declared = (!param.declared.is_generic()).then_some(param.declared);
        let domain = param
            .cast
            .or_else(|| self.ctx.parameter_domain(param.index))
            .or(expected)
            .or(declared)
            .ok_or_else(|| {
                InternalError::new(
                    ErrorClass::Internal,
                    ErrorOrigin::Expression,
                    format!("unresolved domain for parameter {}", param.index),
                )
            })?;

        self.ctx.note_parameter(param.index);

        Ok(Operand::Parameter(ParameterOperand {
            index: param.index,
            domain,
        }))
    }

    fn lower_binary(
        &mut self,
        node: &SyntaxNode,
        binary: &BinaryExpr,
    ) -> Result<Operand, CompileError> {
        let op = match binary.op {
            BinaryOp::Add => ArithOp::Add,
            BinaryOp::Sub => ArithOp::Sub,
            BinaryOp::Mul => ArithOp::Mul,
            BinaryOp::Div => ArithOp::Div,
            BinaryOp::Mod => ArithOp::Mod,
            BinaryOp::Concat => ArithOp::Concat,
            // Comparisons and logical connectives in scalar position are
            // evaluated through a guarded case selection.
            _ => return self.lower_boolean_as_value(node),
        };

        let left = self.lower(&binary.left, UnboxMode::Value)?;
        let right = self.lower(&binary.right, UnboxMode::Value)?;
        let domain = rules::arith_result(op, &[left.domain(), right.domain()]);

        Ok(Operand::Arith(ArithOperand {
            op,
            args: vec![left, right],
            pred: None,
            domain,
        }))
    }

    // Boolean expression consumed as a scalar value: lower the predicate
    // and select TRUE/FALSE through a guarded case operand.
    fn lower_boolean_as_value(&mut self, node: &SyntaxNode) -> Result<Operand, CompileError> {
        let lowered = predicate::lower_predicate(self, node)?;
        let domain = crate::domain::ValueDomain::boolean();

        Ok(Operand::Arith(ArithOperand {
            op: ArithOp::Case,
            args: vec![
                Operand::constant(Value::Bool(true), domain),
                Operand::constant(Value::Bool(false), domain),
            ],
            pred: Some(Box::new(lowered.pred)),
            domain,
        }))
    }

    fn lower_case(&mut self, case: &CaseExpr) -> Result<Operand, CompileError> {
        let mut acc = match &case.else_value {
            Some(else_value) => self.lower(else_value, UnboxMode::Value)?,
            None => Operand::constant(Value::Null, case.domain),
        };

        // Fold branches right-to-left so the first branch is the outermost
        // guard, preserving source evaluation order.
        for (cond, then) in case.branches.iter().rev() {
            let guard = predicate::lower_predicate(self, cond)?;
            let then = self.lower(then, UnboxMode::Value)?;
            acc = Operand::Arith(ArithOperand {
                op: ArithOp::Case,
                args: vec![then, acc],
                pred: Some(Box::new(guard.pred)),
                domain: case.domain,
            });
        }

        Ok(acc)
    }

    // A path step becomes a per-row fetch subplan: the anchor attribute
    // steers the fetch, the operand reads the fetched row's single output
    // slot.
    fn lower_path(&mut self, path: &PathExpr) -> Result<Operand, CompileError> {
        let target = self
            .catalog
            .attribute(path.target_table, path.target_attribute)?
            .clone();
        self.ctx.note_table(path.target_table);

        let fetch_spec = self.ctx.alloc_internal_spec();
        let anchor = Operand::Attribute(AttributeOperand {
            spec: path.spec,
            attribute: path.anchor_attribute,
            domain: crate::domain::ValueDomain::generic(),
        });
        // The fetched row is read under the fetch node's own spec.
        let output = Operand::Attribute(AttributeOperand {
            spec: fetch_spec,
            attribute: path.target_attribute,
            domain: target.domain,
        });
        let plan = Rc::new(crate::plan::PlanNode::fetch(
            fetch_spec,
            path.target_table,
            anchor,
            output,
        ));

        self.ctx.record_subquery(SubqueryRecord {
            id: None,
            plan: Rc::clone(&plan),
            level: 1,
            binding_specs: std::iter::once(path.spec).collect(),
        });

        Ok(Operand::TupleSlot(TupleSlotOperand {
            spec: fetch_spec,
            position: 0,
            domain: path.domain,
        }))
    }

    fn lower_subquery(
        &mut self,
        subquery: &SubqueryExpr,
        unbox: UnboxMode,
    ) -> Result<Operand, CompileError> {
        let (plan, level, binding_specs, single_row) =
            match self.ctx.lookup_subplan(subquery.id) {
                Some(cached) => {
                    self.ctx
                        .trace(CompileTraceEvent::SubplanCacheHit { id: subquery.id });
                    (
                        cached.plan,
                        cached.level,
                        cached.binding_specs,
                        cached.single_row,
                    )
                }
                None => {
                    self.ctx.begin_subquery();
                    let plan = assemble::compile_subquery(
                        self.ctx,
                        self.catalog,
                        self.hints,
                        &subquery.query,
                    )?;
                    let (level, binding_specs) = self.ctx.end_subquery()?;
                    let single_row = plan.is_single_row();
                    self.ctx.store_subplan(
                        subquery.id,
                        CachedSubplan {
                            plan: Rc::clone(&plan),
                            level,
                            binding_specs: binding_specs.clone(),
                            single_row,
                        },
                    );

                    (plan, level, binding_specs, single_row)
                }
            };

        // Correlation levels are monotonic: a revisit may only confirm or
        // lower the annotation, never raise it.
        match subquery.correlation.get() {
            None => subquery.correlation.set(Some(level)),
            Some(previous) if level > previous => {
                return Err(InternalError::correlation_invariant(format!(
                    "subquery {} level moved from {previous} to {level}",
                    subquery.id
                ))
                .into());
            }
            Some(_) => {}
        }

        self.ctx.record_subquery(SubqueryRecord {
            id: Some(subquery.id),
            plan: Rc::clone(&plan),
            level,
            binding_specs,
        });

        let unbox = if single_row { UnboxMode::Value } else { unbox };

        Ok(Operand::SubqueryResult(SubqueryOperand {
            plan,
            single_row,
            unbox,
            domain: subquery.result_domain,
        }))
    }
}
