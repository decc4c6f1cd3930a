use crate::{
    domain::ValueDomain,
    error::CompileError,
    operand::{ExprLowerer, Operand, UnboxMode},
    predicate::{
        ComparisonOp, ComparisonPred, LoweredPredicate, PatternPred, PredicateExpression,
        QuantifiedPred,
    },
    syntax::{
        BinaryOp, CompareOp, FunctionKind, Quantifier, RangeBranch, RangeBranchOp, SyntaxNode,
        UnaryOp, walk,
    },
    value::Value,
};

/// Lower one boolean expression into a predicate.
///
/// The continuation flag is set wherever a construct can hide a
/// pseudo-column reference inside a branch that is not taken (`OR`, `NOT`,
/// membership, quantified forms, `LIKE`): scanning must then continue past
/// failing rows so the pseudo column keeps advancing.
pub(crate) fn lower_predicate(
    lowerer: &mut ExprLowerer<'_>,
    node: &SyntaxNode,
) -> Result<LoweredPredicate, CompileError> {
    match node {
        SyntaxNode::Binary(binary) if binary.op == BinaryOp::And => {
            let left = lower_predicate(lowerer, &binary.left)?;
            let right = lower_predicate(lowerer, &binary.right)?;

            Ok(LoweredPredicate {
                pred: PredicateExpression::and(left.pred, right.pred),
                scan_continue: left.scan_continue || right.scan_continue,
            })
        }
        SyntaxNode::Binary(binary) if binary.op == BinaryOp::Or => {
            let hides_pseudo = walk::profile(node).has_pseudo;
            let left = lower_predicate(lowerer, &binary.left)?;
            let right = lower_predicate(lowerer, &binary.right)?;

            Ok(LoweredPredicate {
                pred: PredicateExpression::or(left.pred, right.pred),
                scan_continue: left.scan_continue || right.scan_continue || hides_pseudo,
            })
        }
        SyntaxNode::Binary(binary) if binary.op.is_comparison() => {
            let lhs = lowerer.lower(&binary.left, UnboxMode::Value)?;
            let rhs = lowerer.lower_expected(&binary.right, UnboxMode::Value, Some(lhs.domain()))?;
            let op = comparison_op(binary.op);
            let domain = comparison_domain(&lhs, Some(&rhs));

            Ok(LoweredPredicate {
                pred: PredicateExpression::Comparison(ComparisonPred {
                    op,
                    lhs,
                    rhs: Some(rhs),
                    domain,
                }),
                scan_continue: false,
            })
        }
        SyntaxNode::Unary(unary) => match unary.op {
            UnaryOp::Not => {
                let hides_pseudo = walk::profile(&unary.arg).has_pseudo;
                let inner = lower_predicate(lowerer, &unary.arg)?;

                Ok(LoweredPredicate {
                    pred: PredicateExpression::negate(inner.pred),
                    scan_continue: inner.scan_continue || hides_pseudo,
                })
            }
            UnaryOp::IsNull | UnaryOp::IsNotNull => {
                let lhs = lowerer.lower(&unary.arg, UnboxMode::Value)?;
                let domain = comparison_domain(&lhs, None);
                let pred = PredicateExpression::Comparison(ComparisonPred {
                    op: ComparisonOp::IsNull,
                    lhs,
                    rhs: None,
                    domain,
                });
                let pred = if unary.op == UnaryOp::IsNotNull {
                    PredicateExpression::negate(pred)
                } else {
                    pred
                };

                Ok(LoweredPredicate {
                    pred,
                    scan_continue: false,
                })
            }
            UnaryOp::Exists => {
                let lhs = lowerer.lower(&unary.arg, UnboxMode::Table)?;
                let domain = comparison_domain(&lhs, None);

                Ok(LoweredPredicate {
                    pred: PredicateExpression::Comparison(ComparisonPred {
                        op: ComparisonOp::Exists,
                        lhs,
                        rhs: None,
                        domain,
                    }),
                    scan_continue: false,
                })
            }
            UnaryOp::Neg => value_as_predicate(lowerer, node),
        },
        SyntaxNode::Between(between) => {
            let subject = lowerer.lower(&between.subject, UnboxMode::Value)?;
            let lower =
                lowerer.lower_expected(&between.lower, UnboxMode::Value, Some(subject.domain()))?;
            let upper =
                lowerer.lower_expected(&between.upper, UnboxMode::Value, Some(subject.domain()))?;
            let domain = comparison_domain(&subject, Some(&lower));

            let ge = PredicateExpression::Comparison(ComparisonPred {
                op: ComparisonOp::Ge,
                lhs: subject.clone(),
                rhs: Some(lower),
                domain,
            });
            let le = PredicateExpression::Comparison(ComparisonPred {
                op: ComparisonOp::Le,
                lhs: subject,
                rhs: Some(upper),
                domain,
            });
            let pred = PredicateExpression::and(ge, le);
            let pred = if between.negated {
                PredicateExpression::negate(pred)
            } else {
                pred
            };

            Ok(LoweredPredicate {
                pred,
                scan_continue: false,
            })
        }
        SyntaxNode::RangeList(range_list) => {
            let subject = lowerer.lower(&range_list.subject, UnboxMode::Value)?;

            // Branch order is significant: the chain preserves it.
            let mut branches = Vec::with_capacity(range_list.branches.len());
            for branch in &range_list.branches {
                branches.push(lower_range_branch(lowerer, &subject, branch)?);
            }
            let Some(pred) = fold_or(branches) else {
                return Err(CompileError::MalformedRangeBranch {
                    location: range_list.location,
                    reason: "range predicate carries no branches".to_string(),
                });
            };

            Ok(LoweredPredicate {
                pred,
                scan_continue: false,
            })
        }
        SyntaxNode::InList(in_list) => {
            let hides_pseudo = walk::profile(node).has_pseudo;
            let elem = lowerer.lower(&in_list.subject, UnboxMode::Value)?;
            let mut elements = Vec::with_capacity(in_list.elements.len());
            for element in &in_list.elements {
                elements.push(lowerer.lower_expected(
                    element,
                    UnboxMode::Value,
                    Some(elem.domain()),
                )?);
            }
            let set = Operand::Function(crate::operand::FunctionOperand {
                kind: FunctionKind::ValueList,
                args: elements,
                domain: ValueDomain::generic(),
            });

            let pred = PredicateExpression::Quantified(QuantifiedPred {
                op: ComparisonOp::Eq,
                elem,
                set,
                quantifier: Quantifier::Some,
            });
            let pred = if in_list.negated {
                PredicateExpression::negate(pred)
            } else {
                pred
            };

            Ok(LoweredPredicate {
                pred,
                scan_continue: hides_pseudo,
            })
        }
        SyntaxNode::Quantified(quantified) => {
            let hides_pseudo = walk::profile(node).has_pseudo;
            let elem = lowerer.lower(&quantified.subject, UnboxMode::Value)?;
            // Membership forces the set side to its materialized shape.
            let set = lowerer.lower(&quantified.set, UnboxMode::Table)?;

            Ok(LoweredPredicate {
                pred: PredicateExpression::Quantified(QuantifiedPred {
                    op: compare_op(quantified.op),
                    elem,
                    set,
                    quantifier: quantified.quantifier,
                }),
                scan_continue: hides_pseudo,
            })
        }
        SyntaxNode::Like(like) => {
            let hides_pseudo = walk::profile(node).has_pseudo;
            let subject = lowerer.lower(&like.subject, UnboxMode::Value)?;
            let pattern = lowerer.lower(&like.pattern, UnboxMode::Value)?;
            let escape = match &like.escape {
                None => None,
                Some(escape) => Some(escape_character(escape)?),
            };

            let pred = PredicateExpression::PatternMatch(PatternPred {
                subject,
                pattern,
                escape,
            });
            let pred = if like.negated {
                PredicateExpression::negate(pred)
            } else {
                pred
            };

            Ok(LoweredPredicate {
                pred,
                scan_continue: hides_pseudo,
            })
        }
        other => value_as_predicate(lowerer, other),
    }
}

/// Build a right-leaning AND chain over conjuncts, preserving the
/// caller-supplied order.
pub(crate) fn lower_conjuncts(
    lowerer: &mut ExprLowerer<'_>,
    conjuncts: &[&SyntaxNode],
) -> Result<Option<LoweredPredicate>, CompileError> {
    let mut lowered = Vec::with_capacity(conjuncts.len());
    for &conjunct in conjuncts {
        lowered.push(lower_predicate(lowerer, conjunct)?);
    }

    let Some(last) = lowered.pop() else {
        return Ok(None);
    };

    let mut pred = last.pred;
    let mut scan_continue = last.scan_continue;
    for item in lowered.into_iter().rev() {
        scan_continue = scan_continue || item.scan_continue;
        pred = PredicateExpression::and(item.pred, pred);
    }

    Ok(Some(LoweredPredicate {
        pred,
        scan_continue,
    }))
}

// A scalar-shaped expression in predicate position reads as "is true".
fn value_as_predicate(
    lowerer: &mut ExprLowerer<'_>,
    node: &SyntaxNode,
) -> Result<LoweredPredicate, CompileError> {
    let lhs = lowerer.lower(node, UnboxMode::Value)?;
    let domain = ValueDomain::boolean();

    Ok(LoweredPredicate {
        pred: PredicateExpression::Comparison(ComparisonPred {
            op: ComparisonOp::Eq,
            lhs,
            rhs: Some(Operand::constant(Value::Bool(true), domain)),
            domain,
        }),
        scan_continue: false,
    })
}

fn lower_range_branch(
    lowerer: &mut ExprLowerer<'_>,
    subject: &Operand,
    branch: &RangeBranch,
) -> Result<PredicateExpression, CompileError> {
    let domain = subject.domain();
    let side = |node: Option<&SyntaxNode>,
                    op: ComparisonOp,
                    lowerer: &mut ExprLowerer<'_>|
     -> Result<PredicateExpression, CompileError> {
        let Some(node) = node else {
            return Err(CompileError::MalformedRangeBranch {
                location: branch.location,
                reason: format!("branch operand missing for {op:?} bound"),
            });
        };
        let bound = lowerer.lower_expected(node, UnboxMode::Value, Some(domain))?;

        Ok(PredicateExpression::Comparison(ComparisonPred {
            op,
            lhs: subject.clone(),
            rhs: Some(bound),
            domain,
        }))
    };

    let pred = match branch.op {
        RangeBranchOp::Eq => side(branch.lower.as_ref(), ComparisonOp::Eq, lowerer)?,
        RangeBranchOp::GeInf => side(branch.lower.as_ref(), ComparisonOp::Ge, lowerer)?,
        RangeBranchOp::GtInf => side(branch.lower.as_ref(), ComparisonOp::Gt, lowerer)?,
        RangeBranchOp::InfLe => side(branch.upper.as_ref(), ComparisonOp::Le, lowerer)?,
        RangeBranchOp::InfLt => side(branch.upper.as_ref(), ComparisonOp::Lt, lowerer)?,
        RangeBranchOp::GeLe => PredicateExpression::and(
            side(branch.lower.as_ref(), ComparisonOp::Ge, lowerer)?,
            side(branch.upper.as_ref(), ComparisonOp::Le, lowerer)?,
        ),
        RangeBranchOp::GeLt => PredicateExpression::and(
            side(branch.lower.as_ref(), ComparisonOp::Ge, lowerer)?,
            side(branch.upper.as_ref(), ComparisonOp::Lt, lowerer)?,
        ),
        RangeBranchOp::GtLe => PredicateExpression::and(
            side(branch.lower.as_ref(), ComparisonOp::Gt, lowerer)?,
            side(branch.upper.as_ref(), ComparisonOp::Le, lowerer)?,
        ),
        RangeBranchOp::GtLt => PredicateExpression::and(
            side(branch.lower.as_ref(), ComparisonOp::Gt, lowerer)?,
            side(branch.upper.as_ref(), ComparisonOp::Lt, lowerer)?,
        ),
    };

    Ok(pred)
}

fn fold_or(branches: Vec<PredicateExpression>) -> Option<PredicateExpression> {
    let mut iter = branches.into_iter().rev();
    let mut acc = iter.next()?;
    for branch in iter {
        acc = PredicateExpression::or(branch, acc);
    }

    Some(acc)
}

fn comparison_op(op: BinaryOp) -> ComparisonOp {
    match op {
        BinaryOp::Eq => ComparisonOp::Eq,
        BinaryOp::Ne => ComparisonOp::Ne,
        BinaryOp::Lt => ComparisonOp::Lt,
        BinaryOp::Le => ComparisonOp::Le,
        BinaryOp::Gt => ComparisonOp::Gt,
        BinaryOp::Ge => ComparisonOp::Ge,
        _ => unreachable!("comparison arm guarded by is_comparison"),
    }
}

const fn compare_op(op: CompareOp) -> ComparisonOp {
    match op {
        CompareOp::Eq => ComparisonOp::Eq,
        CompareOp::Ne => ComparisonOp::Ne,
        CompareOp::Lt => ComparisonOp::Lt,
        CompareOp::Le => ComparisonOp::Le,
        CompareOp::Gt => ComparisonOp::Gt,
        CompareOp::Ge => ComparisonOp::Ge,
    }
}

// The comparison domain follows the non-generic side.
fn comparison_domain(lhs: &Operand, rhs: Option<&Operand>) -> ValueDomain {
    let lhs_domain = lhs.domain();
    if !lhs_domain.is_generic() {
        return lhs_domain;
    }

    rhs.map_or(lhs_domain, Operand::domain)
}

/// A LIKE escape clause must be a single-character literal; anything else
/// is a user-facing error carrying the clause's location.
fn escape_character(node: &SyntaxNode) -> Result<char, CompileError> {
    if let SyntaxNode::Literal(literal) = node
        && let Value::Text(text) = &literal.value
    {
        let mut chars = text.chars();
        if let (Some(escape), None) = (chars.next(), chars.next()) {
            return Ok(escape);
        }
    }

    Err(CompileError::NonLiteralEscape {
        location: node.location(),
    })
}
