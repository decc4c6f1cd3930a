use crate::{
    assemble::{PlanHints, compile_query},
    context::CompilationContext,
    error::CompileError,
    model::Catalog,
    operand::{Operand, TupleSlotOperand},
    plan::{OrderDirection, OrderSpec, PlanBody, PlanNode, SetOpBody, SortKey},
    syntax::SetOpExpr,
};
use std::rc::Rc;

///
/// compile_setop
///
/// Set operations skip source binding, predicate classification, shape
/// selection, and access building: both operand plans must already be
/// finished, and the node wraps them with an ordering spec over the
/// combined output.
///

pub(crate) fn compile_setop(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    setop: &SetOpExpr,
) -> Result<PlanNode, CompileError> {
    let left = Rc::new(compile_query(ctx, catalog, hints, &setop.left)?);
    let right = Rc::new(compile_query(ctx, catalog, hints, &setop.right)?);

    if left.output.len() != right.output.len() {
        return Err(CompileError::SetOperandArityMismatch {
            left: left.output.len(),
            right: right.output.len(),
        });
    }

    let spec = ctx.alloc_internal_spec();
    let width = left.output.len();
    let output: Vec<Operand> = left
        .output
        .iter()
        .enumerate()
        .map(|(position, operand)| {
            Operand::TupleSlot(TupleSlotOperand {
                spec,
                position: u32::try_from(position).unwrap_or(u32::MAX),
                domain: operand.domain(),
            })
        })
        .collect();

    // Distinct set semantics merge over ordered inputs; without an
    // explicit ORDER BY the ordering spans every output column.
    let order = if setop.order_by.is_empty() {
        if setop.all {
            None
        } else {
            Some(OrderSpec {
                keys: (0..width)
                    .map(|position| SortKey {
                        position: u32::try_from(position).unwrap_or(u32::MAX),
                        direction: OrderDirection::Asc,
                    })
                    .collect(),
            })
        }
    } else {
        Some(OrderSpec {
            keys: setop
                .order_by
                .iter()
                .map(|item| SortKey {
                    position: item.position,
                    direction: if item.descending {
                        OrderDirection::Desc
                    } else {
                        OrderDirection::Asc
                    },
                })
                .collect(),
        })
    };

    let mut node = PlanNode::new(
        spec,
        PlanBody::SetOp(SetOpBody {
            op: setop.op,
            all: setop.all,
            left,
            right,
        }),
    );
    node.output = output;
    node.order = order;

    Ok(node)
}
