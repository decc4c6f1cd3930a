use crate::{
    access::AccessSpec,
    context::PseudoCell,
    diagnostics::CompileDiagnostics,
    domain::ValueDomain,
    operand::Operand,
    predicate::PredicateExpression,
    syntax::{AggregateKind, SetOpKind},
    types::{AttributeId, IndexId, ParameterIndex, SpecId, TableId},
};
use derive_more::Deref;
use std::rc::Rc;

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

///
/// SortKey
///
/// One sort column as a zero-based position into the node's output list.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortKey {
    pub position: u32,
    pub direction: OrderDirection,
}

///
/// OrderSpec
///

#[derive(Clone, Debug, Deref, Eq, PartialEq)]
pub struct OrderSpec {
    #[deref]
    pub keys: Vec<SortKey>,
}

///
/// ActivationPredicate
///
/// A filter over pseudo-column values, applied once the pseudo column for
/// this nesting level is meaningful. `scan_continue` carries the predicate
/// codegen continuation flag: whether scanning must keep running past
/// failing rows for the pseudo column to keep advancing.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ActivationPredicate {
    pub pred: PredicateExpression,
    pub scan_continue: bool,
}

///
/// AggregateOption
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateOption {
    All,
    Distinct,
}

///
/// AggregateSpec
///
/// One accumulator: its input operand, result domain, and the output
/// position its result cell occupies. `index_hint` marks cardinality-only
/// aggregates the executor may short-circuit through an index.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSpec {
    pub kind: AggregateKind,
    pub option: AggregateOption,
    pub input: Option<Operand>,
    pub domain: ValueDomain,
    pub output_position: u32,
    pub index_hint: Option<IndexId>,
}

///
/// PseudoCells
///
/// The pseudo-column cells a node shares with its operands; only the ones
/// actually referenced are wired.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PseudoCells {
    pub row_number: Option<PseudoCell>,
    pub order_position: Option<PseudoCell>,
    pub group_position: Option<PseudoCell>,
}

///
/// PlanBody
///

#[derive(Clone, Debug, PartialEq)]
pub enum PlanBody {
    /// Chained sibling scan implementing one join source.
    Scan,
    /// Row-accumulating query block.
    BuildList,
    /// Provably single-row query block.
    BuildValue,
    SetOp(SetOpBody),
    MergeList(MergeListBody),
    /// Per-row object fetch steered by an anchor operand.
    Fetch(FetchBody),
    Insert(DmlBody),
    Update(DmlBody),
    Delete(DmlBody),
}

///
/// SetOpBody
///

#[derive(Clone, Debug, PartialEq)]
pub struct SetOpBody {
    pub op: SetOpKind,
    pub all: bool,
    pub left: Rc<PlanNode>,
    pub right: Rc<PlanNode>,
}

///
/// MergeListBody
///
/// Merge of two ordered intermediates over a shared sort specification.
///

#[derive(Clone, Debug, PartialEq)]
pub struct MergeListBody {
    pub left: Rc<PlanNode>,
    pub right: Rc<PlanNode>,
    pub order: OrderSpec,
}

///
/// FetchBody
///

#[derive(Clone, Debug, PartialEq)]
pub struct FetchBody {
    pub table: TableId,
    pub anchor: Operand,
}

///
/// DmlBody
///
/// Statement-side wrapper payload: the target table, assignment list, and
/// the rollback savepoint label. Triggers and authorization stay with the
/// statement orchestrator.
///

#[derive(Clone, Debug, PartialEq)]
pub struct DmlBody {
    pub table: TableId,
    pub assignments: Vec<(AttributeId, Operand)>,
    pub savepoint: String,
}

///
/// PlanNode
///
/// One finished physical operator. Immutable once returned; subplans are
/// shared by reference through the pointer lists and operand handles.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PlanNode {
    pub body: PlanBody,
    /// Spec id under which operands read this node's output.
    pub spec: SpecId,
    pub output: Vec<Operand>,
    pub access: Vec<AccessSpec>,
    /// Chained sibling scans implementing the block's join, in join order.
    pub scan_chain: Vec<PlanNode>,
    /// Subplans evaluated at most once, before any row is produced.
    pub access_pointers: Vec<Rc<PlanNode>>,
    /// Subplans re-evaluated once per row this node produces.
    pub dependent_pointers: Vec<Rc<PlanNode>>,
    pub order: Option<OrderSpec>,
    pub group: Option<OrderSpec>,
    pub aggregates: Vec<AggregateSpec>,
    pub cells: PseudoCells,
    /// Row-number activation (LIMIT-style) filter.
    pub row_activation: Option<ActivationPredicate>,
    /// Order-position activation filter.
    pub order_activation: Option<ActivationPredicate>,
    /// Group-position activation filter.
    pub group_activation: Option<ActivationPredicate>,
    pub distinct: bool,
    /// Marks the statement's root block.
    pub is_root: bool,
}

impl PlanNode {
    #[must_use]
    pub(crate) fn new(spec: SpecId, body: PlanBody) -> Self {
        Self {
            body,
            spec,
            output: Vec::new(),
            access: Vec::new(),
            scan_chain: Vec::new(),
            access_pointers: Vec::new(),
            dependent_pointers: Vec::new(),
            order: None,
            group: None,
            aggregates: Vec::new(),
            cells: PseudoCells::default(),
            row_activation: None,
            order_activation: None,
            group_activation: None,
            distinct: false,
            is_root: false,
        }
    }

    /// Per-row fetch node reading one attribute of one target row.
    #[must_use]
    pub(crate) fn fetch(spec: SpecId, table: TableId, anchor: Operand, output: Operand) -> Self {
        let mut node = Self::new(spec, PlanBody::Fetch(FetchBody { table, anchor }));
        node.output = vec![output];

        node
    }

    /// Merge node over two intermediates already ordered on `order`.
    /// Built for the statement orchestrator's merge-shaped sub-problems;
    /// the block assembler itself always chains scans.
    #[must_use]
    pub fn merge_list(
        spec: SpecId,
        left: Rc<Self>,
        right: Rc<Self>,
        order: OrderSpec,
    ) -> Self {
        Self::new(
            spec,
            PlanBody::MergeList(MergeListBody { left, right, order }),
        )
    }

    /// Whether this plan is known to produce exactly one row.
    #[must_use]
    pub fn is_single_row(&self) -> bool {
        matches!(self.body, PlanBody::BuildValue | PlanBody::Fetch(_))
    }

    /// Visit this node and every node reachable below it, including shared
    /// subplans (which may be visited more than once).
    pub fn walk(&self, visit: &mut impl FnMut(&Self)) {
        visit(self);
        for sibling in &self.scan_chain {
            sibling.walk(visit);
        }
        for child in &self.access_pointers {
            child.walk(visit);
        }
        for child in &self.dependent_pointers {
            child.walk(visit);
        }
        match &self.body {
            PlanBody::SetOp(setop) => {
                setop.left.walk(visit);
                setop.right.walk(visit);
            }
            PlanBody::MergeList(merge) => {
                merge.left.walk(visit);
                merge.right.walk(visit);
            }
            PlanBody::Scan
            | PlanBody::BuildList
            | PlanBody::BuildValue
            | PlanBody::Fetch(_)
            | PlanBody::Insert(_)
            | PlanBody::Update(_)
            | PlanBody::Delete(_) => {}
        }
    }

    /// Visit every operand held directly by this node (not by nested
    /// plan nodes).
    pub fn for_each_operand(&self, visit: &mut impl FnMut(&Operand)) {
        for operand in &self.output {
            operand.for_each(visit);
        }
        for spec in &self.access {
            spec.for_each_operand(visit);
        }
        for aggregate in &self.aggregates {
            if let Some(input) = &aggregate.input {
                input.for_each(visit);
            }
        }
        for activation in [
            &self.row_activation,
            &self.order_activation,
            &self.group_activation,
        ]
        .into_iter()
        .flatten()
        {
            activation.pred.for_each_operand(visit);
        }
        match &self.body {
            PlanBody::Fetch(fetch) => fetch.anchor.for_each(visit),
            PlanBody::Insert(dml) | PlanBody::Update(dml) | PlanBody::Delete(dml) => {
                for (_, operand) in &dml.assignments {
                    operand.for_each(visit);
                }
            }
            _ => {}
        }
    }
}

///
/// CompiledStatement
///
/// The compiler's output contract: the root plan plus the side tables the
/// caller needs for cache invalidation and late binding, and read-only
/// diagnostics.
///

#[derive(Clone, Debug)]
pub struct CompiledStatement {
    pub root: Rc<PlanNode>,
    /// Distinct base tables referenced anywhere in the plan, in first
    /// reference order.
    pub referenced_tables: Vec<TableId>,
    /// Highest parameter index referenced anywhere in the tree.
    pub max_parameter_index: Option<ParameterIndex>,
    pub diagnostics: CompileDiagnostics,
}
