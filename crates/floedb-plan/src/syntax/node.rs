use crate::{
    domain::ValueDomain,
    syntax::query::QueryExpr,
    types::{AggregateCallId, AttributeId, ParameterIndex, SourceLocation, SpecId, SubqueryId},
    value::Value,
};
use std::cell::Cell;

///
/// SyntaxNode
///
/// One resolved, type-checked expression node. Variants cover scalar
/// expressions and the boolean forms predicate lowering consumes; query
/// shapes live in [`QueryExpr`].
///

#[derive(Clone, Debug, PartialEq)]
pub enum SyntaxNode {
    Literal(LiteralExpr),
    ColumnRef(ColumnRefExpr),
    Parameter(ParameterExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Function(FunctionExpr),
    Aggregate(AggregateExpr),
    Subquery(SubqueryExpr),
    Case(CaseExpr),
    Path(PathExpr),
    Between(BetweenExpr),
    InList(InListExpr),
    Like(LikeExpr),
    Quantified(QuantifiedExpr),
    RangeList(RangeListExpr),
    Pseudo(PseudoExpr),
}

impl SyntaxNode {
    /// Resolved value domain of this expression.
    #[must_use]
    pub fn domain(&self) -> ValueDomain {
        match self {
            Self::Literal(node) => node.domain,
            Self::ColumnRef(node) => node.domain,
            Self::Parameter(node) => node.domain(),
            Self::Unary(node) => node.domain,
            Self::Binary(node) => node.domain,
            Self::Function(node) => node.domain,
            Self::Aggregate(node) => node.domain,
            Self::Subquery(node) => node.result_domain,
            Self::Case(node) => node.domain,
            Self::Path(node) => node.domain,
            Self::Between(_)
            | Self::InList(_)
            | Self::Like(_)
            | Self::Quantified(_)
            | Self::RangeList(_) => ValueDomain::boolean(),
            Self::Pseudo(_) => ValueDomain::bigint(),
        }
    }

    /// Originating statement position.
    #[must_use]
    pub const fn location(&self) -> SourceLocation {
        match self {
            Self::Literal(node) => node.location,
            Self::ColumnRef(node) => node.location,
            Self::Parameter(node) => node.location,
            Self::Unary(node) => node.location,
            Self::Binary(node) => node.location,
            Self::Function(node) => node.location,
            Self::Aggregate(node) => node.location,
            Self::Subquery(node) => node.location,
            Self::Case(node) => node.location,
            Self::Path(node) => node.location,
            Self::Between(node) => node.location,
            Self::InList(node) => node.location,
            Self::Like(node) => node.location,
            Self::Quantified(node) => node.location,
            Self::RangeList(node) => node.location,
            Self::Pseudo(node) => node.location,
        }
    }
}

///
/// LiteralExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct LiteralExpr {
    pub value: Value,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// ColumnRefExpr
///
/// A name bound to one row source. `attribute` is present for catalog
/// tables and absent for positional sources (derived tables, set values).
///

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRefExpr {
    pub spec: SpecId,
    pub name: String,
    pub attribute: Option<AttributeId>,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// ParameterExpr
///
/// A late-bound input slot. `cast` is an explicit cast/data-type annotation
/// and wins over every other domain source.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterExpr {
    pub index: ParameterIndex,
    pub cast: Option<ValueDomain>,
    pub declared: ValueDomain,
    pub location: SourceLocation,
}

impl ParameterExpr {
    #[must_use]
    pub fn domain(&self) -> ValueDomain {
        self.cast.unwrap_or(self.declared)
    }
}

///
/// UnaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
    IsNull,
    IsNotNull,
    /// Non-emptiness test over a set-shaped argument (subquery).
    Exists,
}

///
/// UnaryExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub arg: Box<SyntaxNode>,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    // arithmetic / string
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    // comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // logical
    And,
    Or,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::Concat
        )
    }

    /// Restate a comparison with its sides swapped (`a < b` to `b > a`).
    #[must_use]
    pub const fn converse(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Eq),
            Self::Ne => Some(Self::Ne),
            Self::Lt => Some(Self::Gt),
            Self::Le => Some(Self::Ge),
            Self::Gt => Some(Self::Lt),
            Self::Ge => Some(Self::Le),
            _ => None,
        }
    }
}

///
/// BinaryExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<SyntaxNode>,
    pub right: Box<SyntaxNode>,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// FunctionKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FunctionKind {
    // string
    Lower,
    Upper,
    Trim,
    Substring,
    Position,
    CharLength,
    Replace,
    // numeric
    Abs,
    Floor,
    Ceil,
    Round,
    Trunc,
    Sign,
    Power,
    Sqrt,
    ToNumber,
    ToChar,
    ToDate,
    // date
    AddMonths,
    MonthsBetween,
    LastDay,
    SysDate,
    SysTime,
    SysTimestamp,
    // plan-internal forms, never produced by the resolver
    CompositeKey,
    ValueList,
}

///
/// FunctionExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionExpr {
    pub kind: FunctionKind,
    pub args: Vec<SyntaxNode>,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// AggregateKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateKind {
    Count,
    CountStar,
    Sum,
    Avg,
    Min,
    Max,
    Stddev,
    Variance,
}

///
/// AggregateExpr
///
/// `arg` is absent exactly for `CountStar`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateExpr {
    pub call: AggregateCallId,
    pub kind: AggregateKind,
    pub distinct: bool,
    pub arg: Option<Box<SyntaxNode>>,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// SubqueryExpr
///
/// `correlation` is the one mutable annotation slot in the input tree:
/// unset until name resolution inside the body observes a free reference,
/// then holding the nesting distance to the binding scope.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SubqueryExpr {
    pub id: SubqueryId,
    pub query: Box<QueryExpr>,
    pub result_domain: ValueDomain,
    pub correlation: Cell<Option<u32>>,
    pub location: SourceLocation,
}

///
/// CaseExpr
///
/// Searched form only: `WHEN cond THEN value` branches in source order.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CaseExpr {
    pub branches: Vec<(SyntaxNode, SyntaxNode)>,
    pub else_value: Option<Box<SyntaxNode>>,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// PathExpr
///
/// An object-path step: follow a reference attribute of `spec` to one row
/// of `target_table` and read `target_attribute` from it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PathExpr {
    pub spec: SpecId,
    pub anchor_attribute: AttributeId,
    pub target_table: crate::types::TableId,
    pub target_attribute: AttributeId,
    pub domain: ValueDomain,
    pub location: SourceLocation,
}

///
/// BetweenExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct BetweenExpr {
    pub subject: Box<SyntaxNode>,
    pub lower: Box<SyntaxNode>,
    pub upper: Box<SyntaxNode>,
    pub negated: bool,
    pub location: SourceLocation,
}

///
/// InListExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct InListExpr {
    pub subject: Box<SyntaxNode>,
    pub elements: Vec<SyntaxNode>,
    pub negated: bool,
    pub location: SourceLocation,
}

///
/// LikeExpr
///
/// `escape`, when present, must lower to a single-character literal; a
/// non-literal escape is a user-facing compile error.
///

#[derive(Clone, Debug, PartialEq)]
pub struct LikeExpr {
    pub subject: Box<SyntaxNode>,
    pub pattern: Box<SyntaxNode>,
    pub escape: Option<Box<SyntaxNode>>,
    pub negated: bool,
    pub location: SourceLocation,
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

///
/// Quantifier
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Quantifier {
    Some,
    All,
}

///
/// QuantifiedExpr
///
/// Membership and quantified comparison over a set-shaped operand
/// (subquery or list value). `IN` arrives as `Eq`/`Some`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct QuantifiedExpr {
    pub op: CompareOp,
    pub quantifier: Quantifier,
    pub subject: Box<SyntaxNode>,
    pub set: Box<SyntaxNode>,
    pub location: SourceLocation,
}

///
/// RangeBranchOp
///
/// Interval shape of one range branch; `Eq` marks a degenerate point
/// branch.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeBranchOp {
    GeLe,
    GeLt,
    GtLe,
    GtLt,
    GeInf,
    GtInf,
    InfLe,
    InfLt,
    Eq,
}

///
/// RangeBranch
///

#[derive(Clone, Debug, PartialEq)]
pub struct RangeBranch {
    pub op: RangeBranchOp,
    pub lower: Option<SyntaxNode>,
    pub upper: Option<SyntaxNode>,
    pub location: SourceLocation,
}

///
/// RangeListExpr
///
/// A disjunction of interval branches over one subject, produced by the
/// optimizer collaborator's rewrite of `OR`-ed comparisons; branch order is
/// significant and preserved.
///

#[derive(Clone, Debug, PartialEq)]
pub struct RangeListExpr {
    pub subject: Box<SyntaxNode>,
    pub branches: Vec<RangeBranch>,
    pub location: SourceLocation,
}

///
/// PseudoColumnKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PseudoColumnKind {
    RowNumber,
    OrderPosition,
    GroupPosition,
}

///
/// PseudoExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct PseudoExpr {
    pub kind: PseudoColumnKind,
    pub location: SourceLocation,
}
