//! Resolved input tree; module wiring only, no lowering logic lives here.
//!
//! The tree arrives fully bound: every name carries the spec id of the row
//! source it resolved to, every expression carries a value domain, and every
//! subquery node has a stable identity. The compiler reads this surface and
//! never rewrites it; the one mutable slot is the correlation annotation on
//! subquery nodes.

mod node;
mod query;
pub(crate) mod walk;

pub use node::{
    AggregateExpr, AggregateKind, BetweenExpr, BinaryExpr, BinaryOp, CaseExpr, ColumnRefExpr,
    CompareOp, FunctionExpr, FunctionKind, InListExpr, LikeExpr, LiteralExpr, ParameterExpr,
    PathExpr, PseudoColumnKind, PseudoExpr, Quantifier, QuantifiedExpr, RangeBranch,
    RangeBranchOp, RangeListExpr, SubqueryExpr, SyntaxNode, UnaryExpr, UnaryOp,
};
pub use query::{
    ExternalCallDecl, OrderItem, QueryBlock, QueryExpr, SetOpExpr, SetOpKind, SourceAttribute,
    SourceDecl, SourceKind, Statement,
};
