use crate::{
    domain::ValueDomain,
    syntax::node::SyntaxNode,
    types::{AttributeId, SourceLocation, SpecId, TableId},
};

///
/// Statement
///
/// One compilable statement: a query expression plus nothing else. DML
/// statements compile their SELECT-shaped core through the same entry and
/// wrap the result; see the assembler's DML constructors.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub query: QueryExpr,
}

///
/// QueryExpr
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryExpr {
    Block(QueryBlock),
    SetOp(SetOpExpr),
}

impl QueryExpr {
    /// Number of columns this query projects.
    #[must_use]
    pub fn projected_width(&self) -> usize {
        match self {
            Self::Block(block) => block.select.len(),
            Self::SetOp(setop) => setop.left.projected_width(),
        }
    }

    #[must_use]
    pub const fn location(&self) -> SourceLocation {
        match self {
            Self::Block(block) => block.location,
            Self::SetOp(setop) => setop.location,
        }
    }
}

///
/// SetOpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetOpKind {
    Union,
    Difference,
    Intersection,
}

///
/// SetOpExpr
///

#[derive(Clone, Debug, PartialEq)]
pub struct SetOpExpr {
    pub op: SetOpKind,
    pub all: bool,
    pub left: Box<QueryExpr>,
    pub right: Box<QueryExpr>,
    pub order_by: Vec<OrderItem>,
    pub location: SourceLocation,
}

///
/// QueryBlock
///
/// One SELECT-shaped block. `filter` is the whole boolean condition; the
/// assembler flattens its top-level AND chain into conjuncts for
/// classification.
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryBlock {
    pub sources: Vec<SourceDecl>,
    pub filter: Option<SyntaxNode>,
    pub select: Vec<SyntaxNode>,
    pub group_by: Vec<SyntaxNode>,
    pub having: Option<SyntaxNode>,
    pub order_by: Vec<OrderItem>,
    pub distinct: bool,
    pub location: SourceLocation,
}

impl QueryBlock {
    #[must_use]
    pub fn source(&self, spec: SpecId) -> Option<&SourceDecl> {
        self.sources.iter().find(|source| source.spec == spec)
    }
}

///
/// OrderItem
///
/// Sort column as a zero-based select-list position.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OrderItem {
    pub position: u32,
    pub descending: bool,
}

///
/// SourceDecl
///
/// One row source in a block's FROM-equivalent list, in declared order.
/// Each source owns exactly one access spec in the finished plan.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SourceDecl {
    pub spec: SpecId,
    pub name: String,
    pub kind: SourceKind,
    pub attributes: Vec<SourceAttribute>,
    pub location: SourceLocation,
}

///
/// SourceKind
///

#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    /// Catalog table scanned live.
    Table(TableId),
    /// Derived table: a subquery materialized before this block reads it.
    Derived(Box<QueryExpr>),
    /// A set-valued expression unnested into rows.
    SetValued(Box<SyntaxNode>),
    /// External routine producing a row set.
    ExternalCall(ExternalCallDecl),
}

///
/// ExternalCallDecl
///

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalCallDecl {
    pub name: String,
    pub args: Vec<SyntaxNode>,
    pub result_domain: ValueDomain,
}

///
/// SourceAttribute
///
/// One exposed attribute of a source. `attribute` is the catalog id for
/// table sources and `None` for positional sources.
///

#[derive(Clone, Debug, PartialEq)]
pub struct SourceAttribute {
    pub name: String,
    pub attribute: Option<AttributeId>,
    pub domain: ValueDomain,
}
