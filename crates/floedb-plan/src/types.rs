use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// Identifier vocabulary
///
/// Every cross-structure reference in the compiler is an explicit typed id,
/// never a pointer. Catalog-owned ids (`TableId`, `AttributeId`, `IndexId`)
/// are assigned by the catalog collaborator; the rest are arena-local and
/// only meaningful within one compilation.
///

///
/// TableId
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct TableId(pub u32);

///
/// AttributeId
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct AttributeId(pub u32);

///
/// IndexId
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct IndexId(pub u32);

///
/// SpecId
///
/// Identity of one row source within a statement. Assigned by the semantic
/// resolver; name nodes carry the spec id their reference was bound to.
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct SpecId(pub u32);

///
/// ParameterIndex
///
/// Zero-based position of a late-bound input parameter.
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct ParameterIndex(pub u32);

///
/// SubqueryId
///
/// Stable identity of a subquery node in the input tree. Identical ids
/// within one statement must reuse the already-compiled subplan.
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct SubqueryId(pub u64);

///
/// AggregateCallId
///
/// Identity of one aggregate call site, used to redirect select-list
/// references to the accumulator result cell wired by the grouping planner.
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct AggregateCallId(pub u32);

///
/// CellId
///
/// Arena-local identity of a shared pseudo-column cell. Structural equality
/// of plans compares cell ids, never cell contents.
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct CellId(pub u32);

///
/// SourceLocation
///
/// Originating position in the statement text, preserved from the input
/// tree so late-surfaced semantic errors can point at their source.
///

#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
