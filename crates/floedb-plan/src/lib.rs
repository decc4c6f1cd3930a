//! Query-plan compiler for the FloeDB relational engine: lowers a resolved,
//! type-checked syntax tree into an executable physical plan (typed operator
//! nodes, access specs, index key ranges, and operand evaluation programs).
#![warn(unreachable_pub)]

pub mod access;
pub mod aggregate;
pub mod assemble;
pub mod context;
pub mod correlation;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod key;
pub mod model;
pub mod operand;
pub mod plan;
pub mod predicate;
pub mod scope;
pub mod syntax;
pub mod types;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Maximum query-block nesting depth accepted by one compilation.
///
/// Recursive descent into subqueries is plain call-stack recursion; this
/// bound keeps it finite before the stack is at risk.
pub const MAX_NESTING_DEPTH: u32 = 64;

/// Maximum number of key parts a composite index key may carry.
pub const MAX_KEY_PARTS: usize = 16;

/// Maximum number of elements a list-key (`IN`-driven) range set may carry.
pub const MAX_LIST_KEY_ELEMENTS: usize = 1024;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, contexts, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        domain::{DomainKind, ValueDomain},
        model::{AttributeModel, Catalog, IndexModel, TableModel},
        plan::{CompiledStatement, PlanNode},
        types::{AttributeId, IndexId, ParameterIndex, SpecId, TableId},
        value::Value,
    };
}
