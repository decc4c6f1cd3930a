//! Access spec construction: one row source, an optional index key, and
//! the three-way predicate partition (key / access / residual) with the
//! projected column lists the execution engine fetches per stage. Module
//! wiring plus the access vocabulary; classification lives in `build`.

mod build;

#[cfg(test)]
mod tests;

pub use build::IndexChoice;
pub(crate) use build::{AccessInput, BoundSource, build_access};

use crate::{
    domain::ValueDomain,
    key::KeyInfo,
    model::PartitionInfo,
    operand::Operand,
    plan::PlanNode,
    predicate::PredicateExpression,
    types::{AttributeId, IndexId, SpecId, TableId},
};
use std::rc::Rc;

///
/// CallSignature
///
/// Lowered call surface of an external-routine row source.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CallSignature {
    pub name: String,
    pub args: Vec<Operand>,
    pub result_domain: ValueDomain,
}

///
/// AccessSource
///

#[derive(Clone, Debug, PartialEq)]
pub enum AccessSource {
    /// Catalog table scanned live.
    Table {
        spec: SpecId,
        table: TableId,
        partitions: Option<PartitionInfo>,
    },
    /// Materialized intermediate read positionally.
    Intermediate { spec: SpecId, plan: Rc<PlanNode> },
    /// Set-valued expression unnested into rows.
    SetExpr { spec: SpecId, operand: Operand },
    /// External routine; `input`, when present, produces the argument rows.
    ExternalCall {
        spec: SpecId,
        signature: CallSignature,
        input: Option<Rc<PlanNode>>,
    },
}

impl AccessSource {
    #[must_use]
    pub const fn spec(&self) -> SpecId {
        match self {
            Self::Table { spec, .. }
            | Self::Intermediate { spec, .. }
            | Self::SetExpr { spec, .. }
            | Self::ExternalCall { spec, .. } => *spec,
        }
    }
}

///
/// AccessMethod
///

#[derive(Clone, Debug, PartialEq)]
pub enum AccessMethod {
    Sequential,
    Indexed { index: IndexId, key: KeyInfo },
}

///
/// AccessSpec
///
/// How one row source is scanned: method, the predicate partition, and the
/// minimal column sets to fetch for key evaluation, filter evaluation, and
/// the rest of the row.
///

#[derive(Clone, Debug, PartialEq)]
pub struct AccessSpec {
    pub source: AccessSource,
    pub method: AccessMethod,
    /// Key-consumed conjuncts, re-checked during the scan (composite key
    /// coercion can be lossy for variable-length types).
    pub key_filter: Option<PredicateExpression>,
    /// Conjuncts over this source's own columns only.
    pub access_filter: Option<PredicateExpression>,
    /// Everything else, evaluated after the row is otherwise accepted.
    pub residual_filter: Option<PredicateExpression>,
    pub key_columns: Vec<AttributeId>,
    pub filter_columns: Vec<AttributeId>,
    pub rest_columns: Vec<AttributeId>,
}

impl AccessSpec {
    /// Visit every operand held by this spec's filters, key ranges, and
    /// source payload.
    pub fn for_each_operand(&self, visit: &mut impl FnMut(&Operand)) {
        if let AccessMethod::Indexed { key, .. } = &self.method {
            for range in &key.ranges {
                if let Some(lower) = &range.lower {
                    lower.for_each(visit);
                }
                if let Some(upper) = &range.upper {
                    upper.for_each(visit);
                }
            }
        }
        for filter in [&self.key_filter, &self.access_filter, &self.residual_filter]
            .into_iter()
            .flatten()
        {
            filter.for_each_operand(visit);
        }
        match &self.source {
            AccessSource::SetExpr { operand, .. } => operand.for_each(visit),
            AccessSource::ExternalCall { signature, .. } => {
                for arg in &signature.args {
                    arg.for_each(visit);
                }
            }
            AccessSource::Table { .. } | AccessSource::Intermediate { .. } => {}
        }
    }
}
